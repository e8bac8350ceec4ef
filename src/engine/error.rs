use std::error::Error;
use std::io;

/// Error types reported by a playback engine backend.
#[derive(Debug)]
pub enum EngineError {
    LoadFailed(String),
    PlaybackFailed(String),
    SeekFailed(String),
    InvalidState(String),
    IoError(io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::LoadFailed(e) => write!(f, "Load failed: {}", e),
            EngineError::PlaybackFailed(e) => write!(f, "Playback failed: {}", e),
            EngineError::SeekFailed(e) => write!(f, "Seek failed: {}", e),
            EngineError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            EngineError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(e: io::Error) -> Self {
        EngineError::IoError(e)
    }
}
