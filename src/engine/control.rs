use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::error::EngineError;

/// Events emitted by a playback engine backend. The embedder forwards them
/// into the player's event channel; they are never handled on the engine's
/// own callback context.
#[derive(Debug)]
pub enum EngineEvent {
    /// The playout buffer ran dry.
    BufferEmpty,
    /// The engine believes playback is likely to keep up.
    LikelyToKeepUp,
    /// The total duration of the loaded source became known.
    DurationKnown(Duration),
    /// Periodic playback position report (~2 Hz).
    PositionTick(Duration),
    /// The loaded source played to its end.
    ItemEnded,
    /// A load or playback failure.
    Failed(EngineError),
}

/// Trait defining the controls for a playback engine backend.
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Loads a source URL, replacing whatever was loaded before.
    async fn load(&mut self, url: &Url) -> Result<(), EngineError>;

    async fn play(&mut self) -> Result<(), EngineError>;

    async fn pause(&mut self) -> Result<(), EngineError>;

    async fn seek(&mut self, to: Duration) -> Result<(), EngineError>;

    async fn set_rate(&mut self, rate: f32) -> Result<(), EngineError>;

    async fn set_volume(&mut self, volume: f32) -> Result<(), EngineError>;

    /// Swaps the media source in place, keeping playback session state.
    /// Used for quality-tier changes; the caller reseeks afterwards.
    async fn replace_source(&mut self, url: &Url) -> Result<(), EngineError>;

    /// Releases engine resources. Called on stop and on player shutdown.
    async fn release(&mut self) -> Result<(), EngineError>;
}
