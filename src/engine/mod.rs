//! Playback engine interface (external collaborator).
//!
//! The engine decodes, renders, and transports audio; the player only
//! drives it through [`PlaybackEngine`] and reacts to its [`EngineEvent`]s.

pub mod control;
pub mod error;

pub use control::{EngineEvent, PlaybackEngine};
pub use error::EngineError;
