use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::error::PlayerError;
use super::queue::PlaybackMode;
use crate::connectivity::ConnectivityEvent;
use crate::engine::EngineEvent;
use crate::host::HostEvent;
use crate::item::{AudioItem, QualityTier};

/// Player states. Exactly one is active at any instant. `Stopped` is
/// reachable from every other state and is the only state in which no
/// current item exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Buffering,
    Playing,
    Paused,
    Stopped,
    WaitingForConnection,
}

/// Commands that can be sent to the Player task.
#[derive(Debug)]
pub enum PlayerCommand {
    PlayItems {
        items: Vec<Arc<AudioItem>>,
        start_index: usize,
    },
    AddItems {
        items: Vec<Arc<AudioItem>>,
    },
    RemoveAt {
        index: usize,
        respond_to: oneshot::Sender<Result<(), PlayerError>>,
    },
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    HasNext(oneshot::Sender<bool>),
    SeekTo(Duration),
    SetMode(PlaybackMode),
    SetRate(f32),
    SetVolume(f32),
    Remote(RemoteCommand),
    GetFullState(oneshot::Sender<PlayerStateSnapshot>),
    Shutdown,
}

/// Remote-control intents forwarded from the host's media keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    SeekBackwardBegin,
    SeekBackwardEnd,
    SeekForwardBegin,
    SeekForwardEnd,
    NextTrack,
    PreviousTrack,
    TogglePlayPause,
    Stop,
}

/// Collaborator events marshaled onto the player task. The engine, the
/// connectivity monitor, and the host all deliver their callbacks through
/// this channel; nothing touches player state from another context.
#[derive(Debug)]
pub enum PlayerEvent {
    Engine(EngineEvent),
    Connectivity(ConnectivityEvent),
    Host(HostEvent),
    RetryTimerFired,
    QualityTimerFired,
}

/// Snapshot of the player's externally visible state.
#[derive(Debug, Clone)]
pub struct PlayerStateSnapshot {
    pub state: PlayerState,
    pub current_item: Option<Arc<AudioItem>>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub quality: QualityTier,
    pub mode: PlaybackMode,
    pub queue_len: usize,
    pub current_index: Option<usize>,
    pub rate: f32,
    pub volume: f32,
}

/// Notifications broadcast by the Player task, delivered synchronously in
/// the order transitions occur.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    StateChanged {
        from: PlayerState,
        to: PlayerState,
    },
    WillStartItem {
        item: Arc<AudioItem>,
    },
    ProgressionUpdated {
        position: Duration,
        percent: f32,
    },
    DurationFound {
        duration: Duration,
        item: Arc<AudioItem>,
    },
}
