//! Playback control core.
//!
//! [`Player`] owns all mutable playback state (current item, state machine,
//! queue, counters, timers) and runs as a single task — the player's home
//! context. Application commands arrive through the command channel,
//! collaborator callbacks (engine, connectivity monitor, host environment)
//! through the event channel; nothing mutates state from any other context.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, trace, warn};

use crate::config::PlayerSettings;
use crate::engine::{EngineError, EngineEvent, PlaybackEngine};
use crate::host::HostEnvironment;

mod error;
mod machine;
mod now_playing;
pub mod queue;
mod quality;
mod retry;
mod run_loop;
mod state;

pub use error::PlayerError;
pub use now_playing::{NowPlayingDisplay, NowPlayingInfo};
pub use queue::{PlayQueue, PlaybackMode, PreviousStep, QueueEntry};
pub use state::{
    PlayerCommand, PlayerEvent, PlayerNotification, PlayerState, PlayerStateSnapshot,
    RemoteCommand,
};

use machine::{Effect, PlayerCore};
use now_playing::NowPlayingReporter;
use quality::QualityTimer;
use retry::RetryTimer;

const PLAYER_LOG_TARGET: &str = "audiopilot::player";

/// Manages playback state, the queue, and the collaborator handles.
/// Run it in its own task via [`Player::run`].
pub struct Player {
    // --- State ---
    core: PlayerCore,

    // --- Collaborators ---
    engine: Box<dyn PlaybackEngine>,
    host: Arc<dyn HostEnvironment>,
    reporter: NowPlayingReporter,

    // --- Communication ---
    command_rx: mpsc::Receiver<PlayerCommand>,
    event_rx: mpsc::Receiver<PlayerEvent>,
    // Sender for internally generated events (timer firings, engine-call
    // failures fed back into the reducer).
    event_tx: mpsc::Sender<PlayerEvent>,
    notification_tx: broadcast::Sender<PlayerNotification>,

    // --- Timers ---
    retry_timer: RetryTimer,
    quality_timer: QualityTimer,
}

impl Player {
    /// Creates a new Player instance and the command channel sender.
    /// The Player itself should be run in a separate task using
    /// [`Player::run`].
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        host: Arc<dyn HostEnvironment>,
        display: Arc<dyn NowPlayingDisplay>,
        settings: PlayerSettings,
        command_buffer_size: usize,
        notification_capacity: usize,
    ) -> (Self, mpsc::Sender<PlayerCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer_size);
        let (event_tx, event_rx) = mpsc::channel(command_buffer_size);
        let (notification_tx, _) = broadcast::channel(notification_capacity);

        let player = Player {
            core: PlayerCore::new(settings),
            engine,
            host,
            reporter: NowPlayingReporter::new(display),
            command_rx,
            event_rx,
            event_tx,
            notification_tx,
            retry_timer: RetryTimer::default(),
            quality_timer: QualityTimer::default(),
        };

        (player, command_tx)
    }

    /// Sender for collaborator events. Clone it into whatever context
    /// delivers engine, connectivity, or host callbacks; sending marshals
    /// them onto the player task.
    pub fn event_sender(&self) -> mpsc::Sender<PlayerEvent> {
        self.event_tx.clone()
    }

    /// Subscribes to player notifications.
    pub fn subscribe_notifications(&self) -> broadcast::Receiver<PlayerNotification> {
        self.notification_tx.subscribe()
    }

    /// Runs the player's command and event processing loop. This should be
    /// spawned as a Tokio task.
    pub async fn run(&mut self) {
        run_loop::run_player_loop(self).await;
    }

    // --- Private Helper Methods ---

    /// Sends a notification via the broadcast channel, logging errors.
    fn broadcast_notification(&self, notification: PlayerNotification) {
        trace!(target: PLAYER_LOG_TARGET, "Broadcasting notification: {:?}", notification);
        if self.notification_tx.send(notification.clone()).is_err() {
            // Error occurs if there are no active receivers, which is normal
            // when nothing is observing the player.
            debug!(target: PLAYER_LOG_TARGET, "No active listeners for notification: {:?}", notification);
        }
    }

    /// Executes reducer effects in order against the collaborators.
    async fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            trace!(target: PLAYER_LOG_TARGET, "Executing effect: {:?}", effect);
            match effect {
                Effect::Load { url } => {
                    if let Err(e) = self.engine.load(&url).await {
                        self.report_engine_failure(e);
                    }
                }
                Effect::Play => {
                    if let Err(e) = self.engine.play().await {
                        self.report_engine_failure(e);
                    }
                }
                Effect::Pause => {
                    if let Err(e) = self.engine.pause().await {
                        warn!(target: PLAYER_LOG_TARGET, "Engine pause failed: {}", e);
                    }
                }
                Effect::Seek(to) => {
                    if let Err(e) = self.engine.seek(to).await {
                        warn!(target: PLAYER_LOG_TARGET, "Engine seek failed: {}", e);
                    }
                }
                Effect::SetRate(rate) => {
                    if let Err(e) = self.engine.set_rate(rate).await {
                        warn!(target: PLAYER_LOG_TARGET, "Engine set_rate failed: {}", e);
                    }
                }
                Effect::SetVolume(volume) => {
                    if let Err(e) = self.engine.set_volume(volume).await {
                        warn!(target: PLAYER_LOG_TARGET, "Engine set_volume failed: {}", e);
                    }
                }
                Effect::ReplaceSource { url } => {
                    if let Err(e) = self.engine.replace_source(&url).await {
                        self.report_engine_failure(e);
                    }
                }
                Effect::Release => {
                    if let Err(e) = self.engine.release().await {
                        warn!(target: PLAYER_LOG_TARGET, "Engine release failed: {}", e);
                    }
                }
                Effect::ArmRetryTimer(delay) => {
                    self.retry_timer.arm(delay, self.event_tx.clone());
                }
                Effect::CancelRetryTimer => {
                    self.retry_timer.cancel();
                }
                Effect::ArmQualityTimer(period) => {
                    self.quality_timer.arm(period, self.event_tx.clone());
                }
                Effect::CancelQualityTimer => {
                    self.quality_timer.cancel();
                }
                Effect::BeginBackgroundTask => {
                    self.host.begin_background_task();
                }
                Effect::EndBackgroundTask => {
                    self.host.end_background_task();
                }
                Effect::Notify(notification) => {
                    self.broadcast_notification(notification);
                }
                Effect::RefreshNowPlaying => {
                    let snapshot = self.core.snapshot();
                    self.reporter.refresh(
                        snapshot.current_item.as_ref(),
                        snapshot.duration,
                        snapshot.position,
                        snapshot.rate,
                    );
                }
            }
        }
    }

    /// Feeds an engine-call failure back through the event channel so the
    /// reducer sees it on the next loop iteration. `try_send` because the
    /// player task is the channel's consumer.
    fn report_engine_failure(&self, failure: EngineError) {
        warn!(target: PLAYER_LOG_TARGET, "Engine call failed: {}", failure);
        if let Err(e) = self
            .event_tx
            .try_send(PlayerEvent::Engine(EngineEvent::Failed(failure)))
        {
            error!(target: PLAYER_LOG_TARGET, "Failed to queue engine failure event: {}", e);
        }
    }
}
