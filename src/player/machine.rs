//! Playback state machine, written as a reducer: events map to state
//! transitions plus a list of side effects for the player task to execute.
//! The struct performs no I/O itself, which keeps every transition testable
//! without a live engine.

use std::mem;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::error::PlayerError;
use super::quality;
use super::queue::{PlayQueue, PlaybackMode, PreviousStep};
use super::retry::{self, RetryDecision};
use super::state::{
    PlayerEvent, PlayerNotification, PlayerState, PlayerStateSnapshot, RemoteCommand,
};
use crate::config::PlayerSettings;
use crate::connectivity::{self, ConnectivityEvent};
use crate::engine::EngineEvent;
use crate::host::HostEvent;
use crate::item::{AudioItem, QualityTier};
use std::sync::Arc;

const MACHINE_LOG_TARGET: &str = "audiopilot::player::machine";

/// Side effects requested by the reducer; the player task executes them in
/// order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    Load { url: Url },
    Play,
    Pause,
    Seek(Duration),
    SetRate(f32),
    SetVolume(f32),
    ReplaceSource { url: Url },
    Release,
    ArmRetryTimer(Duration),
    CancelRetryTimer,
    ArmQualityTimer(Duration),
    CancelQualityTimer,
    BeginBackgroundTask,
    EndBackgroundTask,
    Notify(PlayerNotification),
    RefreshNowPlaying,
}

/// Why the player is waiting for connectivity to come back. Present only
/// while `WaitingForConnection` is active.
#[derive(Debug, Clone, Copy)]
struct ConnectionLossRecord {
    instant: Instant,
    state_at_loss: PlayerState,
}

/// All mutable player state. The reducer methods are the only writers.
pub(crate) struct PlayerCore {
    settings: PlayerSettings,
    state: PlayerState,
    queue: PlayQueue,
    mode: PlaybackMode,
    quality: QualityTier,
    rate: f32,
    volume: f32,
    position: Duration,
    duration: Option<Duration>,
    retry_count: u32,
    interruption_count: u32,
    quality_change_in_flight: bool,
    quality_timer_armed: bool,
    paused_for_interruption: bool,
    pause_requested: bool,
    reachable: bool,
    connection_loss: Option<ConnectionLossRecord>,
}

impl PlayerCore {
    pub fn new(settings: PlayerSettings) -> Self {
        let mode = settings.mode;
        let quality = settings.default_quality;
        let rate = settings.rate;
        let volume = settings.volume;
        PlayerCore {
            settings,
            state: PlayerState::Stopped,
            queue: PlayQueue::new(),
            mode,
            quality,
            rate,
            volume,
            position: Duration::ZERO,
            duration: None,
            retry_count: 0,
            interruption_count: 0,
            quality_change_in_flight: false,
            quality_timer_armed: false,
            paused_for_interruption: false,
            pause_requested: false,
            reachable: true,
            connection_loss: None,
        }
    }

    // --- Queries ---

    pub fn has_next(&self) -> bool {
        self.queue.has_next(self.mode)
    }

    pub fn snapshot(&self) -> PlayerStateSnapshot {
        PlayerStateSnapshot {
            state: self.state,
            current_item: self.queue.current().map(|e| e.item.clone()),
            position: self.position,
            duration: self.duration,
            quality: self.quality,
            mode: self.mode,
            queue_len: self.queue.len(),
            current_index: self.queue.current_index(),
            rate: self.rate,
            volume: self.volume,
        }
    }

    // --- Commands ---

    pub fn play_items(
        &mut self,
        items: Vec<Arc<AudioItem>>,
        start_index: usize,
        now: Instant,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        info!(target: MACHINE_LOG_TARGET, count = items.len(), start_index, "Replacing queue.");
        self.pause_requested = false;
        self.paused_for_interruption = false;
        match self.queue.replace(items, start_index, self.mode) {
            Ok(_) => self.select_current(None, now, &mut effects),
            Err(_) => {
                warn!(target: MACHINE_LOG_TARGET, "Play requested with an empty item list, stopping.");
                self.stop_into(&mut effects);
            }
        }
        effects
    }

    pub fn add_items(&mut self, items: Vec<Arc<AudioItem>>, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if items.is_empty() {
            return effects;
        }
        debug!(target: MACHINE_LOG_TARGET, count = items.len(), "Appending items to queue.");
        let newly_selected = self.queue.append(items, self.mode);
        if newly_selected.is_some() && self.state == PlayerState::Stopped {
            // Nothing was selected before the append, so start playing.
            self.select_current(None, now, &mut effects);
        }
        effects
    }

    /// Removing the currently playing entry is not defined by the transition
    /// table; the chosen policy treats it like that item ending, minus
    /// repeat-current: play whatever slid into the slot, wrap under
    /// `repeat_all`, otherwise stop.
    pub fn remove_at(&mut self, index: usize, now: Instant) -> Result<Vec<Effect>, PlayerError> {
        let was_current = self.queue.current_index() == Some(index);
        let removed = self.queue.remove_at(index)?;
        debug!(target: MACHINE_LOG_TARGET, index, title = %removed.item.title, "Removed queue entry.");
        let mut effects = Vec::new();
        if was_current {
            if self.queue.current().is_some() {
                self.select_current(None, now, &mut effects);
            } else if self.mode.repeat_all() && !self.queue.is_empty() {
                self.queue.select_slot(0);
                self.select_current(None, now, &mut effects);
            } else {
                self.stop_into(&mut effects);
            }
        }
        Ok(effects)
    }

    pub fn play(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.pause_requested = false;
        self.paused_for_interruption = false;
        match self.state {
            PlayerState::Paused => {
                effects.push(Effect::Play);
                effects.push(Effect::SetRate(self.rate));
                self.set_state(PlayerState::Playing, &mut effects);
                effects.push(Effect::RefreshNowPlaying);
            }
            PlayerState::Stopped if self.queue.current().is_some() => {
                self.select_current(None, now, &mut effects);
            }
            _ => {}
        }
        effects
    }

    pub fn pause(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.pause_requested = true;
        if matches!(self.state, PlayerState::Playing | PlayerState::Buffering) {
            effects.push(Effect::Pause);
            self.set_state(PlayerState::Paused, &mut effects);
            effects.push(Effect::RefreshNowPlaying);
        }
        effects
    }

    pub fn toggle_play_pause(&mut self, now: Instant) -> Vec<Effect> {
        if matches!(self.state, PlayerState::Playing | PlayerState::Buffering) {
            self.pause()
        } else {
            self.play(now)
        }
    }

    pub fn stop(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.stop_into(&mut effects);
        effects
    }

    pub fn next(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.queue.advance_next(self.mode) {
            self.select_current(None, now, &mut effects);
        } else {
            debug!(target: MACHINE_LOG_TARGET, "Next requested at end of queue, nothing to do.");
        }
        effects
    }

    pub fn previous(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.queue.step_previous(self.mode) {
            PreviousStep::Moved => self.select_current(None, now, &mut effects),
            PreviousStep::SeekToStart => {
                if self.queue.current().is_some() {
                    self.position = Duration::ZERO;
                    effects.push(Effect::Seek(Duration::ZERO));
                }
            }
        }
        effects
    }

    pub fn seek_to(&mut self, to: Duration) -> Vec<Effect> {
        self.position = to;
        vec![
            Effect::Seek(to),
            Effect::Notify(self.progression_notification()),
            Effect::RefreshNowPlaying,
        ]
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) -> Vec<Effect> {
        self.mode = mode;
        self.queue.reorder_for_mode(mode);
        Vec::new()
    }

    pub fn set_rate(&mut self, rate: f32) -> Vec<Effect> {
        self.rate = rate;
        vec![Effect::SetRate(rate), Effect::RefreshNowPlaying]
    }

    pub fn set_volume(&mut self, volume: f32) -> Vec<Effect> {
        self.volume = volume;
        vec![Effect::SetVolume(volume)]
    }

    pub fn remote(&mut self, command: RemoteCommand, now: Instant) -> Vec<Effect> {
        match command {
            RemoteCommand::SeekForwardBegin => {
                vec![Effect::SetRate(self.rate * self.settings.rate_multiplier_on_seeking)]
            }
            RemoteCommand::SeekBackwardBegin => {
                vec![Effect::SetRate(-(self.rate * self.settings.rate_multiplier_on_seeking))]
            }
            RemoteCommand::SeekForwardEnd | RemoteCommand::SeekBackwardEnd => {
                vec![Effect::SetRate(self.rate)]
            }
            RemoteCommand::NextTrack => self.next(now),
            RemoteCommand::PreviousTrack => self.previous(now),
            RemoteCommand::TogglePlayPause => self.toggle_play_pause(now),
            RemoteCommand::Stop => self.stop(),
        }
    }

    // --- Event reducer ---

    pub fn apply(&mut self, event: PlayerEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            PlayerEvent::Engine(engine_event) => self.apply_engine(engine_event, now, &mut effects),
            PlayerEvent::Connectivity(change) => {
                self.apply_connectivity(change, now, &mut effects)
            }
            PlayerEvent::Host(host_event) => self.apply_host(host_event, now, &mut effects),
            PlayerEvent::RetryTimerFired => self.retry_or_advance(now, &mut effects),
            PlayerEvent::QualityTimerFired => self.evaluate_quality(&mut effects),
        }
        effects
    }

    fn apply_engine(&mut self, event: EngineEvent, now: Instant, effects: &mut Vec<Effect>) {
        match event {
            EngineEvent::BufferEmpty => {
                if self.state == PlayerState::Playing {
                    if self.quality_change_in_flight {
                        debug!(target: MACHINE_LOG_TARGET, "Underrun during quality change, not counted.");
                    } else {
                        self.interruption_count += 1;
                        debug!(target: MACHINE_LOG_TARGET, count = self.interruption_count, "Buffer underrun while playing.");
                    }
                    // Recovery may outlive foreground focus.
                    effects.push(Effect::BeginBackgroundTask);
                    self.set_state(PlayerState::Buffering, effects);
                }
            }
            EngineEvent::LikelyToKeepUp => {
                if self.state == PlayerState::Buffering {
                    self.engine_ready(effects);
                } else {
                    self.quality_change_in_flight = false;
                }
            }
            EngineEvent::DurationKnown(duration) => {
                self.duration = Some(duration);
                if let Some(entry) = self.queue.current() {
                    effects.push(Effect::Notify(PlayerNotification::DurationFound {
                        duration,
                        item: entry.item.clone(),
                    }));
                }
                effects.push(Effect::RefreshNowPlaying);
            }
            EngineEvent::PositionTick(position) => {
                // The tick path can race the ready signal; apply the same
                // transition rules before reporting progress.
                if self.state == PlayerState::Buffering && !position.is_zero() {
                    self.engine_ready(effects);
                }
                self.position = position;
                if self.state == PlayerState::Playing {
                    effects.push(Effect::Notify(self.progression_notification()));
                    effects.push(Effect::RefreshNowPlaying);
                }
            }
            EngineEvent::ItemEnded => {
                self.position = Duration::ZERO;
                self.finish_or_advance(now, effects);
            }
            EngineEvent::Failed(error) => {
                warn!(target: MACHINE_LOG_TARGET, %error, "Engine failure, treating as a stall.");
                self.interruption_count += 1;
                self.retry_or_advance(now, effects);
            }
        }
    }

    fn apply_connectivity(
        &mut self,
        change: ConnectivityEvent,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match change {
            ConnectivityEvent::Unreachable => {
                self.reachable = false;
                let affected = self.current_is_remote()
                    && !matches!(self.state, PlayerState::Stopped | PlayerState::Paused);
                if affected {
                    info!(target: MACHINE_LOG_TARGET, "Connection lost, waiting for it to come back.");
                    self.enter_waiting(now, effects);
                }
            }
            ConnectivityEvent::Reachable => {
                self.reachable = true;
                if self.state != PlayerState::WaitingForConnection {
                    return;
                }
                if let Some(record) = self.connection_loss {
                    let within = now.duration_since(record.instant)
                        < self.settings.maximum_connection_loss_duration();
                    if self.settings.resume_after_connection_loss
                        && within
                        && record.state_at_loss != PlayerState::Stopped
                    {
                        info!(target: MACHINE_LOG_TARGET, "Connection restored, retrying current item.");
                        self.retry_or_advance(now, effects);
                    } else {
                        debug!(target: MACHINE_LOG_TARGET, "Connection restored but resume conditions not met.");
                    }
                }
            }
        }
    }

    fn apply_host(&mut self, event: HostEvent, now: Instant, effects: &mut Vec<Effect>) {
        match event {
            HostEvent::InterruptionBegan => {
                if matches!(self.state, PlayerState::Playing | PlayerState::Buffering) {
                    info!(target: MACHINE_LOG_TARGET, "System interruption began, pausing.");
                    self.paused_for_interruption = true;
                    effects.push(Effect::Pause);
                    self.set_state(PlayerState::Paused, effects);
                }
            }
            HostEvent::InterruptionEnded { should_resume } => {
                if self.paused_for_interruption {
                    self.paused_for_interruption = false;
                    if should_resume
                        && self.settings.resume_after_interruption
                        && self.state == PlayerState::Paused
                    {
                        info!(target: MACHINE_LOG_TARGET, "System interruption ended, resuming.");
                        effects.push(Effect::Play);
                        effects.push(Effect::SetRate(self.rate));
                        self.set_state(PlayerState::Playing, effects);
                    }
                }
            }
            HostEvent::MediaServicesReset => {
                if self.state != PlayerState::Stopped {
                    warn!(target: MACHINE_LOG_TARGET, "Audio subsystem reset, restarting current item.");
                    self.interruption_count += 1;
                    self.set_state(PlayerState::Stopped, effects);
                    self.retry_or_advance(now, effects);
                }
            }
        }
    }

    // --- Transition helpers ---

    fn set_state(&mut self, to: PlayerState, effects: &mut Vec<Effect>) {
        if self.state != to {
            let from = mem::replace(&mut self.state, to);
            debug!(target: MACHINE_LOG_TARGET, ?from, ?to, "State transition.");
            effects.push(Effect::Notify(PlayerNotification::StateChanged { from, to }));
        }
    }

    /// Loads the current queue entry at the current quality tier, or enters
    /// `WaitingForConnection` when its remote source is unreachable.
    /// `resume_at` restores a prior position after the load (retry flow).
    fn select_current(
        &mut self,
        resume_at: Option<Duration>,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let item = match self.queue.current() {
            Some(entry) => entry.item.clone(),
            None => {
                self.stop_into(effects);
                return;
            }
        };
        let url = item.sources.url_for(self.quality).clone();
        effects.push(Effect::CancelRetryTimer);
        if !connectivity::is_always_reachable(&url) && !self.reachable {
            debug!(target: MACHINE_LOG_TARGET, title = %item.title, "Selected item is unreachable, waiting for connection.");
            // The selection was headed for Buffering; record that as the
            // loss state so a later restoration is allowed to resume.
            self.enter_waiting_as(now, PlayerState::Buffering, effects);
            return;
        }
        self.duration = None;
        self.position = resume_at.unwrap_or(Duration::ZERO);
        self.quality_change_in_flight = false;
        info!(target: MACHINE_LOG_TARGET, title = %item.title, quality = ?self.quality, "Loading item.");
        effects.push(Effect::Notify(PlayerNotification::WillStartItem {
            item: item.clone(),
        }));
        effects.push(Effect::Load { url });
        if let Some(at) = resume_at {
            if !at.is_zero() {
                effects.push(Effect::Seek(at));
            }
        }
        self.set_state(PlayerState::Buffering, effects);
        effects.push(Effect::RefreshNowPlaying);
    }

    fn enter_waiting(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.enter_waiting_as(now, self.state, effects);
    }

    fn enter_waiting_as(
        &mut self,
        now: Instant,
        state_at_loss: PlayerState,
        effects: &mut Vec<Effect>,
    ) {
        if self.state != PlayerState::WaitingForConnection {
            self.connection_loss = Some(ConnectionLossRecord {
                instant: now,
                state_at_loss,
            });
            self.set_state(PlayerState::WaitingForConnection, effects);
        }
    }

    /// Buffering resolved: the engine can keep up (or is already producing
    /// progress). Settles to `Paused` when a pause is pending, otherwise
    /// starts playing and resets the retry session.
    fn engine_ready(&mut self, effects: &mut Vec<Effect>) {
        self.quality_change_in_flight = false;
        if self.paused_for_interruption {
            return;
        }
        if self.pause_requested {
            self.set_state(PlayerState::Paused, effects);
            return;
        }
        if let Some(record) = self.connection_loss {
            if record.state_at_loss == PlayerState::Paused {
                self.connection_loss = None;
                self.set_state(PlayerState::Paused, effects);
                return;
            }
        }
        self.connection_loss = None;
        self.retry_count = 0;
        effects.push(Effect::CancelRetryTimer);
        effects.push(Effect::Play);
        effects.push(Effect::SetRate(self.rate));
        self.set_state(PlayerState::Playing, effects);
        if self.settings.adjust_quality_automatically && !self.quality_timer_armed {
            self.quality_timer_armed = true;
            effects.push(Effect::ArmQualityTimer(self.settings.adjust_quality_interval()));
        }
        effects.push(Effect::RefreshNowPlaying);
    }

    /// Reload the current item while the retry budget lasts; past the
    /// budget, reset the counter and fall through to the item-end policy.
    fn retry_or_advance(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.state == PlayerState::Playing {
            return;
        }
        if self.queue.current().is_none() {
            return;
        }
        match retry::next_attempt(self.retry_count, self.settings.maximum_retry_count) {
            RetryDecision::Schedule => {
                self.retry_count += 1;
                info!(
                    target: MACHINE_LOG_TARGET,
                    attempt = self.retry_count,
                    maximum = self.settings.maximum_retry_count,
                    "Retrying current item."
                );
                let resume_at = self.position;
                self.select_current(Some(resume_at), now, effects);
                effects.push(Effect::ArmRetryTimer(self.settings.retry_timeout_duration()));
            }
            RetryDecision::BudgetExhausted => {
                info!(target: MACHINE_LOG_TARGET, "Retry budget exhausted, falling through to next-or-stop.");
                self.retry_count = 0;
                effects.push(Effect::CancelRetryTimer);
                self.finish_or_advance(now, effects);
            }
        }
    }

    /// Item-end policy: repeat-current wins, then queue advance, then stop.
    fn finish_or_advance(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.mode.repeat() && self.queue.current().is_some() {
            self.position = Duration::ZERO;
            effects.push(Effect::Seek(Duration::ZERO));
            effects.push(Effect::Play);
            self.set_state(PlayerState::Playing, effects);
            effects.push(Effect::RefreshNowPlaying);
        } else if self.queue.has_next(self.mode) {
            self.queue.advance_next(self.mode);
            self.select_current(None, now, effects);
        } else {
            self.stop_into(effects);
        }
    }

    /// One quality-evaluation run. The interruption window restarts after
    /// every run, whatever branch was taken; the timer rearms itself while
    /// automatic adjustment stays enabled and an item is active.
    fn evaluate_quality(&mut self, effects: &mut Vec<Effect>) {
        if !self.settings.adjust_quality_automatically {
            self.quality_timer_armed = false;
            return;
        }
        let item = match self.queue.current() {
            Some(entry) => entry.item.clone(),
            None => {
                self.quality_timer_armed = false;
                return;
            }
        };

        let directive = quality::evaluate_window(
            self.interruption_count,
            self.settings.adjust_quality_after_interruption_count,
        );
        if let Some(next_tier) = quality::target_tier(self.quality, directive) {
            let target_url = item.sources.url_for(next_tier);
            if target_url != item.sources.url_for(self.quality) {
                info!(
                    target: MACHINE_LOG_TARGET,
                    from_tier = ?self.quality,
                    to_tier = ?next_tier,
                    "Changing quality tier."
                );
                let url = target_url.clone();
                let resume_at = self.position;
                self.quality = next_tier;
                // The swap causes its own underrun; don't count it.
                self.quality_change_in_flight = true;
                effects.push(Effect::ReplaceSource { url });
                effects.push(Effect::Seek(resume_at));
            } else {
                debug!(target: MACHINE_LOG_TARGET, to_tier = ?next_tier, "Tier change skipped, same source URL.");
            }
        }

        self.interruption_count = 0;
        effects.push(Effect::ArmQualityTimer(self.settings.adjust_quality_interval()));
        self.quality_timer_armed = true;
    }

    fn stop_into(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::CancelRetryTimer);
        effects.push(Effect::CancelQualityTimer);
        effects.push(Effect::Release);
        effects.push(Effect::EndBackgroundTask);
        self.queue.clear();
        self.connection_loss = None;
        self.retry_count = 0;
        self.interruption_count = 0;
        self.quality_change_in_flight = false;
        self.quality_timer_armed = false;
        self.paused_for_interruption = false;
        self.pause_requested = false;
        self.duration = None;
        self.position = Duration::ZERO;
        self.set_state(PlayerState::Stopped, effects);
        effects.push(Effect::RefreshNowPlaying);
    }

    fn current_is_remote(&self) -> bool {
        self.queue
            .current()
            .map(|e| !connectivity::is_always_reachable(e.item.sources.url_for(self.quality)))
            .unwrap_or(false)
    }

    fn progression_notification(&self) -> PlayerNotification {
        let percent = match self.duration {
            Some(total) if !total.is_zero() => {
                (self.position.as_secs_f32() / total.as_secs_f32()) * 100.0
            }
            _ => 0.0,
        };
        PlayerNotification::ProgressionUpdated {
            position: self.position,
            percent,
        }
    }
}

#[cfg(test)]
impl PlayerCore {
    pub(crate) fn state(&self) -> PlayerState {
        self.state
    }

    pub(crate) fn queue(&self) -> &PlayQueue {
        &self.queue
    }

    pub(crate) fn quality(&self) -> QualityTier {
        self.quality
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn interruption_count(&self) -> u32 {
        self.interruption_count
    }

    pub(crate) fn position(&self) -> Duration {
        self.position
    }
}
