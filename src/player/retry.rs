//! Retry scheduling: a single pending retry timer plus the retry budget.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::state::PlayerEvent;

const RETRY_LOG_TARGET: &str = "audiopilot::player::retry";

/// Whether another reload attempt fits in the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    Schedule,
    BudgetExhausted,
}

/// `maximum == 0` disables retrying entirely.
pub(crate) fn next_attempt(retry_count: u32, maximum: u32) -> RetryDecision {
    if maximum > 0 && retry_count < maximum {
        RetryDecision::Schedule
    } else {
        RetryDecision::BudgetExhausted
    }
}

/// At most one retry timer is outstanding; arming aborts the previous one.
/// The timer delivers its firing through the player's event channel so the
/// callback runs on the player task, never on the timer's own context.
#[derive(Default)]
pub(crate) struct RetryTimer {
    handle: Option<JoinHandle<()>>,
}

impl RetryTimer {
    pub fn arm(&mut self, delay: Duration, event_tx: mpsc::Sender<PlayerEvent>) {
        self.cancel();
        debug!(target: RETRY_LOG_TARGET, ?delay, "Arming retry timer.");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if event_tx.send(PlayerEvent::RetryTimerFired).await.is_err() {
                trace!(target: RETRY_LOG_TARGET, "Player gone before retry timer delivery.");
            }
        }));
    }

    /// Invalidates the pending timer without firing it.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            trace!(target: RETRY_LOG_TARGET, "Cancelled pending retry timer.");
        }
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
