//! Quality adaptation: interruption-window evaluation and the recurring
//! re-evaluation timer.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::state::PlayerEvent;
use crate::item::QualityTier;

const QUALITY_LOG_TARGET: &str = "audiopilot::player::quality";

/// Outcome of one interruption-window evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QualityDirective {
    Downgrade,
    Upgrade,
    Hold,
}

/// An interruption-free window invites an upgrade; reaching the threshold
/// forces a downgrade; anything in between holds the tier.
pub(crate) fn evaluate_window(interruptions: u32, threshold: u32) -> QualityDirective {
    if interruptions >= threshold {
        QualityDirective::Downgrade
    } else if interruptions == 0 {
        QualityDirective::Upgrade
    } else {
        QualityDirective::Hold
    }
}

/// The tier a directive steps to, when a step exists from `current`.
pub(crate) fn target_tier(current: QualityTier, directive: QualityDirective) -> Option<QualityTier> {
    match directive {
        QualityDirective::Downgrade => current.lower(),
        QualityDirective::Upgrade => current.higher(),
        QualityDirective::Hold => None,
    }
}

/// Recurring evaluation timer, rearmed after every firing while automatic
/// adjustment stays enabled. Same single-outstanding-task discipline as the
/// retry timer.
#[derive(Default)]
pub(crate) struct QualityTimer {
    handle: Option<JoinHandle<()>>,
}

impl QualityTimer {
    pub fn arm(&mut self, period: Duration, event_tx: mpsc::Sender<PlayerEvent>) {
        self.cancel();
        debug!(target: QUALITY_LOG_TARGET, ?period, "Arming quality re-evaluation timer.");
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if event_tx.send(PlayerEvent::QualityTimerFired).await.is_err() {
                trace!(target: QUALITY_LOG_TARGET, "Player gone before quality timer delivery.");
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            trace!(target: QUALITY_LOG_TARGET, "Cancelled pending quality timer.");
        }
    }
}

impl Drop for QualityTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
