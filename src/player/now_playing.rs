//! Now-playing metadata reporting, a thin pass-through to the host's
//! display surface.

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::item::AudioItem;

const NOW_PLAYING_LOG_TARGET: &str = "audiopilot::player::now_playing";

/// Metadata snapshot for the host's "now playing" surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub artwork_url: Option<Url>,
    pub duration: Option<Duration>,
    pub elapsed: Duration,
    pub rate: f32,
}

/// External display surface the snapshot is pushed to.
pub trait NowPlayingDisplay: Send + Sync {
    fn update(&self, info: &NowPlayingInfo);
    fn clear(&self);
}

/// Derives the snapshot from the current item and pushes it out. Holds no
/// state of its own; the player invokes it after any dependent field
/// changes.
pub(crate) struct NowPlayingReporter {
    display: Arc<dyn NowPlayingDisplay>,
}

impl NowPlayingReporter {
    pub fn new(display: Arc<dyn NowPlayingDisplay>) -> Self {
        NowPlayingReporter { display }
    }

    pub fn refresh(
        &self,
        item: Option<&Arc<AudioItem>>,
        duration: Option<Duration>,
        elapsed: Duration,
        rate: f32,
    ) {
        match item {
            Some(item) => {
                let info = project(item, duration, elapsed, rate);
                trace!(target: NOW_PLAYING_LOG_TARGET, title = %info.title, "Updating now-playing info.");
                self.display.update(&info);
            }
            None => {
                trace!(target: NOW_PLAYING_LOG_TARGET, "Clearing now-playing info.");
                self.display.clear();
            }
        }
    }
}

/// Pure projection of the display fields.
pub(crate) fn project(
    item: &AudioItem,
    duration: Option<Duration>,
    elapsed: Duration,
    rate: f32,
) -> NowPlayingInfo {
    NowPlayingInfo {
        title: item.title.clone(),
        artist: item.artist.clone(),
        album: item.album.clone(),
        track_number: item.track_number,
        track_count: item.track_count,
        artwork_url: item.artwork_url.clone(),
        duration,
        elapsed,
        rate,
    }
}
