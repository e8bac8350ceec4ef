//! Queue item model: immutable track metadata plus per-tier source URLs.

use serde::{Deserialize, Serialize};
use url::Url;

/// Ranked quality tiers for the same audio content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// The next tier down, if any.
    pub fn lower(self) -> Option<QualityTier> {
        match self {
            QualityTier::High => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::Low),
            QualityTier::Low => None,
        }
    }

    /// The next tier up, if any.
    pub fn higher(self) -> Option<QualityTier> {
        match self {
            QualityTier::Low => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::High),
            QualityTier::High => None,
        }
    }
}

/// Source URLs for each quality tier. Tiers may share a URL when the
/// provider has fewer than three renditions; tier changes are skipped in
/// that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualitySources {
    pub low: Url,
    pub medium: Url,
    pub high: Url,
}

impl QualitySources {
    /// All three tiers served from the same URL.
    pub fn single(url: Url) -> Self {
        QualitySources {
            low: url.clone(),
            medium: url.clone(),
            high: url,
        }
    }

    pub fn url_for(&self, tier: QualityTier) -> &Url {
        match tier {
            QualityTier::Low => &self.low,
            QualityTier::Medium => &self.medium,
            QualityTier::High => &self.high,
        }
    }
}

/// Immutable track metadata. The player holds it behind `Arc` while the
/// item is enqueued or current; ownership stays with the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioItem {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub artwork_url: Option<Url>,
    pub sources: QualitySources,
}
