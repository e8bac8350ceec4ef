//! Connectivity monitor interface.
//!
//! The monitor itself is an external collaborator; the player only consumes
//! its reachability transitions, marshaled onto the player task through the
//! event channel.

use url::Url;

/// Reachability transition reported by the external monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Reachable,
    Unreachable,
}

/// Local file sources are always treated as reachable without consulting
/// the monitor.
pub fn is_always_reachable(url: &Url) -> bool {
    url.scheme() == "file"
}
