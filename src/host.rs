//! Host execution environment interface: background-execution grants and
//! system-level audio signals.

/// Signals delivered by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// A system audio interruption began (another process took audio focus).
    InterruptionBegan,
    /// The interruption ended; `should_resume` carries the system's hint.
    InterruptionEnded { should_resume: bool },
    /// The audio subsystem was reset underneath the player.
    MediaServicesReset,
}

/// Grants and revokes extended background execution so playback can keep
/// recovering after the application loses foreground focus.
pub trait HostEnvironment: Send + Sync {
    fn begin_background_task(&self);
    fn end_background_task(&self);
}
