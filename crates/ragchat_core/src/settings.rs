use std::time::Duration;

use crate::UploadPolicy;

/// Timing and policy knobs for the core state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Interval between `health_check` messages while connected.
    pub heartbeat_interval: Duration,
    /// Time a query may stay in `Processing` before it is timed out.
    pub query_timeout: Duration,
    /// How long a completed workflow stays on screen before resetting to idle.
    pub completion_grace: Duration,
    /// Visible hold of a completed status before it starts fading.
    pub hide_hold: Duration,
    pub hide_fade: Duration,
    /// Lifetime of a successful upload banner.
    pub upload_status_clear: Duration,
    pub upload: UploadPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            query_timeout: Duration::from_secs(120),
            completion_grace: Duration::from_secs(3),
            hide_hold: Duration::from_secs(2),
            hide_fade: Duration::from_secs(1),
            upload_status_clear: Duration::from_secs(5),
            upload: UploadPolicy::default(),
        }
    }
}
