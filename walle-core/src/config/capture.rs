use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Distance between now and the end of the window.
    pub lag: Duration,
    /// Width of the window.
    pub width: Duration,
    /// A run that takes longer is rolled back.
    pub timeout: Duration,
    /// Period of the in-process schedule. `None` leaves capture to an
    /// external scheduler invoking the `capture` command.
    pub interval: Option<Duration>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            lag: Duration::from_secs(3600),
            width: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
            interval: Some(Duration::from_secs(600)),
        }
    }
}
