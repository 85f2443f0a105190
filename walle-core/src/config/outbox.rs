use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    /// A pending deposit is republished once its last publish is this old.
    /// Keep it above the time settlement normally takes.
    pub min_age: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            min_age: Duration::from_secs(30),
        }
    }
}
