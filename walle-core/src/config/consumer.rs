use std::time::Duration;

pub const SETTLEMENT_GROUP: &str = "wallet-group";
pub const COMPLETION_GROUP: &str = "transaction-group";
pub const NOTIFICATION_GROUP: &str = "notification-group";

/// Shape of one bus consumer: a fetch loop feeding `workers` workers through a
/// bounded queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub group: String,
    pub workers: usize,
    /// Upper bound on messages per fetch.
    pub batch_size: usize,
    /// How long a fetch waits for the first message.
    pub fetch_timeout: Duration,
    pub queue_capacity: usize,
    /// Buffered results per worker that force a flush.
    pub flush_threshold: usize,
    /// Upper bound on how long a result stays buffered.
    pub flush_interval: Duration,
    /// How long shutdown waits for workers before aborting them.
    pub shutdown_grace: Duration,
}

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

impl ConsumerConfig {
    pub fn settlement() -> Self {
        Self {
            group: SETTLEMENT_GROUP.to_string(),
            workers: 10,
            batch_size: 50,
            fetch_timeout: Duration::from_millis(500),
            queue_capacity: crate::events::DEFAULT_CHANNEL_BUFFER,
            flush_threshold: 10,
            flush_interval: Duration::from_millis(200),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn completion() -> Self {
        Self {
            group: COMPLETION_GROUP.to_string(),
            workers: 1,
            batch_size: 100,
            fetch_timeout: Duration::from_millis(500),
            queue_capacity: crate::events::DEFAULT_CHANNEL_BUFFER,
            flush_threshold: 100,
            flush_interval: Duration::from_millis(200),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn notification() -> Self {
        Self {
            group: NOTIFICATION_GROUP.to_string(),
            workers: 10,
            batch_size: 50,
            fetch_timeout: Duration::from_millis(500),
            queue_capacity: crate::events::DEFAULT_CHANNEL_BUFFER,
            flush_threshold: 10,
            flush_interval: Duration::from_millis(200),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Describe the first knob that would stall or break the consumer.
    pub fn validate(&self) -> Result<(), String> {
        if self.group.is_empty() {
            return Err("consumer group must not be empty".to_string());
        }
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1".to_string());
        }
        if self.flush_threshold == 0 {
            return Err("flush_threshold must be at least 1".to_string());
        }
        if self.flush_interval.is_zero() {
            return Err("flush_interval must be positive".to_string());
        }
        if self.shutdown_grace.is_zero() {
            return Err("shutdown_grace must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        for config in [
            ConsumerConfig::settlement(),
            ConsumerConfig::completion(),
            ConsumerConfig::notification(),
        ] {
            assert_eq!(config.validate(), Ok(()));
        }
    }

    #[test]
    fn zero_knobs_are_rejected() {
        let mut config = ConsumerConfig::settlement();
        config.workers = 0;
        assert_eq!(config.validate(), Err("workers must be at least 1".to_string()));

        let mut config = ConsumerConfig::settlement();
        config.flush_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = ConsumerConfig::notification();
        config.shutdown_grace = Duration::ZERO;
        assert_eq!(
            config.validate(),
            Err("shutdown_grace must be positive".to_string())
        );
    }
}
