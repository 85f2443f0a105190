//! Runtime configuration for the pipeline.
//!
//! These types are the validated form of the configuration. Reading and
//! validating the TOML file is the server crate's job; everything here has
//! defaults so the processors can be built without a file.

mod capture;
mod consumer;
mod notification;
mod outbox;

pub use capture::CaptureConfig;
pub use consumer::{
    ConsumerConfig, COMPLETION_GROUP, NOTIFICATION_GROUP, SETTLEMENT_GROUP,
};
pub use notification::{ChannelConfig, ChannelTarget, DispatcherConfig, SettlementConfig};
pub use outbox::OutboxConfig;

use std::time::Duration;

/// In-process bus settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// How long a fetched message may stay unacknowledged before redelivery.
    pub redelivery_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redelivery_timeout: crate::bus::DEFAULT_REDELIVERY_TIMEOUT,
        }
    }
}

/// Everything the pipeline processors need, in one place.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub bus: BusConfig,
    pub settlement: SettlementConfig,
    pub completion: ConsumerConfig,
    pub dispatcher: DispatcherConfig,
    pub capture: CaptureConfig,
    pub outbox: OutboxConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            settlement: SettlementConfig::default(),
            completion: ConsumerConfig::completion(),
            dispatcher: DispatcherConfig::default(),
            capture: CaptureConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}
