//! Event bus abstraction.
//!
//! The pipeline talks to a durable, partitioned log through [`EventBus`]:
//! publish a batch to a topic, fetch a bounded batch for a consumer group,
//! acknowledge offsets once they are durably processed. Delivery is
//! at-least-once; anything fetched and not acknowledged comes back.
//!
//! [`InMemoryBus`] is the in-process implementation used by the single
//! binary deployment and by tests. A broker adapter implements the same trait.

mod memory;

pub use memory::{InMemoryBus, DEFAULT_REDELIVERY_TIMEOUT};

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// A consumer group reading one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub topic: String,
    pub group: String,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
        }
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.group, self.topic)
    }
}

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub offset: u64,
    pub key: String,
    pub payload: Bytes,
    /// 1 on first delivery, incremented on every redelivery.
    pub delivery: u32,
}

/// A message waiting to be appended to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub key: String,
    pub payload: Bytes,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append `messages` to `topic` as one batch.
    async fn publish(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), BusError>;

    /// Fetch at most `max` messages for `subscription`, waiting up to `wait`
    /// for the first one. An empty batch means the wait ran out.
    async fn fetch(
        &self,
        subscription: &Subscription,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<BusMessage>, BusError>;

    /// Mark offsets as processed by the subscription's group.
    async fn ack(&self, subscription: &Subscription, offsets: &[u64]) -> Result<(), BusError>;
}
