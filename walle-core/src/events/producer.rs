use super::BusEvent;
use crate::bus::{BusError, EventBus, OutboundMessage};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Serializes events and publishes them to their topic in one batch.
#[derive(Clone)]
pub struct EventProducer {
    bus: Arc<dyn EventBus>,
}

impl EventProducer {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    pub async fn publish<E: BusEvent>(&self, event: &E) -> Result<(), PublishError> {
        self.publish_batch(std::slice::from_ref(event)).await
    }

    /// Publish all `events` to `E::TOPIC`. Nothing is sent if any event fails
    /// to encode.
    pub async fn publish_batch<E: BusEvent>(&self, events: &[E]) -> Result<(), PublishError> {
        if events.is_empty() {
            return Ok(());
        }
        let messages = events
            .iter()
            .map(|event| {
                Ok(OutboundMessage {
                    key: event.key(),
                    payload: Bytes::from(serde_json::to_vec(event)?),
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;
        self.bus.publish(E::TOPIC, messages).await?;
        Ok(())
    }
}
