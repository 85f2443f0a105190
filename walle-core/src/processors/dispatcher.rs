//! NotificationDispatcher processor.
//!
//! Consumes `notification`, resolves the channel against the registry and hands
//! the notification to that channel's sender. Notifications are best-effort:
//! an unknown channel, a malformed payload or a failed send is logged and the
//! message is acknowledged anyway.

use super::consumer_pool::{ConsumerPool, ConsumerWorker};
use crate::bus::{BusMessage, EventBus};
use crate::config::ConsumerConfig;
use crate::events::decode;
use crate::notification::{ChannelKind, ChannelRegistry, DispatchError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use walle_sdk::objects::NotificationEvent;
use walle_sdk::topics;

pub struct NotificationDispatcher {
    pool: ConsumerPool,
    registry: Arc<ChannelRegistry>,
}

impl NotificationDispatcher {
    pub fn new(bus: Arc<dyn EventBus>, registry: ChannelRegistry, config: ConsumerConfig) -> Self {
        Self {
            pool: ConsumerPool::new("NotificationDispatcher", bus, topics::NOTIFICATION, config),
            registry: Arc::new(registry),
        }
    }

    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        let Self { pool, registry } = self;
        let flush_threshold = pool.config().flush_threshold;

        pool.run(
            move |id| DispatchWorker {
                id,
                registry: registry.clone(),
                flush_threshold,
                pending_acks: Vec::new(),
            },
            shutdown_rx,
        )
        .await;
    }
}

struct DispatchWorker {
    id: usize,
    registry: Arc<ChannelRegistry>,
    flush_threshold: usize,
    pending_acks: Vec<u64>,
}

impl DispatchWorker {
    async fn dispatch(&self, message: &BusMessage) -> Result<ChannelKind, DispatchError> {
        let notification: NotificationEvent = decode(message)?;
        let (kind, sender) = self.registry.resolve(&notification.channel)?;
        sender
            .send(&notification)
            .await
            .map_err(|source| DispatchError::Send {
                channel: kind,
                source,
            })?;
        Ok(kind)
    }
}

#[async_trait]
impl ConsumerWorker for DispatchWorker {
    async fn handle(&mut self, message: BusMessage) {
        match self.dispatch(&message).await {
            Ok(channel) => debug!(worker = self.id, %channel, offset = message.offset, "Notification sent"),
            Err(e) => warn!(
                worker = self.id,
                offset = message.offset,
                error = %e,
                "Notification dropped"
            ),
        }
        self.pending_acks.push(message.offset);
    }

    fn should_flush(&self) -> bool {
        self.pending_acks.len() >= self.flush_threshold
    }

    async fn flush(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.pending_acks)
    }
}
