//! Typed events on top of the bus.
//!
//! # Event Flow
//!
//! 1. Intake (or the outbox relay) publishes `DepositEvent` -> `deposit_initiated`
//! 2. `SettlementConsumer` credits the wallet and publishes `CompletionEvent`
//!    -> `deposit_completed` and `NotificationEvent` -> `notification`
//! 3. `CompletionConsumer` moves the ledger row to `completed`
//! 4. `NotificationDispatcher` routes each notification to its channel
//!
//! Every event is keyed by its transaction id and is safe to process more than
//! once.

pub mod channels;
pub mod producer;

pub use channels::{work_queue, WorkQueueReceiver, WorkQueueSender, DEFAULT_CHANNEL_BUFFER};
pub use producer::{EventProducer, PublishError};

use crate::bus::BusMessage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use walle_sdk::objects::{CompletionEvent, DepositEvent, NotificationEvent};
use walle_sdk::topics;

/// An event with a fixed home topic.
pub trait BusEvent: Serialize + DeserializeOwned {
    const TOPIC: &'static str;

    /// Partitioning key.
    fn key(&self) -> String;
}

impl BusEvent for DepositEvent {
    const TOPIC: &'static str = topics::DEPOSIT_INITIATED;

    fn key(&self) -> String {
        self.transaction_id.to_string()
    }
}

impl BusEvent for CompletionEvent {
    const TOPIC: &'static str = topics::DEPOSIT_COMPLETED;

    fn key(&self) -> String {
        self.transaction_id.to_string()
    }
}

impl BusEvent for NotificationEvent {
    const TOPIC: &'static str = topics::NOTIFICATION;

    fn key(&self) -> String {
        self.data
            .get("transaction_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.channel)
            .to_string()
    }
}

/// Decode a fetched message into its event type.
pub fn decode<E: BusEvent>(message: &BusMessage) -> Result<E, serde_json::Error> {
    serde_json::from_slice(&message.payload)
}
