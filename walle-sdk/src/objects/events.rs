//! Bus event payloads.
//!
//! All three events are JSON encoded. Amounts are decimals and serialize as
//! strings so that no precision is lost in transit; numeric amounts are still
//! accepted on decode.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of the `deposit_initiated` topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositEvent {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub transaction_id: Uuid,
}

/// Payload of the `deposit_completed` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub transaction_id: Uuid,
}

/// Payload of the `notification` topic.
///
/// `channel` is kept as a plain string on the wire; resolving it to a
/// registered sender is the dispatcher's job, and an unknown channel must not
/// make the message undecodable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl NotificationEvent {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            data: serde_json::Map::new(),
        }
    }

    /// Builder-style insert into `data`.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}
