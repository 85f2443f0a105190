//! SettlementConsumer processor.
//!
//! The SettlementConsumer is responsible for:
//! - Consuming `DepositEvent` from `deposit_initiated`
//! - Crediting the wallet balance exactly once per transaction
//! - Emitting `CompletionEvent` and `NotificationEvent` in batches
//! - Acknowledging a delivery only after its completion has been published
//!
//! A delivery whose credit was already applied re-emits its completion (the
//! ledger update is idempotent) but not its notification.

use super::consumer_pool::{ConsumerPool, ConsumerWorker};
use crate::bus::{BusMessage, EventBus};
use crate::config::SettlementConfig;
use crate::events::{decode, EventProducer};
use crate::notification::template::DEPOSIT_TEMPLATE;
use crate::notification::ChannelKind;
use crate::store::{BalanceStore, CreditOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walle_sdk::objects::{CompletionEvent, DepositEvent, NotificationEvent};
use walle_sdk::topics;

/// Errors that leave a delivery unacknowledged.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("malformed deposit event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("wallet not found: {0}")]
    WalletNotFound(Uuid),
}

pub struct SettlementConsumer {
    pool: ConsumerPool,
    balances: Arc<dyn BalanceStore>,
    producer: EventProducer,
    notification_channel: ChannelKind,
}

impl SettlementConsumer {
    pub fn new(
        bus: Arc<dyn EventBus>,
        balances: Arc<dyn BalanceStore>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            pool: ConsumerPool::new(
                "SettlementConsumer",
                bus.clone(),
                topics::DEPOSIT_INITIATED,
                config.consumer,
            ),
            balances,
            producer: EventProducer::new(bus),
            notification_channel: config.notification_channel,
        }
    }

    /// Run the SettlementConsumer until shutdown.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        let Self {
            pool,
            balances,
            producer,
            notification_channel,
        } = self;
        let flush_threshold = pool.config().flush_threshold;

        pool.run(
            move |id| SettlementWorker {
                id,
                balances: balances.clone(),
                producer: producer.clone(),
                notification_channel,
                flush_threshold,
                pending_acks: Vec::new(),
                completions: Vec::new(),
                notifications: Vec::new(),
            },
            shutdown_rx,
        )
        .await;
    }
}

struct SettlementWorker {
    id: usize,
    balances: Arc<dyn BalanceStore>,
    producer: EventProducer,
    notification_channel: ChannelKind,
    flush_threshold: usize,
    pending_acks: Vec<u64>,
    completions: Vec<CompletionEvent>,
    notifications: Vec<NotificationEvent>,
}

impl SettlementWorker {
    async fn apply(&self, message: &BusMessage) -> Result<(DepositEvent, CreditOutcome), SettlementError> {
        let event: DepositEvent = decode(message)?;
        match self.balances.apply_deposit(&event).await? {
            CreditOutcome::UnknownWallet => Err(SettlementError::WalletNotFound(event.wallet_id)),
            outcome => Ok((event, outcome)),
        }
    }

    fn notification_for(&self, event: &DepositEvent) -> NotificationEvent {
        NotificationEvent::new(self.notification_channel.as_str())
            .with("wallet_id", event.wallet_id.to_string())
            .with("amount", event.amount.to_string())
            .with("transaction_id", event.transaction_id.to_string())
            .with("template", DEPOSIT_TEMPLATE)
    }
}

#[async_trait]
impl ConsumerWorker for SettlementWorker {
    async fn handle(&mut self, message: BusMessage) {
        match self.apply(&message).await {
            Ok((event, CreditOutcome::Applied)) => {
                debug!(
                    worker = self.id,
                    transaction_id = %event.transaction_id,
                    wallet_id = %event.wallet_id,
                    amount = %event.amount,
                    "Deposit credited"
                );
                self.notifications.push(self.notification_for(&event));
                self.completions.push(CompletionEvent {
                    transaction_id: event.transaction_id,
                });
                self.pending_acks.push(message.offset);
            }
            Ok((event, _)) => {
                info!(
                    worker = self.id,
                    transaction_id = %event.transaction_id,
                    delivery = message.delivery,
                    "Deposit already credited, re-emitting completion"
                );
                self.completions.push(CompletionEvent {
                    transaction_id: event.transaction_id,
                });
                self.pending_acks.push(message.offset);
            }
            Err(e) => {
                warn!(
                    worker = self.id,
                    offset = message.offset,
                    delivery = message.delivery,
                    error = %e,
                    "Deposit not applied, leaving for redelivery"
                );
            }
        }
    }

    fn should_flush(&self) -> bool {
        self.completions.len() >= self.flush_threshold
    }

    async fn flush(&mut self) -> Vec<u64> {
        let acks = std::mem::take(&mut self.pending_acks);
        let completions = std::mem::take(&mut self.completions);
        let notifications = std::mem::take(&mut self.notifications);
        if acks.is_empty() {
            return acks;
        }

        // Notifications go first: once a credit is acknowledged its redelivery
        // is a duplicate and will not produce a notification again.
        if let Err(e) = self.producer.publish_batch(&notifications).await {
            warn!(
                worker = self.id,
                count = notifications.len(),
                error = %e,
                "Failed to publish notifications"
            );
        }

        if let Err(e) = self.producer.publish_batch(&completions).await {
            error!(
                worker = self.id,
                count = completions.len(),
                error = %e,
                "Failed to publish completions, batch left unacknowledged"
            );
            return Vec::new();
        }

        debug!(worker = self.id, count = completions.len(), "Settlement batch flushed");
        acks
    }
}
