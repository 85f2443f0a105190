//! OutboxRelay processor.
//!
//! Republishes `deposit_initiated` events for transactions that are still
//! `pending` once their last publish is older than `min_age`. That covers a
//! publish that failed, a crash between commit and publish, and events lost
//! with the bus itself. The applied-deposit guard absorbs the duplicates.

use crate::config::OutboxConfig;
use crate::events::{EventProducer, PublishError};
use crate::store::LedgerStore;
use crate::utils::shutdown::wait_for_shutdown;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};
use walle_sdk::objects::DepositEvent;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

pub struct OutboxRelay {
    ledger: Arc<dyn LedgerStore>,
    producer: EventProducer,
    config: OutboxConfig,
}

impl OutboxRelay {
    pub fn new(ledger: Arc<dyn LedgerStore>, producer: EventProducer, config: OutboxConfig) -> Self {
        Self {
            ledger,
            producer,
            config,
        }
    }

    /// Publish one batch of stale entries. Returns how many were relayed.
    pub async fn relay_once(&self) -> Result<usize, RelayError> {
        let entries = self
            .ledger
            .stalled_outbox(self.config.min_age, self.config.batch_size)
            .await?;
        if entries.is_empty() {
            return Ok(0);
        }

        let events: Vec<DepositEvent> = entries.iter().map(|e| e.payload.0.clone()).collect();
        self.producer.publish_batch(&events).await?;

        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        self.ledger.mark_outbox_published(&ids).await?;

        info!(count = ids.len(), "Relayed outbox entries");
        Ok(ids.len())
    }

    /// Run the OutboxRelay until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("OutboxRelay started");

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("OutboxRelay received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    match self.relay_once().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "Outbox poll relayed entries"),
                        Err(e) => error!(error = %e, "Failed to relay outbox"),
                    }
                }
            }
        }

        info!("OutboxRelay shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::entities::TransactionStatus;
    use crate::processors::Intake;
    use crate::testing::{FlakyBus, MemoryLedger};
    use kanau::processor::Processor;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use uuid::Uuid;
    use walle_sdk::objects::DepositRequest;
    use walle_sdk::topics;

    fn request(key: &str) -> DepositRequest {
        DepositRequest {
            wallet_id: Uuid::from_u128(7),
            amount: dec!(12.34),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn relays_entries_left_by_failed_publish() {
        let ledger = Arc::new(MemoryLedger::default());
        let bus = Arc::new(FlakyBus::default());
        bus.fail_topic(topics::DEPOSIT_INITIATED, true);
        let producer = EventProducer::new(bus.clone());
        let intake = Intake::new(ledger.clone(), producer.clone());
        let transaction_id = match intake.process(request("a")).await {
            Err(_) => ledger.rows()[0].id,
            Ok(id) => id,
        };
        bus.fail_topic(topics::DEPOSIT_INITIATED, false);

        let relay = OutboxRelay::new(ledger.clone(), producer, OutboxConfig::default());

        // Too fresh: still owned by the intake call.
        assert_eq!(relay.relay_once().await.unwrap(), 0);

        ledger.age_outbox(Duration::from_secs(60));
        assert_eq!(relay.relay_once().await.unwrap(), 1);
        assert_eq!(relay.relay_once().await.unwrap(), 0);
        assert_eq!(ledger.outbox_published(), [true]);

        let published = bus.inner.published(topics::DEPOSIT_INITIATED).await;
        assert_eq!(published.len(), 1);
        let event: DepositEvent = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(event.transaction_id, transaction_id);
        assert_eq!(event.amount, dec!(12.34));
    }

    #[tokio::test]
    async fn publish_failure_keeps_entries_pending() {
        let ledger = Arc::new(MemoryLedger::default());
        let bus = Arc::new(FlakyBus::default());
        bus.fail_topic(topics::DEPOSIT_INITIATED, true);
        let producer = EventProducer::new(bus.clone());
        let _ = Intake::new(ledger.clone(), producer.clone())
            .process(request("b"))
            .await;
        ledger.age_outbox(Duration::from_secs(60));

        let relay = OutboxRelay::new(ledger.clone(), producer, OutboxConfig::default());
        assert!(matches!(relay.relay_once().await, Err(RelayError::Publish(_))));
        assert_eq!(ledger.outbox_published(), [false]);
    }

    #[tokio::test]
    async fn recently_published_entries_are_not_relayed() {
        let ledger = Arc::new(MemoryLedger::default());
        let bus = Arc::new(InMemoryBus::default());
        let producer = EventProducer::new(bus.clone());
        Intake::new(ledger.clone(), producer.clone())
            .process(request("c"))
            .await
            .unwrap();

        let relay = OutboxRelay::new(ledger, producer, OutboxConfig::default());
        assert_eq!(relay.relay_once().await.unwrap(), 0);
        assert_eq!(bus.published(topics::DEPOSIT_INITIATED).await.len(), 1);
    }

    #[tokio::test]
    async fn pending_deposits_survive_a_lost_bus() {
        let ledger = Arc::new(MemoryLedger::default());

        // Accepted and published, then the process restarts before settling.
        let first_bus = Arc::new(InMemoryBus::default());
        let transaction_id = Intake::new(ledger.clone(), EventProducer::new(first_bus.clone()))
            .process(request("abc"))
            .await
            .unwrap();
        assert_eq!(ledger.outbox_published(), [true]);
        drop(first_bus);

        let bus = Arc::new(InMemoryBus::default());
        let relay = OutboxRelay::new(
            ledger.clone(),
            EventProducer::new(bus.clone()),
            OutboxConfig::default(),
        );
        ledger.age_outbox(Duration::from_secs(3600));
        assert_eq!(relay.relay_once().await.unwrap(), 1);
        assert_eq!(ledger.status(transaction_id), Some(TransactionStatus::Pending));

        let published = bus.published(topics::DEPOSIT_INITIATED).await;
        assert_eq!(published.len(), 1);
        let event: DepositEvent = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(event.transaction_id, transaction_id);

        // Republished rows wait another `min_age` before the next attempt.
        assert_eq!(relay.relay_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settled_transactions_are_never_relayed() {
        let ledger = Arc::new(MemoryLedger::default());
        let bus = Arc::new(InMemoryBus::default());
        let producer = EventProducer::new(bus.clone());
        let transaction_id = Intake::new(ledger.clone(), producer.clone())
            .process(request("d"))
            .await
            .unwrap();
        ledger.set_status(transaction_id, TransactionStatus::Completed);
        ledger.age_outbox(Duration::from_secs(3600));

        let relay = OutboxRelay::new(ledger, producer, OutboxConfig::default());
        assert_eq!(relay.relay_once().await.unwrap(), 0);
        assert_eq!(bus.published(topics::DEPOSIT_INITIATED).await.len(), 1);
    }
}
