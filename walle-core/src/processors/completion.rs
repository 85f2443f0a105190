//! CompletionConsumer processor.
//!
//! Consumes `deposit_completed` and moves the matching ledger rows from
//! `pending` to `completed` in batches. A batch is acknowledged once the
//! update has committed; if the update fails the whole batch is redelivered.

use super::consumer_pool::{ConsumerPool, ConsumerWorker};
use crate::bus::{BusMessage, EventBus};
use crate::config::ConsumerConfig;
use crate::events::decode;
use crate::store::LedgerStore;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, warn};
use uuid::Uuid;
use walle_sdk::objects::CompletionEvent;
use walle_sdk::topics;

pub struct CompletionConsumer {
    pool: ConsumerPool,
    ledger: Arc<dyn LedgerStore>,
}

impl CompletionConsumer {
    pub fn new(bus: Arc<dyn EventBus>, ledger: Arc<dyn LedgerStore>, config: ConsumerConfig) -> Self {
        Self {
            pool: ConsumerPool::new("CompletionConsumer", bus, topics::DEPOSIT_COMPLETED, config),
            ledger,
        }
    }

    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        let Self { pool, ledger } = self;
        let flush_threshold = pool.config().flush_threshold;

        pool.run(
            move |id| CompletionWorker {
                id,
                ledger: ledger.clone(),
                flush_threshold,
                transaction_ids: Vec::new(),
                pending_acks: Vec::new(),
            },
            shutdown_rx,
        )
        .await;
    }
}

struct CompletionWorker {
    id: usize,
    ledger: Arc<dyn LedgerStore>,
    flush_threshold: usize,
    transaction_ids: Vec<Uuid>,
    pending_acks: Vec<u64>,
}

#[async_trait]
impl ConsumerWorker for CompletionWorker {
    async fn handle(&mut self, message: BusMessage) {
        match decode::<CompletionEvent>(&message) {
            Ok(event) => self.transaction_ids.push(event.transaction_id),
            Err(e) => {
                // Redelivering a payload that can never decode only blocks the group.
                warn!(
                    worker = self.id,
                    offset = message.offset,
                    error = %e,
                    "Dropping malformed completion event"
                );
            }
        }
        self.pending_acks.push(message.offset);
    }

    fn should_flush(&self) -> bool {
        self.pending_acks.len() >= self.flush_threshold
    }

    async fn flush(&mut self) -> Vec<u64> {
        let acks = std::mem::take(&mut self.pending_acks);
        let mut ids = std::mem::take(&mut self.transaction_ids);
        if ids.is_empty() {
            return acks;
        }
        ids.sort_unstable();
        ids.dedup();

        match self.ledger.mark_completed(&ids).await {
            Ok(changed) => {
                debug!(
                    worker = self.id,
                    requested = ids.len(),
                    changed,
                    "Transactions marked completed"
                );
                acks
            }
            Err(e) => {
                error!(
                    worker = self.id,
                    count = ids.len(),
                    error = %e,
                    "Failed to mark transactions completed, batch left unacknowledged"
                );
                Vec::new()
            }
        }
    }
}
