//! In-memory fakes shared by the processor tests.

use crate::bus::{BusError, BusMessage, EventBus, InMemoryBus, OutboundMessage, Subscription};
use crate::entities::{TransactionStatus, TransactionType};
use crate::notification::{NotificationSender, SendError};
use crate::store::{
    BalanceStore, CapturedTransaction, CreditOutcome, IntakeRecord, LedgerStore, NewDeposit,
    OutboxEntry,
};
use crate::utils::capture_window::CaptureWindow;
use crate::utils::utc_now;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::types::Json;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;
use walle_sdk::objects::{DepositEvent, NotificationEvent};

fn injected_failure() -> sqlx::Error {
    sqlx::Error::Protocol("injected failure".to_string())
}

#[derive(Debug, Clone)]
pub(crate) struct LedgerRow {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub idempotency_key: String,
    pub status: TransactionStatus,
    pub created_at: time::PrimitiveDateTime,
}

#[derive(Default)]
struct LedgerState {
    rows: Vec<LedgerRow>,
    /// Entry plus its last publish time.
    outbox: Vec<(OutboxEntry, Option<time::PrimitiveDateTime>)>,
}

/// Ledger with the same observable semantics as the Postgres store.
#[derive(Default)]
pub(crate) struct MemoryLedger {
    state: Mutex<LedgerState>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing.load(Ordering::SeqCst) {
            Err(injected_failure())
        } else {
            Ok(())
        }
    }

    pub fn rows(&self) -> Vec<LedgerRow> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn status(&self, id: Uuid) -> Option<TransactionStatus> {
        self.rows().into_iter().find(|r| r.id == id).map(|r| r.status)
    }

    /// Insert a row directly, bypassing intake.
    pub fn insert_row(
        &self,
        status: TransactionStatus,
        created_at: time::PrimitiveDateTime,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().rows.push(LedgerRow {
            id,
            wallet_id: Uuid::new_v4(),
            amount: Decimal::ONE,
            idempotency_key: id.to_string(),
            status,
            created_at,
        });
        id
    }

    pub fn outbox_published(&self) -> Vec<bool> {
        self.state
            .lock()
            .unwrap()
            .outbox
            .iter()
            .map(|(_, published_at)| published_at.is_some())
            .collect()
    }

    /// Shift every outbox write and publish time into the past.
    pub fn age_outbox(&self, by: Duration) {
        for (entry, published_at) in self.state.lock().unwrap().outbox.iter_mut() {
            entry.created_at = entry.created_at - by;
            if let Some(at) = published_at {
                *at = *at - by;
            }
        }
    }

    /// Move a row's status directly.
    pub fn set_status(&self, id: Uuid, status: TransactionStatus) {
        for row in self.state.lock().unwrap().rows.iter_mut() {
            if row.id == id {
                row.status = status;
            }
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn record_deposit(&self, deposit: &NewDeposit) -> Result<IntakeRecord, sqlx::Error> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state
            .rows
            .iter()
            .find(|r| r.idempotency_key == deposit.idempotency_key)
        {
            return Ok(IntakeRecord::Existing {
                transaction_id: row.id,
            });
        }

        let transaction_id = Uuid::new_v4();
        let now = utc_now();
        state.rows.push(LedgerRow {
            id: transaction_id,
            wallet_id: deposit.wallet_id,
            amount: deposit.amount,
            idempotency_key: deposit.idempotency_key.clone(),
            status: TransactionStatus::Pending,
            created_at: now,
        });
        let outbox_id = state.outbox.len() as i64 + 1;
        state.outbox.push((
            OutboxEntry {
                id: outbox_id,
                transaction_id,
                payload: Json(DepositEvent {
                    wallet_id: deposit.wallet_id,
                    amount: deposit.amount,
                    transaction_id,
                }),
                created_at: now,
            },
            None,
        ));
        Ok(IntakeRecord::Created {
            transaction_id,
            outbox_id,
        })
    }

    async fn stalled_outbox(
        &self,
        min_age: Duration,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        self.check()?;
        let cutoff = utc_now() - min_age;
        let state = self.state.lock().unwrap();
        let pending: HashSet<Uuid> = state
            .rows
            .iter()
            .filter(|r| r.status == TransactionStatus::Pending)
            .map(|r| r.id)
            .collect();
        Ok(state
            .outbox
            .iter()
            .filter(|(entry, published_at)| {
                pending.contains(&entry.transaction_id)
                    && published_at.unwrap_or(entry.created_at) <= cutoff
            })
            .take(limit)
            .map(|(entry, _)| entry.clone())
            .collect())
    }

    async fn mark_outbox_published(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        self.check()?;
        let now = utc_now();
        for (entry, published_at) in self.state.lock().unwrap().outbox.iter_mut() {
            if ids.contains(&entry.id) {
                *published_at = Some(now);
            }
        }
        Ok(())
    }

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        self.check()?;
        let mut changed = 0;
        for row in self.state.lock().unwrap().rows.iter_mut() {
            if ids.contains(&row.id) && row.status == TransactionStatus::Pending {
                row.status = TransactionStatus::Completed;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn capture(&self, window: &CaptureWindow) -> Result<Vec<CapturedTransaction>, sqlx::Error> {
        self.check()?;
        let mut captured = Vec::new();
        for row in self.state.lock().unwrap().rows.iter_mut() {
            if row.status == TransactionStatus::Completed && window.contains(row.created_at) {
                row.status = TransactionStatus::Processing;
                captured.push(CapturedTransaction {
                    id: row.id,
                    wallet_id: row.wallet_id,
                    amount: row.amount,
                    transaction_type: TransactionType::Deposit,
                    created_at: row.created_at,
                });
            }
        }
        Ok(captured)
    }
}

#[derive(Default)]
struct BalanceState {
    wallets: HashMap<Uuid, Decimal>,
    applied: HashSet<Uuid>,
}

#[derive(Default)]
pub(crate) struct MemoryBalances {
    state: Mutex<BalanceState>,
    failing: AtomicBool,
}

impl MemoryBalances {
    pub fn with_wallet(self, wallet_id: Uuid, balance: Decimal) -> Self {
        self.state.lock().unwrap().wallets.insert(wallet_id, balance);
        self
    }

    pub fn balance(&self, wallet_id: Uuid) -> Option<Decimal> {
        self.state.lock().unwrap().wallets.get(&wallet_id).copied()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BalanceStore for MemoryBalances {
    async fn apply_deposit(&self, event: &DepositEvent) -> Result<CreditOutcome, sqlx::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        let mut state = self.state.lock().unwrap();
        if state.applied.contains(&event.transaction_id) {
            return Ok(CreditOutcome::Duplicate);
        }
        let Some(balance) = state.wallets.get_mut(&event.wallet_id) else {
            return Ok(CreditOutcome::UnknownWallet);
        };
        *balance += event.amount;
        state.applied.insert(event.transaction_id);
        Ok(CreditOutcome::Applied)
    }
}

/// [`InMemoryBus`] whose publishes to selected topics fail on demand.
#[derive(Default)]
pub(crate) struct FlakyBus {
    pub inner: InMemoryBus,
    failing_topics: Mutex<HashSet<String>>,
}

impl FlakyBus {
    pub fn fail_topic(&self, topic: &str, failing: bool) {
        let mut topics = self.failing_topics.lock().unwrap();
        if failing {
            topics.insert(topic.to_string());
        } else {
            topics.remove(topic);
        }
    }
}

#[async_trait]
impl EventBus for FlakyBus {
    async fn publish(&self, topic: &str, messages: Vec<OutboundMessage>) -> Result<(), BusError> {
        let failing = self.failing_topics.lock().unwrap().contains(topic);
        if failing {
            return Err(BusError::Unavailable(format!("{topic} is down")));
        }
        self.inner.publish(topic, messages).await
    }

    async fn fetch(
        &self,
        subscription: &Subscription,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<BusMessage>, BusError> {
        self.inner.fetch(subscription, max, wait).await
    }

    async fn ack(&self, subscription: &Subscription, offsets: &[u64]) -> Result<(), BusError> {
        self.inner.ack(subscription, offsets).await
    }
}

/// Sender that records what it was asked to deliver.
#[derive(Default)]
pub(crate) struct RecordingSender {
    pub sent: Mutex<Vec<NotificationEvent>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &NotificationEvent) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(SendError::Rejected {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Poll `check` until it holds, giving up after a minute of (possibly paused)
/// time.
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..6000 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
