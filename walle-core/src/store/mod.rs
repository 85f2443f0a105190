//! Datastore seams used by the processors.
//!
//! The ledger (transactions + outbox) and the balance store (wallets) are
//! separate databases. Each gets its own trait so processors only see the side
//! they own. Both traits are implemented for [`DatabaseProcessor`] in
//! [`postgres`].
//!
//! [`DatabaseProcessor`]: crate::framework::DatabaseProcessor

mod postgres;

pub use crate::entities::deposit_outbox::OutboxEntry;
pub use crate::entities::transaction_records::{CapturedTransaction, NewDeposit};

use crate::utils::capture_window::CaptureWindow;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;
use walle_sdk::objects::DepositEvent;

/// Result of recording an intake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeRecord {
    /// A new pending row and its outbox entry were committed.
    Created { transaction_id: Uuid, outbox_id: i64 },
    /// The idempotency key already belonged to a transaction. Nothing was
    /// written.
    Existing { transaction_id: Uuid },
}

impl IntakeRecord {
    pub fn transaction_id(&self) -> Uuid {
        match self {
            IntakeRecord::Created { transaction_id, .. }
            | IntakeRecord::Existing { transaction_id } => *transaction_id,
        }
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a pending deposit plus its outbox entry, or return the
    /// transaction already owning the idempotency key.
    async fn record_deposit(&self, deposit: &NewDeposit) -> Result<IntakeRecord, sqlx::Error>;

    /// Outbox entries whose transaction is still pending and that were last
    /// published (or written) at least `min_age` ago.
    async fn stalled_outbox(
        &self,
        min_age: Duration,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, sqlx::Error>;

    /// Record that the entries were just published.
    async fn mark_outbox_published(&self, ids: &[i64]) -> Result<(), sqlx::Error>;

    /// Move pending transactions to completed. Returns the number of rows
    /// that actually changed.
    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error>;

    /// Lock completed transactions created inside `window` and move them to
    /// processing, all in one datastore transaction.
    async fn capture(&self, window: &CaptureWindow) -> Result<Vec<CapturedTransaction>, sqlx::Error>;
}

/// What applying a `DepositEvent` did to the balance store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Balance incremented and the transaction recorded as applied.
    Applied,
    /// The transaction had already been applied; balance untouched.
    Duplicate,
    /// No wallet with that id. Nothing was written.
    UnknownWallet,
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn apply_deposit(&self, event: &DepositEvent) -> Result<CreditOutcome, sqlx::Error>;
}
