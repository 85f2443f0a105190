use super::{BalanceStore, CreditOutcome, IntakeRecord, LedgerStore};
use crate::entities::deposit_outbox::{
    DepositOutbox, GetStalledOutbox, MarkOutboxPublished, OutboxEntry,
};
use crate::entities::transaction_records::{
    CapturedTransaction, MarkTransactionsCompleted, NewDeposit, TransactionRecord,
};
use crate::entities::wallet_balances::{AppliedDeposit, WalletBalance};
use crate::framework::DatabaseProcessor;
use crate::utils::capture_window::CaptureWindow;
use async_trait::async_trait;
use kanau::processor::Processor;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use walle_sdk::objects::DepositEvent;

#[async_trait]
impl LedgerStore for DatabaseProcessor {
    async fn record_deposit(&self, deposit: &NewDeposit) -> Result<IntakeRecord, sqlx::Error> {
        let mut tx = self.begin().await?;

        if let Some(transaction_id) =
            TransactionRecord::find_id_by_idempotency_key(&mut tx, &deposit.idempotency_key)
                .await?
        {
            return Ok(IntakeRecord::Existing { transaction_id });
        }

        let Some(transaction_id) = TransactionRecord::insert_pending_deposit(&mut tx, deposit).await?
        else {
            // A concurrent caller committed the key between our lookup and insert.
            let transaction_id =
                TransactionRecord::find_id_by_idempotency_key(&mut tx, &deposit.idempotency_key)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
            debug!(%transaction_id, "Idempotency key claimed concurrently");
            return Ok(IntakeRecord::Existing { transaction_id });
        };

        let event = DepositEvent {
            wallet_id: deposit.wallet_id,
            amount: deposit.amount,
            transaction_id,
        };
        let outbox_id = DepositOutbox::insert(&mut tx, &event).await?;
        tx.commit().await?;

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
        self.process(GetStalledOutbox {
            min_age,
            limit: i64::try_from(limit).unwrap_or(i64::MAX),
        })
        .await
    }

    async fn mark_outbox_published(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        self.process(MarkOutboxPublished { ids: ids.to_vec() })
            .await
            .map(|_| ())
    }

    async fn mark_completed(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        self.process(MarkTransactionsCompleted { ids: ids.to_vec() })
            .await
    }

    async fn capture(&self, window: &CaptureWindow) -> Result<Vec<CapturedTransaction>, sqlx::Error> {
        let mut tx = self.begin().await?;

        let locked = TransactionRecord::lock_completed_in_window(&mut tx, window).await?;
        if locked.is_empty() {
            tx.commit().await?;
            return Ok(locked);
        }

        let ids: Vec<Uuid> = locked.iter().map(|t| t.id).collect();
        let moved = TransactionRecord::mark_processing(&mut tx, &ids).await?;
        tx.commit().await?;

        debug!(locked = locked.len(), moved, "Capture batch committed");
        Ok(locked)
    }
}

#[async_trait]
impl BalanceStore for DatabaseProcessor {
    async fn apply_deposit(&self, event: &DepositEvent) -> Result<CreditOutcome, sqlx::Error> {
        let mut tx = self.begin().await?;

        if !AppliedDeposit::insert_if_absent(&mut tx, event).await? {
            return Ok(CreditOutcome::Duplicate);
        }
        if !WalletBalance::credit(&mut tx, event.wallet_id, event.amount).await? {
            // Dropping the transaction discards the guard row as well.
            return Ok(CreditOutcome::UnknownWallet);
        }

        tx.commit().await?;
        Ok(CreditOutcome::Applied)
    }
}
