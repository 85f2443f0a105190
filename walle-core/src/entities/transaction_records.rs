use crate::entities::{TransactionStatus, TransactionType};
use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use crate::utils::capture_window::CaptureWindow;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Fractional digits kept by the `amount` columns (`NUMERIC(20, 8)`).
pub const AMOUNT_SCALE: u32 = 8;

/// Smallest amount the `amount` columns cannot hold: 10^12.
pub fn amount_limit() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

/// A deposit row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeposit {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub idempotency_key: String,
}

/// A transaction locked and moved to `processing` by a capture run.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CapturedTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub created_at: time::PrimitiveDateTime,
}

pub struct TransactionRecord;

impl TransactionRecord {
    /// Look up the transaction owning an idempotency key.
    #[tracing::instrument(skip_all, err, name = "SQL:FindTransactionByIdempotencyKey")]
    pub async fn find_id_by_idempotency_key(
        db: &mut impl DatabaseAccessor,
        idempotency_key: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM transactions
            WHERE idempotency_key = $1
            "#,
        )
        .bind(idempotency_key)
        .fetch_optional(db.acquire())
        .await
    }

    /// Insert a pending deposit.
    ///
    /// Returns `None` when another caller already owns the idempotency key;
    /// the unique index is what makes the check-then-insert race safe, the
    /// caller resolves the conflict by looking the key up again.
    #[tracing::instrument(skip_all, err, name = "SQL:InsertPendingDeposit")]
    pub async fn insert_pending_deposit(
        db: &mut impl DatabaseAccessor,
        deposit: &NewDeposit,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO transactions (wallet_id, amount, type, idempotency_key, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(deposit.wallet_id)
        .bind(deposit.amount)
        .bind(TransactionType::Deposit)
        .bind(&deposit.idempotency_key)
        .bind(TransactionStatus::Pending)
        .fetch_optional(db.acquire())
        .await
    }

    /// Select completed transactions created inside `window`, taking row locks.
    ///
    /// Must run inside a transaction; the locks are what keep two overlapping
    /// capture runs from advancing the same row.
    #[tracing::instrument(skip_all, err, name = "SQL:LockCompletedInWindow")]
    pub async fn lock_completed_in_window(
        db: &mut impl DatabaseAccessor,
        window: &CaptureWindow,
    ) -> Result<Vec<CapturedTransaction>, sqlx::Error> {
        sqlx::query_as::<_, CapturedTransaction>(
            r#"
            SELECT id, wallet_id, amount, type AS transaction_type, created_at
            FROM transactions
            WHERE status = $1
              AND created_at >= $2
              AND created_at < $3
            ORDER BY created_at
            FOR UPDATE
            "#,
        )
        .bind(TransactionStatus::Completed)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(db.acquire())
        .await
    }

    /// Move locked `completed` rows to `processing`.
    #[tracing::instrument(skip_all, err, name = "SQL:MarkTransactionsProcessing")]
    pub async fn mark_processing(
        db: &mut impl DatabaseAccessor,
        ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = (now() AT TIME ZONE 'utc')
            WHERE id = ANY($2) AND status = $3
            "#,
        )
        .bind(TransactionStatus::Processing)
        .bind(ids)
        .bind(TransactionStatus::Completed)
        .execute(db.acquire())
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Move pending transactions to `completed` in one statement.
///
/// Rows that already moved on are left alone, so replaying a completion
/// batch is harmless. Returns the number of rows actually advanced.
pub struct MarkTransactionsCompleted {
    pub ids: Vec<Uuid>,
}

impl Processor<MarkTransactionsCompleted> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkTransactionsCompleted")]
    async fn process(&self, update: MarkTransactionsCompleted) -> Result<u64, sqlx::Error> {
        if update.ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1, updated_at = (now() AT TIME ZONE 'utc')
            WHERE id = ANY($2) AND status = $3
            "#,
        )
        .bind(TransactionStatus::Completed)
        .bind(&update.ids)
        .bind(TransactionStatus::Pending)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
