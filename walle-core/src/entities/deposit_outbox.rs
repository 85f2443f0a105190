use crate::entities::TransactionStatus;
use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use crate::utils::utc_now;
use kanau::processor::Processor;
use sqlx::types::Json;
use std::time::Duration;
use uuid::Uuid;
use walle_sdk::objects::DepositEvent;

/// A `deposit_initiated` event persisted next to its ledger row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub transaction_id: Uuid,
    pub payload: Json<DepositEvent>,
    pub created_at: time::PrimitiveDateTime,
}

pub struct DepositOutbox;

impl DepositOutbox {
    /// Write the event for `transaction_id`. Call inside the transaction that
    /// inserted the ledger row so the two commit together.
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDepositOutbox")]
    pub async fn insert(
        db: &mut impl DatabaseAccessor,
        event: &DepositEvent,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO deposit_outbox (transaction_id, payload)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(event.transaction_id)
        .bind(Json(event))
        .fetch_one(db.acquire())
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Outbox rows whose transaction is still `pending` and which have not been
/// published for at least `min_age`, oldest first.
///
/// Settlement state lives in the ledger, not on the bus: a row stays eligible
/// until its transaction leaves `pending`, so events lost with the bus (a
/// restart, a dropped message) are published again.
pub struct GetStalledOutbox {
    pub min_age: Duration,
    pub limit: i64,
}

impl Processor<GetStalledOutbox> for DatabaseProcessor {
    type Output = Vec<OutboxEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetStalledOutbox")]
    async fn process(&self, query: GetStalledOutbox) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        let cutoff = utc_now() - query.min_age;
        sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT o.id, o.transaction_id, o.payload, o.created_at
            FROM deposit_outbox o
            JOIN transactions t ON t.id = o.transaction_id
            WHERE t.status = $1
              AND COALESCE(o.published_at, o.created_at) <= $2
            ORDER BY o.id
            LIMIT $3
            "#,
        )
        .bind(TransactionStatus::Pending)
        .bind(cutoff)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Stamp the last publish time of outbox rows.
pub struct MarkOutboxPublished {
    pub ids: Vec<i64>,
}

impl Processor<MarkOutboxPublished> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkOutboxPublished")]
    async fn process(&self, update: MarkOutboxPublished) -> Result<u64, sqlx::Error> {
        if update.ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE deposit_outbox
            SET published_at = (now() AT TIME ZONE 'utc')
            WHERE id = ANY($1)
            "#,
        )
        .bind(&update.ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
