use crate::framework::DatabaseAccessor;
use rust_decimal::Decimal;
use uuid::Uuid;
use walle_sdk::objects::DepositEvent;

pub struct AppliedDeposit;

impl AppliedDeposit {
    /// Record that `event` has been credited. Returns `false` if the
    /// transaction was already recorded, in which case the credit must not be
    /// applied again.
    #[tracing::instrument(skip_all, err, name = "SQL:RecordAppliedDeposit")]
    pub async fn insert_if_absent(
        db: &mut impl DatabaseAccessor,
        event: &DepositEvent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO applied_deposits (transaction_id, wallet_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (transaction_id) DO NOTHING
            "#,
        )
        .bind(event.transaction_id)
        .bind(event.wallet_id)
        .bind(event.amount)
        .execute(db.acquire())
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

pub struct WalletBalance;

impl WalletBalance {
    /// Atomically add `amount` to the wallet's balance. Returns `false` when no
    /// such wallet exists.
    #[tracing::instrument(skip_all, err, name = "SQL:CreditWalletBalance")]
    pub async fn credit(
        db: &mut impl DatabaseAccessor,
        wallet_id: Uuid,
        amount: Decimal,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = (now() AT TIME ZONE 'utc')
            WHERE id = $1
            "#,
        )
        .bind(wallet_id)
        .bind(amount)
        .execute(db.acquire())
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
