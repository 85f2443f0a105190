pub mod deposit_outbox;
pub mod transaction_records;
pub mod wallet_balances;

/// Ledger transaction status.
///
/// Transitions only move forward: `Pending → Completed → Processing`, with
/// `Failed` as a terminal side exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Processing,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::Processing => write!(f, "processing"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_type")]
pub enum TransactionType {
    Deposit,
    Withdraw,
}
