use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for the intake `Deposit` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositRequest {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    /// Caller-chosen key; repeating a call with the same key returns the
    /// original transaction.
    pub idempotency_key: String,
}

/// Response body for the intake `Deposit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositResponse {
    pub transaction_id: Uuid,
}

/// Error classes surfaced by the intake call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request can never succeed as sent (e.g. a non-positive amount).
    FailedPrecondition,
    /// Datastore or bus failure. Retrying with the same key is safe.
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::FailedPrecondition => write!(f, "failed_precondition"),
            ErrorCode::Internal => write!(f, "internal"),
        }
    }
}

/// Error body returned alongside non-2xx intake responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
}
