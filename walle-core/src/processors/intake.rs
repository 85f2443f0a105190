//! Deposit intake.
//!
//! Validates the request, records the pending transaction and its outbox
//! entry in one ledger transaction, then publishes `deposit_initiated`. A
//! repeated idempotency key returns the original transaction id and has no
//! other effect.

use crate::entities::transaction_records::{AMOUNT_SCALE, amount_limit};
use crate::events::{EventProducer, PublishError};
use crate::store::{IntakeRecord, LedgerStore, NewDeposit};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use walle_sdk::objects::{DepositEvent, DepositRequest, ErrorCode};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("amount {0} has more than {AMOUNT_SCALE} decimal places")]
    TooManyDecimalPlaces(Decimal),

    #[error("amount {0} exceeds the ledger limit")]
    AmountTooLarge(Decimal),

    #[error("idempotency key must not be empty")]
    MissingIdempotencyKey,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to publish deposit event: {0}")]
    Publish(#[from] PublishError),
}

impl IntakeError {
    pub fn kind(&self) -> ErrorCode {
        match self {
            IntakeError::NonPositiveAmount(_)
            | IntakeError::TooManyDecimalPlaces(_)
            | IntakeError::AmountTooLarge(_)
            | IntakeError::MissingIdempotencyKey => ErrorCode::FailedPrecondition,
            IntakeError::Database(_) | IntakeError::Publish(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Clone)]
pub struct Intake {
    ledger: Arc<dyn LedgerStore>,
    producer: EventProducer,
}

impl Intake {
    pub fn new(ledger: Arc<dyn LedgerStore>, producer: EventProducer) -> Self {
        Self { ledger, producer }
    }
}

impl Processor<DepositRequest> for Intake {
    type Output = Uuid;
    type Error = IntakeError;
    #[tracing::instrument(skip_all, err, name = "Intake:Deposit", fields(wallet_id = %request.wallet_id))]
    async fn process(&self, request: DepositRequest) -> Result<Uuid, IntakeError> {
        if request.amount <= Decimal::ZERO {
            return Err(IntakeError::NonPositiveAmount(request.amount));
        }
        // Anything the ledger column would round or overflow.
        if request.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(IntakeError::TooManyDecimalPlaces(request.amount));
        }
        if request.amount >= amount_limit() {
            return Err(IntakeError::AmountTooLarge(request.amount));
        }
        if request.idempotency_key.is_empty() {
            return Err(IntakeError::MissingIdempotencyKey);
        }

        let deposit = NewDeposit {
            wallet_id: request.wallet_id,
            amount: request.amount,
            idempotency_key: request.idempotency_key,
        };

        match self.ledger.record_deposit(&deposit).await? {
            IntakeRecord::Existing { transaction_id } => {
                info!(%transaction_id, "Idempotency key replayed, returning original transaction");
                Ok(transaction_id)
            }
            IntakeRecord::Created {
                transaction_id,
                outbox_id,
            } => {
                let event = DepositEvent {
                    wallet_id: deposit.wallet_id,
                    amount: deposit.amount,
                    transaction_id,
                };
                if let Err(e) = self.producer.publish(&event).await {
                    warn!(
                        %transaction_id,
                        error = %e,
                        "Publish failed, outbox relay will retry"
                    );
                    return Err(e.into());
                }
                if let Err(e) = self.ledger.mark_outbox_published(&[outbox_id]).await {
                    // The relay republishes; the applied-deposit guard absorbs it.
                    warn!(%transaction_id, error = %e, "Failed to mark outbox entry published");
                }

                info!(%transaction_id, amount = %deposit.amount, "Deposit accepted");
                Ok(transaction_id)
            }
        }
    }
}
