//! `POST /deposits`: the intake entry point.

use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kanau::processor::Processor;
use walle_core::processors::IntakeError;
use walle_sdk::objects::{ApiErrorBody, DepositRequest, DepositResponse, ErrorCode};

/// Intake failure rendered as an [`ApiErrorBody`].
pub struct DepositApiError(IntakeError);

impl From<IntakeError> for DepositApiError {
    fn from(e: IntakeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for DepositApiError {
    fn into_response(self) -> Response {
        let code = self.0.kind();
        let status = match code {
            ErrorCode::FailedPrecondition => StatusCode::BAD_REQUEST,
            ErrorCode::Internal => {
                tracing::error!(error = %self.0, "Deposit intake failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match code {
            ErrorCode::FailedPrecondition => self.0.to_string(),
            ErrorCode::Internal => "internal error, retry with the same idempotency key".to_string(),
        };
        (status, Json(ApiErrorBody { code, message })).into_response()
    }
}

/// Record a deposit and publish it to the pipeline.
pub async fn create_deposit(
    State(state): State<AppState>,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), DepositApiError> {
    let transaction_id = state.intake.process(request).await?;
    Ok((StatusCode::CREATED, Json(DepositResponse { transaction_id })))
}
