//! HTTP API handlers.

pub mod deposit;

use crate::state::AppState;
use axum::{Router, routing::post};

/// Build the intake API router.
pub fn build_api_router() -> Router<AppState> {
    Router::new().route("/deposits", post(deposit::create_deposit))
}
