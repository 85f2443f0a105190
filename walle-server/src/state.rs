//! Application state shared across handlers.

use walle_core::processors::Intake;

/// Shared application state passed to all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub intake: Intake,
}

impl AppState {
    pub fn new(intake: Intake) -> Self {
        Self { intake }
    }
}
