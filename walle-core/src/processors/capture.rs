//! CaptureJob processor.
//!
//! Periodically locks `completed` transactions created inside the trailing
//! capture window and moves them to `processing`, all inside one datastore
//! transaction bounded by a timeout. Overlapping runs serialize on the row
//! locks, so each eligible row is captured by exactly one run.

use crate::config::CaptureConfig;
use crate::store::{CapturedTransaction, LedgerStore};
use crate::utils::capture_window::CaptureWindow;
use crate::utils::shutdown::wait_for_shutdown;
use crate::utils::utc_now;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("capture timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub window: CaptureWindow,
    pub captured: Vec<CapturedTransaction>,
}

pub struct CaptureJob {
    ledger: Arc<dyn LedgerStore>,
    config: CaptureConfig,
}

impl CaptureJob {
    pub fn new(ledger: Arc<dyn LedgerStore>, config: CaptureConfig) -> Self {
        Self { ledger, config }
    }

    pub async fn run_once(&self) -> Result<CaptureReport, CaptureError> {
        self.run_once_at(utc_now()).await
    }

    /// Capture the window trailing `now`. On timeout the in-flight datastore
    /// transaction is dropped, which rolls it back.
    pub async fn run_once_at(
        &self,
        now: time::PrimitiveDateTime,
    ) -> Result<CaptureReport, CaptureError> {
        let window = CaptureWindow::trailing(now, self.config.lag, self.config.width);
        let captured = tokio::time::timeout(self.config.timeout, self.ledger.capture(&window))
            .await
            .map_err(|_| CaptureError::TimedOut(self.config.timeout))??;

        info!(
            window_start = %window.start,
            window_end = %window.end,
            captured = captured.len(),
            "Capture run committed"
        );
        Ok(CaptureReport { window, captured })
    }

    /// Run the CaptureJob every `interval` until shutdown.
    pub async fn run(self, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        info!(?interval, "CaptureJob started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("CaptureJob received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Capture run failed, rolled back");
                    }
                }
            }
        }

        info!("CaptureJob shutdown complete");
    }
}
