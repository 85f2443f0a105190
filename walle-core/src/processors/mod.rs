//! Pipeline processors.
//!
//! - `Intake`: validates a deposit, records it with its outbox entry, publishes `DepositEvent`
//! - `OutboxRelay`: republishes outbox entries whose publish was never confirmed
//! - `SettlementConsumer`: receives `DepositEvent`, credits the wallet, emits
//!   `CompletionEvent` and `NotificationEvent`
//! - `CompletionConsumer`: receives `CompletionEvent`, marks the ledger row completed
//! - `NotificationDispatcher`: receives `NotificationEvent`, delivers it on its channel
//! - `CaptureJob`: periodically moves completed rows in the capture window to processing

pub mod capture;
pub mod completion;
pub mod consumer_pool;
pub mod dispatcher;
pub mod intake;
pub mod outbox_relay;
pub mod settlement;

pub use capture::{CaptureError, CaptureJob, CaptureReport};
pub use completion::CompletionConsumer;
pub use consumer_pool::{ConsumerPool, ConsumerWorker};
pub use dispatcher::NotificationDispatcher;
pub use intake::{Intake, IntakeError};
pub use outbox_relay::{OutboxRelay, RelayError};
pub use settlement::{SettlementConsumer, SettlementError};
