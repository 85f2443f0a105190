pub mod deposit;
pub mod events;

pub use deposit::{ApiErrorBody, DepositRequest, DepositResponse, ErrorCode};
pub use events::{CompletionEvent, DepositEvent, NotificationEvent};
