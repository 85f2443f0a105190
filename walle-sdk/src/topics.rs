//! Bus topic names.

/// Emitted by intake once per committed deposit.
pub const DEPOSIT_INITIATED: &str = "deposit_initiated";

/// Emitted by the settlement consumer once a balance credit is durable.
pub const DEPOSIT_COMPLETED: &str = "deposit_completed";

/// Best-effort user notifications, consumed by the dispatcher.
pub const NOTIFICATION: &str = "notification";
