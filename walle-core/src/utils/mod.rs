pub mod capture_window;
pub mod shutdown;

/// Current UTC wall clock as the naive timestamp the ledger stores.
pub fn utc_now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}
