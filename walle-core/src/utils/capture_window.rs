use std::time::Duration;

/// Half-open creation-time range `[start, end)` a capture run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureWindow {
    pub start: time::PrimitiveDateTime,
    pub end: time::PrimitiveDateTime,
}

impl CaptureWindow {
    /// The window ending `lag` before `now` and spanning `width`.
    ///
    /// With the default lag and width of one hour each this is
    /// `[now - 2h, now - 1h)`.
    pub fn trailing(now: time::PrimitiveDateTime, lag: Duration, width: Duration) -> Self {
        let end = now - lag;
        Self {
            start: end - width,
            end,
        }
    }

    pub fn contains(&self, at: time::PrimitiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}
