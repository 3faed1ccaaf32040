//! Wall-clock helpers. All persisted timestamps are microseconds since the
//! Unix epoch (`*_us` fields), matching the store schema.

use std::time::Duration;

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Convert a [`Duration`] to whole microseconds, saturating at `i64::MAX`.
#[must_use]
pub fn duration_us(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}
