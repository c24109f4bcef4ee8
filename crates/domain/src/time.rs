//! Time and timestamp helpers.

use chrono::{DateTime, Duration, Utc};

/// UTC timestamp used for `updatedAt`, grant expiry, timer fire times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// A whole number of hours as a [`Duration`].
///
/// # Panics
///
/// Panics when `n` hours exceed the range of [`Duration`]. Use
/// [`try_hours`] for values read from user input.
#[must_use]
pub fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

/// A whole number of hours, or `None` when out of range.
#[must_use]
pub fn try_hours(n: i64) -> Option<Duration> {
    Duration::try_hours(n)
}
