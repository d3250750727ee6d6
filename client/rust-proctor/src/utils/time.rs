use std::time::Duration;
use tokio::time::Instant;

/// Time elapsed between a monotonic start instant and `now`.
///
/// Derived from the clock on every call rather than accumulated from ticks,
/// so missed ticks (suspended tab, busy runtime) never cause drift.
pub fn elapsed_since(start: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(start)
}

pub fn elapsed_seconds(start: Instant, now: Instant) -> u64 {
    elapsed_since(start, now).as_secs()
}

pub fn elapsed_millis(start: Instant, now: Instant) -> u64 {
    u64::try_from(elapsed_since(start, now).as_millis()).unwrap_or(u64::MAX)
}
