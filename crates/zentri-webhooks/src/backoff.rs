//! Retry backoff policy.
//!
//! Pure mapping from attempt count to the next retry due time, or `None`
//! once the attempt ceiling is reached.

use chrono::{DateTime, Duration, Utc};

/// Backoff schedule in seconds: 1min, 5min, 15min, 30min, 1hr.
pub const BACKOFF_SCHEDULE_SECS: [i64; 5] = [60, 300, 900, 1800, 3600];

/// Fractional spread applied when jitter is enabled (±20%).
const JITTER_FRACTION: f64 = 0.2;

/// Delay before the retry following attempt number `attempts` (1-based).
/// Attempts beyond the schedule reuse its last entry.
#[must_use]
pub fn delay_for_attempt(attempts: i32) -> Duration {
    let idx = (attempts - 1).max(0) as usize;
    let secs = BACKOFF_SCHEDULE_SECS[idx.min(BACKOFF_SCHEDULE_SECS.len() - 1)];
    Duration::seconds(secs)
}

/// Due time of the next retry after `attempts` attempts, or `None` when the
/// delivery is terminal.
#[must_use]
pub fn next_retry_at(attempts: i32, max_attempts: i32, jitter: bool) -> Option<DateTime<Utc>> {
    if attempts >= max_attempts {
        return None;
    }
    let mut delay = delay_for_attempt(attempts);
    if jitter {
        delay = apply_jitter(delay);
    }
    Some(Utc::now() + delay)
}

fn apply_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let secs = delay.num_seconds() as f64;
    let factor = rand::thread_rng().gen_range(1.0 - JITTER_FRACTION..=1.0 + JITTER_FRACTION);
    Duration::seconds((secs * factor).round() as i64)
}
