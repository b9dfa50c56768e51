//! The two-window decision shared by every storage backend.

use std::time::Duration;

use crate::RateLimitError;

/// Length of the short window in milliseconds.
pub(crate) const MINUTE_MS: i64 = 60_000;

/// Length of the long window in milliseconds. Entries older than this are evicted.
pub(crate) const HOUR_MS: i64 = 3_600_000;

/// The trailing window whose cap rejected a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The trailing 60 seconds.
    Minute,
    /// The trailing 3600 seconds.
    Hour,
}

impl Window {
    fn millis(self) -> i64 {
        match self {
            Window::Minute => MINUTE_MS,
            Window::Hour => HOUR_MS,
        }
    }
}

/// Caps enforced for every identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    per_minute: u32,
    per_hour: u32,
}

impl Limits {
    /// Create limits, rejecting zero caps.
    pub fn new(per_minute: u32, per_hour: u32) -> Result<Self, RateLimitError> {
        if per_minute == 0 || per_hour == 0 {
            return Err(RateLimitError::InvalidLimits { per_minute, per_hour });
        }

        Ok(Self { per_minute, per_hour })
    }

    /// Maximum allowed actions within the trailing minute.
    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Maximum allowed actions within the trailing hour.
    pub fn per_hour(&self) -> u32 {
        self.per_hour
    }

    fn cap(&self, window: Window) -> usize {
        let cap = match window {
            Window::Minute => self.per_minute,
            Window::Hour => self.per_hour,
        };

        cap as usize
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_minute: 20,
            per_hour: 100,
        }
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// The action may proceed and has been recorded.
    Allowed,
    /// The action was rejected and not recorded.
    Limited {
        /// Whole seconds to wait before the identity is likely to be allowed again. Always at least one.
        retry_after_seconds: u64,
        /// The window whose cap was reached.
        window: Window,
    },
}

impl RateLimitResult {
    /// Whether the action may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed)
    }

    /// Seconds to wait before retrying, if the action was rejected.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            RateLimitResult::Allowed => None,
            RateLimitResult::Limited {
                retry_after_seconds, ..
            } => Some(*retry_after_seconds),
        }
    }

    /// Time to wait before retrying, if the action was rejected.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_seconds().map(Duration::from_secs)
    }
}

/// Timestamp before which entries no longer count towards any window.
pub(crate) fn eviction_cutoff(now: i64) -> i64 {
    now - HOUR_MS
}

/// Decides whether an action at `now` is allowed given the identity's recorded timestamps.
///
/// `entries` must be sorted ascending. Entries older than an hour are ignored, so callers
/// may pass them unevicted. The hourly cap is checked first and wins when both are reached.
pub(crate) fn evaluate(entries: &[i64], now: i64, limits: Limits) -> RateLimitResult {
    let in_hour = trailing(entries, now, Window::Hour);

    if let Some(result) = check_cap(in_hour, now, limits, Window::Hour) {
        return result;
    }

    let in_minute = trailing(in_hour, now, Window::Minute);

    if let Some(result) = check_cap(in_minute, now, limits, Window::Minute) {
        return result;
    }

    RateLimitResult::Allowed
}

fn trailing(entries: &[i64], now: i64, window: Window) -> &[i64] {
    let start = now - window.millis();
    let first = entries.partition_point(|&timestamp| timestamp < start);

    &entries[first..]
}

fn check_cap(in_window: &[i64], now: i64, limits: Limits, window: Window) -> Option<RateLimitResult> {
    let &oldest = in_window.first()?;

    if in_window.len() < limits.cap(window) {
        return None;
    }

    Some(RateLimitResult::Limited {
        retry_after_seconds: retry_after_seconds(oldest, window, now),
        window,
    })
}

/// Seconds until `oldest` leaves `window`, rounded up and never below one.
fn retry_after_seconds(oldest: i64, window: Window, now: i64) -> u64 {
    let remaining = oldest + window.millis() - now;

    u64::try_from(remaining).map_or(1, |millis| millis.div_ceil(1000).max(1))
}
