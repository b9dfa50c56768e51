//! Error types for rate limiting.

use crate::storage::StorageError;

/// Errors surfaced to callers of the rate limiter.
///
/// Exceeding a cap is not an error, it is reported through
/// [`RateLimitResult::Limited`](crate::RateLimitResult::Limited).
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The identity to throttle was empty.
    #[error("Rate limit identity must not be empty")]
    EmptyIdentity,

    /// One of the caps was zero.
    #[error("Rate limits must be greater than zero, got {per_minute} per minute and {per_hour} per hour")]
    InvalidLimits {
        /// Configured per-minute cap.
        per_minute: u32,
        /// Configured per-hour cap.
        per_hour: u32,
    },

    /// The storage backend could not be set up.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
