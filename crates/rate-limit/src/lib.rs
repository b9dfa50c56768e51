//! Sliding-window rate limiting for Throttle.
//!
//! Every identity is held to two caps at once: a number of actions within the trailing
//! minute and a number of actions within the trailing hour. State lives either in Redis,
//! shared by every instance, or in process memory for single-instance deployments.
//!
//! Storage failures never block the guarded action: the limiter logs them and lets the
//! call through.

#![deny(missing_docs)]

mod error;
mod limiter;
mod storage;
mod window;

pub use error::RateLimitError;
pub use limiter::RateLimiter;
pub use storage::{Backend, InMemoryStorage, RateLimitStorage, RedisStorage, StorageError};
pub use window::{Limits, RateLimitResult, Window};
