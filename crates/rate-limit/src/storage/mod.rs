//! Storage backends for rate limiting.

use std::future::Future;
use std::time::Duration;

use crate::window::{Limits, RateLimitResult};

mod memory;
mod redis;
mod redis_pool;

pub use self::memory::InMemoryStorage;
pub use self::redis::RedisStorage;

/// A place to keep per-identity action timestamps.
pub trait RateLimitStorage: Send + Sync {
    /// Evict the identity's expired entries, decide on an action at `now` (milliseconds since
    /// the Unix epoch) and record it if allowed.
    fn check_and_record(
        &self,
        identity: &str,
        now: i64,
        limits: Limits,
    ) -> impl Future<Output = Result<RateLimitResult, StorageError>> + Send;
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Could not obtain a connection to the backend.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed a command.
    #[error("Query error: {0}")]
    Query(String),

    /// The backend did not answer in time.
    #[error("Storage did not respond within {0:?}")]
    Timeout(Duration),
}

/// Storage backend selected by configuration.
pub enum Backend {
    /// Process-local storage.
    Memory(InMemoryStorage),
    /// Redis storage, shared between instances.
    Redis(RedisStorage),
}

impl RateLimitStorage for Backend {
    async fn check_and_record(&self, identity: &str, now: i64, limits: Limits) -> Result<RateLimitResult, StorageError> {
        match self {
            Backend::Memory(storage) => storage.check_and_record(identity, now, limits).await,
            Backend::Redis(storage) => storage.check_and_record(identity, now, limits).await,
        }
    }
}
