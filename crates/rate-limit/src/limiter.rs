//! Rate limiter front end.

use config::{RateLimitConfig, StorageConfig};
use jiff::Timestamp;

use crate::error::RateLimitError;
use crate::storage::{Backend, InMemoryStorage, RateLimitStorage, RedisStorage};
use crate::window::{Limits, RateLimitResult};

/// Enforces the per-minute and per-hour caps for every identity.
///
/// Storage failures are logged and the action is allowed: an outage of the backing store
/// must not take the guarded action down with it.
pub struct RateLimiter<S = Backend> {
    storage: S,
    limits: Limits,
}

impl RateLimiter<Backend> {
    /// Create a rate limiter with the configured storage backend.
    pub async fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        let limits = Limits::new(config.max_per_minute, config.max_per_hour)?;

        let storage = match &config.storage {
            StorageConfig::Memory => {
                log::warn!(
                    "Using in-memory rate limit storage: counters are not shared between instances and reset on restart"
                );

                Backend::Memory(InMemoryStorage::new())
            }
            StorageConfig::Redis(redis_config) => Backend::Redis(RedisStorage::new(redis_config).await?),
        };

        log::debug!(
            "Rate limiter initialized with {} requests per minute and {} requests per hour",
            limits.per_minute(),
            limits.per_hour()
        );

        Ok(Self::with_storage(storage, limits))
    }
}

impl<S: RateLimitStorage> RateLimiter<S> {
    /// Create a rate limiter over the given storage.
    pub fn with_storage(storage: S, limits: Limits) -> Self {
        Self { storage, limits }
    }

    /// The caps this limiter enforces.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Check and record an action for `identity` at the current wall-clock time.
    pub async fn check(&self, identity: &str) -> Result<RateLimitResult, RateLimitError> {
        self.check_at(identity, Timestamp::now()).await
    }

    /// Check and record an action for `identity` at `now`.
    ///
    /// Only an empty identity is reported as an error. Exceeding a cap is a
    /// [`RateLimitResult::Limited`], and storage errors yield [`RateLimitResult::Allowed`].
    pub async fn check_at(&self, identity: &str, now: Timestamp) -> Result<RateLimitResult, RateLimitError> {
        if identity.is_empty() {
            return Err(RateLimitError::EmptyIdentity);
        }

        match self
            .storage
            .check_and_record(identity, now.as_millisecond(), self.limits)
            .await
        {
            Ok(result) => {
                log::debug!("Rate limit decision for identity '{identity}': {result:?}");
                Ok(result)
            }
            Err(e) => {
                log::error!("Rate limit check failed for identity '{identity}', allowing the request: {e}");
                Ok(RateLimitResult::Allowed)
            }
        }
    }
}
