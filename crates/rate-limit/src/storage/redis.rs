//! Redis-based rate limit storage using one sorted set per identity.
//!
//! Members are scored by their timestamp in milliseconds, which turns eviction into a
//! range delete and the window load into a range read, both bounded by the identity's own
//! traffic. The evict, load and record steps are separate commands: two instances checking
//! the same identity at the same instant may both be admitted, and the next check sees both.

use std::future::Future;
use std::time::Duration;

use config::RedisConfig;
use redis::FromRedisValue;

use super::redis_pool::{self, Connection, Pool};
use super::{RateLimitStorage, StorageError};
use crate::window::{self, HOUR_MS, Limits, MINUTE_MS, RateLimitResult};

/// Redis-based rate limit storage implementation.
pub struct RedisStorage {
    /// Redis connection pool.
    pool: Pool,
    /// Key prefix for all rate limit keys.
    key_prefix: String,
    /// Upper bound for every Redis round trip.
    response_timeout: Duration,
}

impl RedisStorage {
    /// Create a new Redis storage instance.
    ///
    /// An unreachable server is only logged: checks fail open until it becomes reachable.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = redis_pool::create_pool(config)
            .map_err(|e| StorageError::Connection(format!("Failed to create Redis connection pool: {e}")))?;

        let storage = Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            response_timeout: config.response_timeout,
        };

        match storage.ping().await {
            Ok(()) => log::debug!("Connected to Redis for rate limiting"),
            Err(e) => log::warn!("Redis is not reachable, rate limit checks will be allowed until it is: {e}"),
        }

        Ok(storage)
    }

    /// Round-trip a PING to the server.
    pub async fn ping(&self) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: String = self.query(redis::cmd("PING").query_async(&mut *conn)).await?;

        Ok(())
    }

    fn key(&self, identity: &str) -> String {
        format!("{}{identity}", self.key_prefix)
    }

    async fn connection(&self) -> Result<Connection, StorageError> {
        tokio::time::timeout(self.response_timeout, self.pool.get())
            .await
            .map_err(|_| StorageError::Timeout(self.response_timeout))?
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    async fn query<T: FromRedisValue>(
        &self,
        command: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.response_timeout, command)
            .await
            .map_err(|_| StorageError::Timeout(self.response_timeout))?
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}

impl RateLimitStorage for RedisStorage {
    async fn check_and_record(&self, identity: &str, now: i64, limits: Limits) -> Result<RateLimitResult, StorageError> {
        let key = self.key(identity);
        let cutoff = window::eviction_cutoff(now);
        let mut conn = self.connection().await?;

        let evicted: u64 = self
            .query(
                redis::cmd("ZREMRANGEBYSCORE")
                    .arg(&key)
                    .arg("-inf")
                    .arg(format!("({cutoff}"))
                    .query_async(&mut *conn),
            )
            .await?;

        if evicted > 0 {
            log::debug!("Evicted {evicted} expired rate limit entries for identity '{identity}'");
        }

        let scored: Vec<(String, f64)> = self
            .query(
                redis::cmd("ZRANGEBYSCORE")
                    .arg(&key)
                    .arg(cutoff)
                    .arg("+inf")
                    .arg("WITHSCORES")
                    .query_async(&mut *conn),
            )
            .await?;

        let entries: Vec<i64> = scored.into_iter().map(|(_, score)| score as i64).collect();
        let result = window::evaluate(&entries, now, limits);

        if !result.is_allowed() {
            return Ok(result);
        }

        // Members must be unique or two actions at the same millisecond would collapse into one.
        let member = format!("{now}-{:016x}", rand::random::<u64>());

        let _: () = self
            .query(
                redis::pipe()
                    .atomic()
                    .zadd(&key, member, now)
                    .ignore()
                    .pexpire(&key, HOUR_MS + MINUTE_MS)
                    .ignore()
                    .query_async(&mut *conn),
            )
            .await?;

        Ok(result)
    }
}
