//! Process-local rate limit storage.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{RateLimitStorage, StorageError};
use crate::window::{self, Limits, RateLimitResult};

/// Number of checks between two sweeps of idle identities.
const SWEEP_INTERVAL: u64 = 1024;

/// In-memory rate limit storage.
///
/// Keeps the recorded timestamps of every identity in a concurrent map. Each check runs
/// under the identity's map entry lock, so concurrent checks for one identity never
/// over-admit. Nothing is persisted: a restart clears every counter, and instances do not
/// share state.
pub struct InMemoryStorage {
    /// Ascending action timestamps, in milliseconds, per identity.
    entries: DashMap<String, Vec<i64>>,
    /// Checks performed so far, used to schedule sweeps.
    checks: AtomicU64,
}

impl InMemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Decide on an action for `identity` at `now` and record it if allowed.
    pub fn check(&self, identity: &str, now: i64, limits: Limits) -> RateLimitResult {
        let result = {
            let mut timestamps = self.entries.entry(identity.to_string()).or_default();

            let expired = timestamps.partition_point(|&timestamp| timestamp < window::eviction_cutoff(now));
            timestamps.drain(..expired);

            let result = window::evaluate(&timestamps, now, limits);

            if result.is_allowed() {
                let position = timestamps.partition_point(|&timestamp| timestamp <= now);
                timestamps.insert(position, now);
            }

            result
        };

        // The entry guard above must be released first, sweeping locks every shard.
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep(now);
        }

        result
    }

    /// Forget identities with no entries newer than an hour before `now`.
    pub fn sweep(&self, now: i64) {
        let cutoff = window::eviction_cutoff(now);
        let before = self.entries.len();

        self.entries
            .retain(|_, timestamps| timestamps.last().is_some_and(|&newest| newest >= cutoff));

        log::debug!(
            "Swept {} idle identities from in-memory rate limit storage",
            before.saturating_sub(self.entries.len())
        );
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.entries.len()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStorage for InMemoryStorage {
    async fn check_and_record(&self, identity: &str, now: i64, limits: Limits) -> Result<RateLimitResult, StorageError> {
        Ok(self.check(identity, now, limits))
    }
}
