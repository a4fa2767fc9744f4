//! Bounded-retention cache of previously accepted proof nonces.
//!
//! The cache is defense-in-depth: freshness checking on the embedded
//! timestamp is the primary replay defense, and the retention window
//! comfortably exceeds the freshness tolerance. Absence of a nonce here is
//! not proof of non-replay beyond the retention window.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::state::ServerState;

/// Entries older than this are purged. Chosen to exceed any plausible
/// clock-skew plus replay window while bounding memory growth under
/// sustained connection volume.
pub const REPLAY_MAX_AGE_SECS: u64 = 12 * 3600;

/// How often the background sweeper fires, independent of traffic.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Time-bounded set of previously seen client nonces.
///
/// Owned by [`ServerState`] and shared by every connection task; all access
/// goes through the synchronized [`observe`](ReplayCache::observe) and
/// [`sweep`](ReplayCache::sweep) operations.
#[derive(Default)]
pub struct ReplayCache {
    entries: Mutex<HashMap<[u8; 32], u64>>,
}

impl ReplayCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check-and-insert a nonce.
    ///
    /// Returns `true` if the nonce was already present. The check and the
    /// insert happen under one lock acquisition so two authenticators racing
    /// on the same nonce cannot both see it as fresh.
    pub fn observe(&self, nonce: [u8; 32], now: u64) -> bool {
        match self.entries.lock().entry(nonce) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(now);
                false
            }
        }
    }

    /// Remove all entries strictly older than `max_age` seconds.
    ///
    /// Purging is advisory: it bounds memory, correctness comes from the
    /// freshness check. Returns the number of entries removed.
    pub fn sweep(&self, now: u64, max_age: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, inserted| now.saturating_sub(*inserted) <= max_age);
        before - entries.len()
    }

    /// Number of nonces currently retained.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Perpetual background sweeper, started once at process init.
///
/// Runs for the life of the process; it is safe for it to run concurrently
/// with `observe` since both serialize on the cache lock.
pub async fn run_sweeper(state: Arc<ServerState>) {
    loop {
        tokio::time::sleep(SWEEP_INTERVAL).await;

        let swept = state.replay().sweep(state.now(), REPLAY_MAX_AGE_SECS);
        if swept > 0 {
            tracing::debug!("swept {} expired nonces from the replay cache", swept);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_700_000_000;

    #[test]
    fn test_observe_is_check_and_insert() {
        let cache = ReplayCache::new();
        let nonce = [0x42u8; 32];

        assert!(!cache.observe(nonce, T));
        assert!(cache.observe(nonce, T));
        assert!(cache.observe(nonce, T + 100));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_nonces_are_fresh() {
        let cache = ReplayCache::new();
        assert!(!cache.observe([1u8; 32], T));
        assert!(!cache.observe([2u8; 32], T));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = ReplayCache::new();
        cache.observe([1u8; 32], T);

        // At T + 11h the entry is within the window and survives.
        assert_eq!(cache.sweep(T + 11 * 3600, REPLAY_MAX_AGE_SECS), 0);
        assert_eq!(cache.len(), 1);

        // One second past the 12h window it is purged.
        assert_eq!(cache.sweep(T + REPLAY_MAX_AGE_SECS + 1, REPLAY_MAX_AGE_SECS), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_exact_boundary_survives() {
        let cache = ReplayCache::new();
        cache.observe([1u8; 32], T);

        // now - timestamp must be strictly greater than max_age to purge.
        assert_eq!(cache.sweep(T + REPLAY_MAX_AGE_SECS, REPLAY_MAX_AGE_SECS), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_with_clock_behind_insertion() {
        let cache = ReplayCache::new();
        cache.observe([1u8; 32], T + 500);

        // An entry stamped in the future is never older than max_age.
        assert_eq!(cache.sweep(T, REPLAY_MAX_AGE_SECS), 0);
        assert_eq!(cache.len(), 1);
    }
}
