//! Bounded, TTL'd nonce replay cache for the facilitator's verifier.
//!
//! The on-chain `authorizationState` check in the `exact`/`upto` schemes is
//! the authoritative replay guard — this cache only shortcuts the common
//! case so a replayed nonce is rejected without a round trip to the chain.
//! A miss here never means "not replayed"; it only means "ask the chain".

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const SOFT_CAP: usize = 10_000;
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_millis() as u64
}

/// Facilitator-side nonce cache keyed by `(network, nonce)`.
///
/// Single owner: the verifier. Nothing else writes to it.
pub struct NonceCache {
    entries: DashMap<(String, String), u64>,
    ttl: Duration,
    soft_cap: usize,
    replay_attempts_blocked: AtomicU64,
}

impl NonceCache {
    /// Creates a cache with the default 5-minute TTL and 10,000-entry cap.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a cache with a custom TTL, default soft cap.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            soft_cap: SOFT_CAP,
            replay_attempts_blocked: AtomicU64::new(0),
        }
    }

    /// Returns `true` if `(network, nonce)` is already recorded and has not
    /// expired. Increments the replay counter when it returns `true`.
    pub fn contains(&self, network: &str, nonce: &str) -> bool {
        let key = (network.to_string(), nonce.to_string());
        match self.entries.get(&key) {
            Some(expiry) if *expiry > now_millis() => {
                self.replay_attempts_blocked.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(_) => false,
            None => false,
        }
    }

    /// Records `(network, nonce)` as seen, expiring after the TTL.
    /// Evicts the oldest half of entries first if the soft cap is exceeded.
    pub fn record(&self, network: &str, nonce: &str) {
        if self.entries.len() >= self.soft_cap {
            self.evict_oldest_half();
        }
        let expiry = now_millis() + self.ttl.as_millis() as u64;
        self.entries
            .insert((network.to_string(), nonce.to_string()), expiry);
    }

    /// Removes all expired entries. Intended to run on a periodic sweep.
    pub fn sweep(&self) {
        let now = now_millis();
        self.entries.retain(|_, expiry| *expiry > now);
    }

    /// Number of entries currently tracked (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total replay attempts this cache has blocked since creation.
    pub fn replay_attempts_blocked(&self) -> u64 {
        self.replay_attempts_blocked.load(Ordering::Relaxed)
    }

    fn evict_oldest_half(&self) {
        let mut by_expiry: Vec<((String, String), u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        by_expiry.sort_by_key(|(_, expiry)| *expiry);
        for (key, _) in by_expiry.into_iter().take(by_expiry.len() / 2 + 1) {
            self.entries.remove(&key);
        }
    }

    /// Spawns a background task that sweeps expired entries every 60s.
    /// Runs until the returned handle is aborted or the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                cache.sweep();
            }
        })
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side companion: tracks nonces this process has already drawn so it
/// never signs a local collision, independent of the facilitator's cache.
pub struct SelfNonceSet {
    seen: DashMap<String, ()>,
    order: std::sync::Mutex<std::collections::VecDeque<String>>,
}

const SELF_NONCE_SOFT_CAP: usize = 10_000;
const SELF_NONCE_GC_TARGET: usize = 5_000;
const MAX_REDRAWS: usize = 100;

impl SelfNonceSet {
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
            order: std::sync::Mutex::new(std::collections::VecDeque::new()),
        }
    }

    /// Draws a fresh nonce, re-drawing on local collision up to 100 times.
    pub fn draw_unique<F: Fn() -> String>(&self, generate: F) -> crate::errors::Result<String> {
        for _ in 0..MAX_REDRAWS {
            let candidate = generate();
            if !self.seen.contains_key(&candidate) {
                self.record(candidate.clone());
                return Ok(candidate);
            }
        }
        Err(crate::errors::X402Error::Other(
            "failed to draw a unique nonce after 100 attempts".to_string(),
        ))
    }

    fn record(&self, nonce: String) {
        self.seen.insert(nonce.clone(), ());
        let mut order = self.order.lock().expect("self-nonce order lock poisoned");
        order.push_back(nonce);
        if order.len() > SELF_NONCE_SOFT_CAP {
            while order.len() > SELF_NONCE_GC_TARGET {
                if let Some(old) = order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for SelfNonceSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_detects_replay() {
        let cache = NonceCache::new();
        assert!(!cache.contains("base-mainnet", "0xabc"));
        cache.record("base-mainnet", "0xabc");
        assert!(cache.contains("base-mainnet", "0xabc"));
        assert_eq!(cache.replay_attempts_blocked(), 1);
    }

    #[test]
    fn different_networks_are_independent() {
        let cache = NonceCache::new();
        cache.record("base-mainnet", "0xabc");
        assert!(!cache.contains("base-sepolia", "0xabc"));
    }

    #[test]
    fn expired_entries_are_not_replays() {
        let cache = NonceCache::with_ttl(Duration::from_millis(1));
        cache.record("base-mainnet", "0xabc");
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.contains("base-mainnet", "0xabc"));
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let cache = NonceCache::with_ttl(Duration::from_millis(1));
        cache.record("base-mainnet", "0xabc");
        std::thread::sleep(Duration::from_millis(20));
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn self_nonce_set_redraws_on_collision() {
        let set = SelfNonceSet::new();
        set.record("collision".to_string());
        let mut calls = 0;
        let nonce = set
            .draw_unique(|| {
                calls += 1;
                if calls < 3 {
                    "collision".to_string()
                } else {
                    "unique".to_string()
                }
            })
            .unwrap();
        assert_eq!(nonce, "unique");
    }
}
