//! Cache Eviction Policy - Reference Counting with a Recently-Used Threshold
//!
//! **Retention model**:
//! - Every successful load *retains* its key: the retainer count goes up and
//!   the key moves to the front of the recently-used list
//! - Releasing decrements the count (never below zero)
//! - Keys beyond the first `threshold` entries of the recently-used list that
//!   have no retainers are candidates for eviction
//!
//! The policy does not own the cache. Mutating operations return the keys the
//! caller must delete, so the cache and the policy never borrow each other.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default number of unretained entries kept around for quick re-use
pub const DEFAULT_EVICTION_THRESHOLD: usize = 5;

/// Retainer-count/threshold eviction bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEvictionPolicy<K> {
    retainer_count: HashMap<K, usize>,
    recently_used: VecDeque<K>,
    threshold: usize,
}

impl<K: Clone + Eq + Hash> CacheEvictionPolicy<K> {
    /// Create a policy with the given eviction threshold
    pub fn new(threshold: usize) -> Self {
        Self {
            retainer_count: HashMap::new(),
            recently_used: VecDeque::new(),
            threshold,
        }
    }

    /// Number of recently used entries exempt from eviction
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Change the threshold and return keys that now need eviction
    pub fn set_threshold(&mut self, threshold: usize) -> Vec<K> {
        self.threshold = threshold;
        self.evict()
    }

    /// Current retainer count of `key` (zero when unknown)
    pub fn retainer_count(&self, key: &K) -> usize {
        self.retainer_count.get(key).copied().unwrap_or(0)
    }

    /// Keys in recently-used order, most recent first
    pub fn recently_used(&self) -> impl Iterator<Item = &K> {
        self.recently_used.iter()
    }

    /// Forget all bookkeeping
    pub fn reset(&mut self) {
        self.retainer_count.clear();
        self.recently_used.clear();
    }

    /// Mark `key` as used by one more consumer
    pub fn retain(&mut self, key: &K) -> Vec<K> {
        *self.retainer_count.entry(key.clone()).or_insert(0) += 1;
        self.touch(key);
        self.evict()
    }

    /// Mark one consumer of `key` as done with it
    pub fn release(&mut self, key: &K) -> Vec<K> {
        if let Some(count) = self.retainer_count.get_mut(key) {
            *count = count.saturating_sub(1);
        }
        self.evict()
    }

    /// Remove `key` from the bookkeeping after the caller deleted it
    pub fn forget(&mut self, key: &K) {
        self.retainer_count.remove(key);
        self.recently_used.retain(|used| used != key);
    }

    /// Collect unretained keys beyond the threshold, least recently used first
    ///
    /// Returned keys are removed from the bookkeeping.
    pub fn evict(&mut self) -> Vec<K> {
        let mut evicted = Vec::new();
        if self.recently_used.len() <= self.threshold {
            return evicted;
        }

        let mut index = self.recently_used.len();
        while index > self.threshold {
            index -= 1;
            let unretained = self.retainer_count(&self.recently_used[index]) == 0;
            if unretained {
                if let Some(key) = self.recently_used.remove(index) {
                    self.retainer_count.remove(&key);
                    evicted.push(key);
                }
            }
        }

        evicted
    }

    fn touch(&mut self, key: &K) {
        self.recently_used.retain(|used| used != key);
        self.recently_used.push_front(key.clone());
    }
}

impl<K: Clone + Eq + Hash> Default for CacheEvictionPolicy<K> {
    fn default() -> Self {
        Self::new(DEFAULT_EVICTION_THRESHOLD)
    }
}
