//! LRU cache for access decisions
//!
//! Shared by every caller of one evaluator, so it sits behind a mutex and
//! hands out copies. Own-graph decisions never reach it.
//!
//! Every [`DecisionCache::clear`] starts a new generation. A decision computed
//! while a clear happened is dropped by [`DecisionCache::put_if_current`]
//! instead of outliving the invalidation.

use super::Action;
use ahash::RandomState;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Capacity used when a zero capacity is requested
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Cache key: who asked, for what, on which graph (security name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    identity: String,
    action: Action,
    graph: String,
}

impl DecisionKey {
    pub fn new(identity: &str, action: Action, graph: &str) -> Self {
        DecisionKey {
            identity: identity.to_string(),
            action,
            graph: graph.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded, thread-safe decision cache
pub struct DecisionCache {
    entries: Mutex<LruCache<DecisionKey, bool, RandomState>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    /// Create a cache holding at most `capacity` decisions
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        DecisionCache {
            entries: Mutex::new(LruCache::with_hasher(capacity, RandomState::new())),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &DecisionKey) -> Option<bool> {
        let found = self.entries.lock().get(key).copied();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, key: DecisionKey, allowed: bool) {
        self.entries.lock().put(key, allowed);
    }

    /// Current generation; read it before computing a decision to store
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store `allowed` unless the cache was cleared since `generation`
    pub fn put_if_current(&self, key: DecisionKey, allowed: bool, generation: u64) -> bool {
        let mut entries = self.entries.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        entries.put(key, allowed);
        true
    }

    /// Drop every cached decision
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
