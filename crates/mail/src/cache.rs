//! Payload cache abstraction
//!
//! The batch fetch path consults a cache before deciding which items to
//! request remotely, and fills it from successful fetches. Entries never
//! expire and are never evicted; the cache lives only as long as the
//! process.

use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for caching raw remote payloads keyed by item ID
///
/// This trait abstracts over cache backends so the fetch path can be tested
/// against preloaded caches. Implementations must be safe to share across
/// tasks.
pub trait PayloadCache<P>: Send + Sync {
    /// Get a clone of the cached payload for `key`, if present
    fn get(&self, key: &str) -> Option<P>;

    /// Insert or replace the payload for `key`
    fn set(&self, key: &str, payload: P);

    /// Number of cached entries
    fn len(&self) -> usize;

    /// Whether the cache holds no entries
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory implementation of PayloadCache
///
/// Uses a HashMap protected by an RwLock for thread-safe access.
pub struct InMemoryCache<P> {
    entries: RwLock<HashMap<String, P>>,
}

impl<P> InMemoryCache<P> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> Default for InMemoryCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send + Sync> PayloadCache<P> for InMemoryCache<P> {
    fn get(&self, key: &str) -> Option<P> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, payload: P) {
        self.entries.write().unwrap().insert(key.to_string(), payload);
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}
