//! Cache-aware batched item resolution
//!
//! List operations come back as bare item IDs; this module turns a page of
//! IDs into full payloads. IDs found in the cache are served from it, the
//! rest go out in one batched remote call, and fetched payloads are written
//! back to the cache. Results keep the input ID order regardless of how
//! the batch responses arrive.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};

use crate::cache::PayloadCache;
use crate::transport::BatchResults;

/// One input ID with the payload resolution outcome
///
/// `payload` is `None` when the item's sub-request failed (or the server
/// skipped it) and no cached value could stand in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem<P> {
    pub id: String,
    pub payload: Option<P>,
}

/// Resolves pages of item IDs into payloads, consulting a cache first
pub struct BatchFetcher<P> {
    cache: Option<Arc<dyn PayloadCache<P>>>,
}

impl<P: Clone + Send + Sync> BatchFetcher<P> {
    /// A fetcher that always goes to the remote for every ID
    pub fn uncached() -> Self {
        Self { cache: None }
    }

    /// A fetcher backed by a cache
    pub fn with_cache(cache: Arc<dyn PayloadCache<P>>) -> Self {
        Self { cache: Some(cache) }
    }

    /// Resolve `ids` into payloads
    ///
    /// Repeated IDs are collapsed before fetching: `fetch_missing` is
    /// invoked at most once, with exactly the distinct IDs that missed the
    /// cache, and must return per-ID results keyed by ID. Every input
    /// occurrence still gets its own [`ResolvedItem`]. A failure of the
    /// batch as a whole counts as a failure of each of its sub-requests;
    /// per-ID failures fall back to whatever the cache holds at merge time.
    pub async fn resolve<F, Fut>(&self, ids: &[String], fetch_missing: F) -> Vec<ResolvedItem<P>>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = Result<BatchResults<P>>>,
    {
        // Partition into cached and missing, first occurrence of each ID
        // only, preserving input order
        let mut cached: HashMap<String, P> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.cache.as_ref().and_then(|c| c.get(id)) {
                Some(payload) => {
                    cached.insert(id.clone(), payload);
                }
                None => missing.push(id.clone()),
            }
        }

        let mut fetched: BatchResults<P> = HashMap::new();
        if !missing.is_empty() {
            debug!(
                "Resolving {} of {} items remotely ({} cached)",
                missing.len(),
                ids.len(),
                cached.len()
            );
            match fetch_missing(missing.clone()).await {
                Ok(results) => fetched = results,
                Err(e) => {
                    warn!("Batch fetch of {} items failed: {:#}", missing.len(), e);
                }
            }
        }

        // Merge back in input order; lookups are non-consuming so repeated
        // IDs each resolve
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let payload = if let Some(payload) = cached.get(id) {
                Some(payload.clone())
            } else {
                match fetched.get(id) {
                    Some(Ok(payload)) => {
                        if let Some(cache) = &self.cache {
                            cache.set(id, payload.clone());
                        }
                        Some(payload.clone())
                    }
                    Some(Err(e)) => {
                        warn!("Fetch failed for item {}: {:#}", id, e);
                        self.stale(id)
                    }
                    None => self.stale(id),
                }
            };
            resolved.push(ResolvedItem {
                id: id.clone(),
                payload,
            });
        }
        resolved
    }

    /// Whatever the cache holds for `id` right now
    ///
    /// Checked again at merge time: a concurrent operation may have filled
    /// the entry after this call partitioned it as missing.
    fn stale(&self, id: &str) -> Option<P> {
        self.cache.as_ref().and_then(|c| c.get(id))
    }
}
