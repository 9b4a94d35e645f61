//! Content-addressed cache of parsed source units
//!
//! Keyed by content hash: identical content across files or commits
//! parses once. Concurrent requests for the same hash coalesce into a
//! single in-flight parse; other callers await its result. Completed
//! units are held in an LRU window; parse failures are never cached.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use archgraph_core::{ContentHash, ParseFailure, SourceUnit};
use dashmap::DashMap;
use lru::LruCache;
use tokio::sync::OnceCell;

type ParseResult = Result<Arc<SourceUnit>, ParseFailure>;

pub struct SymbolStore {
    cached: Mutex<LruCache<ContentHash, Arc<SourceUnit>>>,
    inflight: DashMap<ContentHash, Arc<OnceCell<ParseResult>>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl SymbolStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        SymbolStore {
            cached: Mutex::new(LruCache::new(capacity)),
            inflight: DashMap::new(),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Read-through lookup: return the cached unit for this hash or run
    /// `parse` to produce it. At most one parse per hash is in flight;
    /// concurrent callers await the winner's result.
    pub async fn get_or_parse<F, Fut>(&self, hash: ContentHash, parse: F) -> ParseResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParseResult>,
    {
        use std::sync::atomic::Ordering;

        if let Some(unit) = self.cached.lock().expect("store lock poisoned").get(&hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(unit));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let cell = self
            .inflight
            .entry(hash)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async {
                let result = parse().await;
                if let Ok(unit) = &result {
                    self.cached
                        .lock()
                        .expect("store lock poisoned")
                        .put(hash, Arc::clone(unit));
                }
                result
            })
            .await
            .clone();

        // The cell served its coalescing purpose; failures stay
        // uncached so the next run retries.
        self.inflight.remove(&hash);
        result
    }

    /// Drop one entry, e.g. on snapshot deletion.
    pub fn invalidate(&self, hash: ContentHash) {
        self.cached.lock().expect("store lock poisoned").pop(&hash);
    }

    pub fn clear(&self) {
        self.cached.lock().expect("store lock poisoned").clear();
    }

    pub fn stats(&self) -> StoreStats {
        use std::sync::atomic::Ordering;
        StoreStats {
            cached_units: self.cached.lock().expect("store lock poisoned").len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub cached_units: usize,
    pub hits: u64,
    pub misses: u64,
}
