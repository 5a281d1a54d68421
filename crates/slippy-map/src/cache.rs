use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::Config;
use crate::error::FetchError;
use crate::source::TileSource;
use crate::tiles::TileKey;

/// A cloneable handle to one tile fetch. Every clone resolves to the same result.
pub type TileFuture<I> = Shared<BoxFuture<'static, Result<Arc<I>, FetchError>>>;

/// Where a cached fetch currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Failed entries that were fetched again.
    pub retries: usize,
    pub evictions: usize,
}

struct CacheEntry<I> {
    future: TileFuture<I>,
    last_used: u64,
}

/// Maps each [`TileKey`] to a single in-flight or completed fetch.
///
/// A key is fetched from the [`TileSource`] at most once while its entry lives, no matter
/// how many render passes ask for it. Entries leave the cache in two ways:
///  - A fetch that failed (or timed out) is replaced by a fresh fetch on the next
///    [`get`](Self::get).
///  - Once over capacity, the least recently requested entry is evicted. Anyone still
///    holding its handle keeps it, the cache just forgets about it.
pub struct TileCache<S: TileSource> {
    source: S,
    entries: HashMap<TileKey, CacheEntry<S::Image>>,
    /// `last_used` of every entry, oldest first. Ticks are unique, so this mirrors
    /// `entries` exactly.
    recency: BTreeMap<u64, TileKey>,
    capacity: usize,
    fetch_timeout: Duration,
    tick: u64,
    stats: CacheStats,
}

impl<S: TileSource> TileCache<S> {
    pub fn new(source: S, capacity: usize, fetch_timeout: Duration) -> Self {
        Self {
            source,
            entries: HashMap::with_capacity(capacity.min(256)),
            recency: BTreeMap::new(),
            capacity: capacity.max(1),
            fetch_timeout,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(source: S, config: &Config) -> Self {
        Self::new(source, config.cache_capacity, config.fetch_timeout())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn state(&self, key: TileKey) -> Option<TileState> {
        self.entries
            .get(&key)
            .map(|entry| match entry.future.peek() {
                None => TileState::Pending,
                Some(Ok(_)) => TileState::Ready,
                Some(Err(_)) => TileState::Failed,
            })
    }

    /// Returns the handle for `key`, starting the fetch if the key isn't cached (or its
    /// last fetch failed).
    pub fn get(&mut self, key: TileKey) -> TileFuture<S::Image> {
        self.tick += 1;
        let tick = self.tick;

        let retry = match self.entries.get_mut(&key) {
            Some(entry) if !matches!(entry.future.peek(), Some(Err(_))) => {
                self.recency.remove(&entry.last_used);
                self.recency.insert(tick, key);
                entry.last_used = tick;
                self.stats.hits += 1;
                return entry.future.clone();
            }
            Some(entry) => {
                self.recency.remove(&entry.last_used);
                true
            }
            None => false,
        };

        if retry {
            debug!(message = "retrying failed tile", %key);
            self.stats.retries += 1;
        } else {
            self.stats.misses += 1;
        }

        let future = self.fetch(key);

        self.entries.insert(key, CacheEntry {
            future: future.clone(),
            last_used: tick,
        });
        self.recency.insert(tick, key);

        if self.entries.len() > self.capacity {
            self.evict_over_capacity();
        }

        future
    }

    fn fetch(&self, key: TileKey) -> TileFuture<S::Image> {
        let fetch = self.source.fetch(key);
        let timeout = self.fetch_timeout;

        async move {
            match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(image)) => Ok(Arc::new(image)),
                Ok(Err(error)) => Err(FetchError::Source {
                    key,
                    error: Arc::new(error),
                }),
                Err(_elapsed) => Err(FetchError::TimedOut {
                    key,
                    after: timeout,
                }),
            }
        }
        .boxed()
        .shared()
    }

    fn evict_over_capacity(&mut self) {
        let mut evicted = 0;

        while self.entries.len() > self.capacity {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };

            self.entries.remove(&key);
            evicted += 1;
        }

        self.stats.evictions += evicted;
        trace!(message = "evicted tiles", evicted, remaining = self.entries.len());
    }
}
