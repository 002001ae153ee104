//! Asset Cache - Coalescing Loader with Reference-Counted Eviction
//!
//! **Lifecycle of an entry**:
//! ```text
//! load/preload ──miss──> Pending ──fetch ok──> Ready ──unretained & beyond threshold──> evicted
//!                           │
//!                           └──fetch failed──> removed (next request retries)
//! ```
//!
//! - Concurrent requests for one identifier share a single fetch
//!   (`futures::future::Shared`), so duplicates resolve or reject together
//! - Every successful `load` retains the entry and returns a
//!   [`RetainedContent`], an independently mutable clone that releases its
//!   retainer when dropped
//! - Failures are never cached
//!
//! The cache is single-threaded: state lives behind `Rc<RefCell<_>>` and no
//! borrow is held across an await point.

use super::eviction::CacheEvictionPolicy;
use super::{AssetFetcher, AssetId, LoadError, SceneGraphContent};
use crate::config::CacheConfig;
use crate::foundation::time::Millis;
use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

type SharedFetch = Shared<LocalBoxFuture<'static, Result<Rc<SceneGraphContent>, LoadError>>>;

/// Observable state of a cache entry
#[derive(Debug, Clone)]
pub enum AssetState {
    /// Fetch in flight
    Pending,
    /// Decoded source available
    Ready(Rc<SceneGraphContent>),
    /// Fetch failed; the entry is dropped by the next request for it
    Failed(LoadError),
}

struct CacheEntry {
    fetch: SharedFetch,
    serial: u64,
}

struct DeferredRelease {
    deadline: Millis,
    id: AssetId,
}

struct CacheState {
    entries: HashMap<AssetId, CacheEntry>,
    policy: CacheEvictionPolicy<AssetId>,
    deferred: Vec<DeferredRelease>,
    next_serial: u64,
}

/// Shared, cloneable handle to the asset cache
///
/// Clones refer to the same cache.
#[derive(Clone)]
pub struct AssetCache {
    state: Rc<RefCell<CacheState>>,
    fetcher: Rc<dyn AssetFetcher>,
}

impl AssetCache {
    /// Create a cache with default configuration
    pub fn new(fetcher: Rc<dyn AssetFetcher>) -> Self {
        Self::with_config(fetcher, &CacheConfig::default())
    }

    /// Create a cache from configuration
    pub fn with_config(fetcher: Rc<dyn AssetFetcher>, config: &CacheConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(CacheState {
                entries: HashMap::new(),
                policy: CacheEvictionPolicy::new(config.eviction_threshold),
                deferred: Vec::new(),
                next_serial: 0,
            })),
            fetcher,
        }
    }

    /// Load `id` and return an independent, retained instance of it
    pub fn load(&self, id: impl Into<AssetId>) -> LocalBoxFuture<'static, Result<RetainedContent, LoadError>> {
        let id = id.into();
        let (serial, fetch) = self.shared_fetch(&id);
        let cache = self.clone();

        async move {
            let result = fetch.await;
            cache.settle(&id, serial, &result);
            let source = result?;

            let content = source.deep_clone();
            cache.retain(&id);
            log::debug!("Instanced {} ({} retainers)", id, cache.retainer_count(&id));

            Ok::<_, LoadError>(RetainedContent {
                content,
                id,
                cache: Some(cache),
            })
        }
        .boxed_local()
    }

    /// Warm the cache for `id` without producing an instance
    pub fn preload(&self, id: impl Into<AssetId>) -> LocalBoxFuture<'static, Result<(), LoadError>> {
        let id = id.into();
        let (serial, fetch) = self.shared_fetch(&id);
        let cache = self.clone();

        async move {
            let result = fetch.await;
            cache.settle(&id, serial, &result);
            result.map(|_| ())
        }
        .boxed_local()
    }

    /// True once the decoded source for `id` is available
    pub fn has_finished_loading(&self, id: &AssetId) -> bool {
        self.state
            .borrow()
            .entries
            .get(id)
            .map_or(false, |entry| matches!(entry.fetch.peek(), Some(Ok(_))))
    }

    /// True when an entry (pending or ready) exists for `id`
    pub fn contains(&self, id: &AssetId) -> bool {
        self.state.borrow().entries.contains_key(id)
    }

    /// State of the entry for `id`
    pub fn state(&self, id: &AssetId) -> Option<AssetState> {
        let state = self.state.borrow();
        let entry = state.entries.get(id)?;
        Some(match entry.fetch.peek() {
            None => AssetState::Pending,
            Some(Ok(content)) => AssetState::Ready(Rc::clone(content)),
            Some(Err(error)) => AssetState::Failed(error.clone()),
        })
    }

    /// Number of live instances of `id`
    pub fn retainer_count(&self, id: &AssetId) -> usize {
        self.state.borrow().policy.retainer_count(id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// True when the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    /// Current eviction threshold
    pub fn eviction_threshold(&self) -> usize {
        self.state.borrow().policy.threshold()
    }

    /// Change the eviction threshold, evicting immediately if needed
    pub fn set_eviction_threshold(&self, threshold: usize) {
        let mut state = self.state.borrow_mut();
        let evicted = state.policy.set_threshold(threshold);
        Self::delete(&mut state, evicted);
    }

    /// Evict `id` unless it is retained; returns whether it was removed
    pub fn evict(&self, id: &AssetId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.policy.retainer_count(id) > 0 {
            log::debug!("Refusing to evict retained {}", id);
            return false;
        }
        state.policy.forget(id);
        state.entries.remove(id).is_some()
    }

    /// Drop every entry and reset eviction bookkeeping
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.entries.clear();
        state.policy.reset();
        state.deferred.clear();
    }

    /// Perform deferred releases whose deadline has passed
    ///
    /// Returns the number of releases performed.
    pub fn process_deferred_releases(&self, now: Millis) -> usize {
        let due: Vec<AssetId> = {
            let mut state = self.state.borrow_mut();
            let (due, waiting): (Vec<_>, Vec<_>) =
                state.deferred.drain(..).partition(|release| release.deadline <= now);
            state.deferred = waiting;
            due.into_iter().map(|release| release.id).collect()
        };

        for id in &due {
            log::debug!("Grace period over for {}", id);
            self.release(id);
        }
        due.len()
    }

    /// Number of releases waiting for their deadline
    pub fn pending_releases(&self) -> usize {
        self.state.borrow().deferred.len()
    }

    fn shared_fetch(&self, id: &AssetId) -> (u64, SharedFetch) {
        {
            let state = self.state.borrow();
            if let Some(entry) = state.entries.get(id) {
                if !matches!(entry.fetch.peek(), Some(Err(_))) {
                    log::debug!("Cache hit for {}", id);
                    return (entry.serial, entry.fetch.clone());
                }
            }
        }

        log::debug!("Cache miss for {}, fetching", id);
        let fetch = self
            .fetcher
            .fetch(id)
            .map(|result| {
                result.map(|mut content| {
                    content.ensure_node_names();
                    Rc::new(content)
                })
            })
            .boxed_local()
            .shared();

        let mut state = self.state.borrow_mut();
        state.next_serial += 1;
        let serial = state.next_serial;
        state.entries.insert(
            id.clone(),
            CacheEntry {
                fetch: fetch.clone(),
                serial,
            },
        );
        (serial, fetch)
    }

    /// Drop the entry a failed fetch belongs to
    fn settle(&self, id: &AssetId, serial: u64, result: &Result<Rc<SceneGraphContent>, LoadError>) {
        let Err(error) = result else {
            return;
        };
        let mut state = self.state.borrow_mut();
        if state.entries.get(id).map(|entry| entry.serial) == Some(serial) {
            log::warn!("Failed to load {}: {}", id, error);
            state.entries.remove(id);
        }
    }

    fn retain(&self, id: &AssetId) {
        let mut state = self.state.borrow_mut();
        let evicted = state.policy.retain(id);
        Self::delete(&mut state, evicted);
    }

    fn release(&self, id: &AssetId) {
        let mut state = self.state.borrow_mut();
        let evicted = state.policy.release(id);
        Self::delete(&mut state, evicted);
    }

    fn defer_release(&self, id: AssetId, deadline: Millis) {
        self.state
            .borrow_mut()
            .deferred
            .push(DeferredRelease { deadline, id });
    }

    fn delete(state: &mut CacheState, evicted: Vec<AssetId>) {
        for id in evicted {
            if state.entries.remove(&id).is_some() {
                log::debug!("Evicted {} from cache", id);
            }
        }
    }
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("AssetCache")
            .field("entries", &state.entries.len())
            .field("threshold", &state.policy.threshold())
            .field("deferred", &state.deferred.len())
            .finish()
    }
}

/// A Scene's own instance of cached content
///
/// Holds one retainer on its cache entry until released, dropped, or handed
/// to the deferred-release queue.
#[derive(Debug)]
pub struct RetainedContent {
    content: SceneGraphContent,
    id: AssetId,
    cache: Option<AssetCache>,
}

impl RetainedContent {
    /// Identifier this instance was loaded from
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// The instance
    pub fn content(&self) -> &SceneGraphContent {
        &self.content
    }

    /// The instance, mutably
    pub fn content_mut(&mut self) -> &mut SceneGraphContent {
        &mut self.content
    }

    /// Whether the retainer is still held
    pub fn is_retained(&self) -> bool {
        self.cache.is_some()
    }

    /// Give the retainer back to the cache; later calls do nothing
    pub fn release(&mut self) {
        if let Some(cache) = self.cache.take() {
            cache.release(&self.id);
        }
    }

    /// Release the retainer once `deadline` has passed
    ///
    /// Re-loading the same identifier before then finds the entry still
    /// cached.
    pub fn release_deferred(mut self, deadline: Millis) {
        if let Some(cache) = self.cache.take() {
            cache.defer_release(self.id.clone(), deadline);
        }
    }
}

impl Deref for RetainedContent {
    type Target = SceneGraphContent;

    fn deref(&self) -> &SceneGraphContent {
        &self.content
    }
}

impl DerefMut for RetainedContent {
    fn deref_mut(&mut self) -> &mut SceneGraphContent {
        &mut self.content
    }
}

impl Drop for RetainedContent {
    fn drop(&mut self) {
        self.release();
    }
}
