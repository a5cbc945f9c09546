//! The explicit dependency bundle for everything cache-shaped.
//!
//! One [`CacheContext`] owns the persisted store, the generic query cache
//! and the typed domain caches.  It is constructed once at startup and
//! passed down by reference; two contexts over two stores are fully
//! independent, which is what makes the cache layer testable.

use std::sync::Arc;

use crate::caches::{EventDetailCache, IdSetCache};
use crate::persist::PersistedStore;
use crate::query_cache::QueryCache;

pub struct CacheContext {
    pub store: Arc<PersistedStore>,
    pub queries: Arc<QueryCache>,
    pub starred: IdSetCache,
    pub attending: IdSetCache,
    pub event_details: EventDetailCache,
}

impl CacheContext {
    /// Build a context over an already-opened store.
    pub fn new(store: Arc<PersistedStore>) -> Arc<Self> {
        Arc::new(Self {
            queries: QueryCache::new(Arc::clone(&store)),
            starred: IdSetCache::starred(Arc::clone(&store)),
            attending: IdSetCache::attending(Arc::clone(&store)),
            event_details: EventDetailCache::new(Arc::clone(&store)),
            store,
        })
    }

    /// Context over the platform-default store, rehydrated.
    pub fn open_default() -> Arc<Self> {
        let ctx = Self::new(Arc::new(PersistedStore::open_default()));
        ctx.queries.hydrate();
        ctx
    }

    /// Context over a store at an explicit path, rehydrated.
    pub fn open_at(path: &std::path::Path) -> Arc<Self> {
        let ctx = Self::new(Arc::new(PersistedStore::open_at(path)));
        ctx.queries.hydrate();
        ctx
    }

    /// Context over an in-memory store (tests, storage-less fallback).
    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(PersistedStore::in_memory()))
    }
}
