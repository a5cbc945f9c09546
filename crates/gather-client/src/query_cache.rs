//! Keyed, time-boxed query cache with background revalidation.
//!
//! Entries are indexed by a composite [`QueryKey`] and carry per-entry
//! freshness windows.  Reads serve non-evicted data immediately; stale
//! data additionally triggers a detached background refresh
//! (stale-while-revalidate).  Concurrent reads of one key coalesce onto a
//! single in-flight load, and every fetch/write carries a monotone
//! sequence stamp so a slower, earlier-issued fetch can never overwrite a
//! later result.
//!
//! The cache rehydrates from the persisted store on cold start and writes
//! back on change, throttled to bound storage I/O.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::Future;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use gather_shared::constants::{
    EVENT_DETAIL_MAX_AGE, EVENT_LIST_EVICT_AFTER, EVENT_LIST_STALE_AFTER, GROUP_STALE_AFTER,
    KEY_PREFIX_QUERY_CACHE, PROFILE_STALE_AFTER, QUERY_CACHE_FLUSH_THROTTLE, QUERY_CACHE_VERSION,
};

use crate::error::{ClientError, Result};
use crate::persist::PersistedStore;

// ---------------------------------------------------------------------------
// Keys and policies
// ---------------------------------------------------------------------------

/// Composite cache key: a logical resource name followed by disambiguating
/// parameters (group id, filter mode, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(resource: &str) -> Self {
        Self(vec![resource.to_string()])
    }

    /// Append a disambiguating segment.
    pub fn part(mut self, p: impl ToString) -> Self {
        self.0.push(p.to_string());
        self
    }

    /// Whether `self` falls under `prefix` (segment-wise).
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// Freshness windows for one entry.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    /// Age past which data is still served but triggers revalidation.
    pub stale_after: Duration,
    /// Age past which data is treated as absent.
    pub evict_after: Duration,
}

impl FreshnessPolicy {
    pub const fn new(stale_after: Duration, evict_after: Duration) -> Self {
        Self {
            stale_after,
            evict_after,
        }
    }

    pub fn event_list() -> Self {
        Self::new(EVENT_LIST_STALE_AFTER, EVENT_LIST_EVICT_AFTER)
    }

    pub fn profile() -> Self {
        Self::new(PROFILE_STALE_AFTER, EVENT_LIST_EVICT_AFTER)
    }

    pub fn group_list() -> Self {
        Self::new(GROUP_STALE_AFTER, EVENT_LIST_EVICT_AFTER)
    }

    /// Details never serve past their max age, so the windows coincide.
    pub fn event_detail() -> Self {
        Self::new(EVENT_DETAIL_MAX_AGE, EVENT_DETAIL_MAX_AGE)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EntryStatus {
    #[default]
    Idle,
    Fetching,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: Value,
    fetched_at: DateTime<Utc>,
    stale_after_ms: u64,
    evict_after_ms: u64,
    /// Set by [`QueryCache::invalidate`]; cleared when fresh data lands.
    #[serde(default)]
    invalidated: bool,
    /// Sequence stamp of the fetch/write that produced `data`.  Runtime
    /// only: after rehydration entries restart at zero, below any live
    /// stamp.
    #[serde(skip)]
    seq: u64,
    #[serde(skip)]
    status: EntryStatus,
}

impl CacheEntry {
    fn fresh(data: Value, seq: u64, policy: FreshnessPolicy, now: DateTime<Utc>) -> Self {
        Self {
            data,
            fetched_at: now,
            stale_after_ms: policy.stale_after.as_millis() as u64,
            evict_after_ms: policy.evict_after.as_millis() as u64,
            invalidated: false,
            seq,
            status: EntryStatus::Idle,
        }
    }

    fn age_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.fetched_at).num_milliseconds().max(0) as u64
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.invalidated || self.age_ms(now) >= self.stale_after_ms
    }

    fn is_evicted(&self, now: DateTime<Utc>) -> bool {
        self.age_ms(now) >= self.evict_after_ms
    }
}

type LoadResult = std::result::Result<Value, Arc<ClientError>>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

struct Inflight {
    seq: u64,
    shared: SharedLoad,
}

struct Inner {
    entries: BTreeMap<QueryKey, CacheEntry>,
    inflight: HashMap<QueryKey, Inflight>,
    next_seq: u64,
    /// Bumped by [`QueryCache::clear`]; a load started under an older
    /// generation must not land.
    generation: u64,
    last_flush: Option<tokio::time::Instant>,
    flush_pending: bool,
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// The generic memoized-and-revalidated read path.
pub struct QueryCache {
    inner: Mutex<Inner>,
    store: Arc<PersistedStore>,
}

impl QueryCache {
    pub fn new(store: Arc<PersistedStore>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                inflight: HashMap::new(),
                next_seq: 1,
                generation: 0,
                last_flush: None,
                flush_pending: false,
            }),
            store,
        })
    }

    fn snapshot_key() -> String {
        format!("{KEY_PREFIX_QUERY_CACHE}{QUERY_CACHE_VERSION}")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The inner mutex is never held across an await, so poisoning can
        // only come from a panic in a short critical section.
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Restore entries from the persisted snapshot, best-effort.  A
    /// missing or corrupt snapshot yields an empty cache and purges any
    /// blobs left behind by older cache versions.
    pub fn hydrate(&self) {
        match self
            .store
            .get_json::<Vec<(QueryKey, CacheEntry)>>(&Self::snapshot_key())
        {
            Some(entries) => {
                let mut inner = self.lock();
                let count = entries.len();
                for (key, entry) in entries {
                    inner.entries.insert(key, entry);
                }
                debug!(count, "query cache rehydrated");
            }
            None => {
                self.store.remove_matching_prefix(KEY_PREFIX_QUERY_CACHE);
                debug!("no usable query cache snapshot, starting empty");
            }
        }
    }

    /// Read through the cache.
    ///
    /// Fresh entry: returned immediately, `loader` not invoked.  Stale
    /// entry: returned immediately while one background refresh runs.
    /// Missing/evicted entry: awaits the (possibly shared) load.
    pub async fn read<T, F, Fut>(
        self: &Arc<Self>,
        key: QueryKey,
        policy: FreshnessPolicy,
        loader: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        enum Plan {
            Hit(Value),
            Join(SharedLoad),
        }

        let now = Utc::now();
        let plan = {
            let mut inner = self.lock();
            let usable = inner
                .entries
                .get(&key)
                .filter(|e| !e.is_evicted(now))
                .cloned();

            match usable {
                Some(entry) if !entry.is_stale(now) => Plan::Hit(entry.data),
                Some(entry) => {
                    // Stale-while-revalidate: serve what we have, refresh
                    // behind it unless a load is already running.
                    if !inner.inflight.contains_key(&key) {
                        self.spawn_load(&mut inner, key, policy, Self::boxed(loader()));
                    }
                    Plan::Hit(entry.data)
                }
                None => match inner.inflight.get(&key) {
                    Some(inflight) => Plan::Join(inflight.shared.clone()),
                    None => {
                        let shared =
                            self.spawn_load(&mut inner, key, policy, Self::boxed(loader()));
                        Plan::Join(shared)
                    }
                },
            }
        };

        match plan {
            Plan::Hit(value) => Ok(serde_json::from_value(value)?),
            Plan::Join(shared) => match shared.await {
                Ok(value) => Ok(serde_json::from_value(value)?),
                Err(e) => Err(ClientError::Upstream(e)),
            },
        }
    }

    fn boxed<T, Fut>(fut: Fut) -> BoxFuture<'static, Result<Value>>
    where
        T: Serialize,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        }
        .boxed()
    }

    /// Register an in-flight load for `key` and spawn the detached task
    /// that applies its result.  Caller holds the lock.
    fn spawn_load(
        self: &Arc<Self>,
        inner: &mut Inner,
        key: QueryKey,
        policy: FreshnessPolicy,
        fut: BoxFuture<'static, Result<Value>>,
    ) -> SharedLoad {
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let generation = inner.generation;

        let shared: SharedLoad = fut.map(|r| r.map_err(Arc::new)).boxed().shared();
        inner.inflight.insert(
            key.clone(),
            Inflight {
                seq,
                shared: shared.clone(),
            },
        );
        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.status = EntryStatus::Fetching;
        }

        let cache = Arc::clone(self);
        let task_shared = shared.clone();
        tokio::spawn(async move {
            let result = task_shared.await;
            cache.apply_fetch(&key, seq, generation, policy, result);
        });

        shared
    }

    /// Install a completed fetch, unless a newer fetch or write already
    /// superseded it, or the whole cache was cleared while it ran.
    fn apply_fetch(
        self: &Arc<Self>,
        key: &QueryKey,
        seq: u64,
        generation: u64,
        policy: FreshnessPolicy,
        result: LoadResult,
    ) {
        let flush = {
            let mut inner = self.lock();
            if inner.generation != generation {
                debug!(key = %key, "discarding load that outlived a cache clear");
                return;
            }
            if inner.inflight.get(key).is_some_and(|i| i.seq == seq) {
                inner.inflight.remove(key);
            }

            match result {
                Ok(value) => {
                    let now = Utc::now();
                    match inner.entries.get_mut(key) {
                        Some(entry) if entry.seq > seq => {
                            debug!(key = %key, "discarding superseded fetch result");
                            false
                        }
                        Some(entry) => {
                            entry.data = value;
                            entry.fetched_at = now;
                            entry.stale_after_ms = policy.stale_after.as_millis() as u64;
                            entry.evict_after_ms = policy.evict_after.as_millis() as u64;
                            entry.invalidated = false;
                            entry.seq = seq;
                            entry.status = EntryStatus::Idle;
                            true
                        }
                        None => {
                            inner
                                .entries
                                .insert(key.clone(), CacheEntry::fresh(value, seq, policy, now));
                            true
                        }
                    }
                }
                Err(e) => {
                    if let Some(entry) = inner.entries.get_mut(key) {
                        entry.status = EntryStatus::Error;
                    }
                    warn!(key = %key, error = %e, "query load failed");
                    false
                }
            }
        };

        if flush {
            self.schedule_flush();
        }
    }

    /// Direct cache population, bypassing the loader (used by optimistic
    /// mutations).  Existing entries keep their freshness windows.
    pub fn write(self: &Arc<Self>, key: QueryKey, value: Value) {
        self.write_with(key, value, FreshnessPolicy::event_list());
    }

    /// Like [`QueryCache::write`], with explicit windows for new entries.
    pub fn write_with(self: &Arc<Self>, key: QueryKey, value: Value, policy: FreshnessPolicy) {
        {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let now = Utc::now();
            match inner.entries.get_mut(&key) {
                Some(entry) => {
                    entry.data = value;
                    entry.fetched_at = now;
                    entry.invalidated = false;
                    entry.seq = seq;
                    entry.status = EntryStatus::Idle;
                }
                None => {
                    inner
                        .entries
                        .insert(key, CacheEntry::fresh(value, seq, policy, now));
                }
            }
        }
        self.schedule_flush();
    }

    /// Mark every entry under `prefix` stale; the next read serves the
    /// current data and triggers a reload.
    pub fn invalidate(self: &Arc<Self>, prefix: &QueryKey) {
        {
            let mut inner = self.lock();
            for (key, entry) in inner.entries.iter_mut() {
                if key.starts_with(prefix) {
                    entry.invalidated = true;
                }
            }
        }
        self.schedule_flush();
    }

    /// Patch the data of every entry under `prefix` in place, sequence-
    /// stamped so an older in-flight fetch cannot clobber the patch.
    /// Freshness is unchanged: a patched entry goes stale on its original
    /// schedule.
    pub fn update(self: &Arc<Self>, prefix: &QueryKey, mut f: impl FnMut(&QueryKey, &mut Value)) {
        {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            for (key, entry) in inner.entries.iter_mut() {
                if key.starts_with(prefix) {
                    f(key, &mut entry.data);
                    entry.seq = seq;
                }
            }
        }
        self.schedule_flush();
    }

    /// Clone the raw data of every entry under `prefix` (mutation
    /// snapshots).  `None` only if the cache state is unreadable.
    pub fn snapshot_prefix(&self, prefix: &QueryKey) -> Option<Vec<(QueryKey, Value)>> {
        let inner = self.inner.lock().ok()?;
        Some(
            inner
                .entries
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, e)| (k.clone(), e.data.clone()))
                .collect(),
        )
    }

    /// Write snapshotted data back verbatim (mutation rollback).
    pub fn restore(self: &Arc<Self>, snapshot: Vec<(QueryKey, Value)>) {
        {
            let mut inner = self.lock();
            for (key, data) in snapshot {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                if let Some(entry) = inner.entries.get_mut(&key) {
                    entry.data = data;
                    entry.seq = seq;
                }
            }
        }
        self.schedule_flush();
    }

    /// Append a page of items to the list cached under `key`,
    /// de-duplicating by `id_of` and preserving order.  Returns the
    /// combined list.
    pub fn append_page(
        self: &Arc<Self>,
        key: QueryKey,
        policy: FreshnessPolicy,
        new_items: Vec<Value>,
        id_of: impl Fn(&Value) -> Option<Value>,
    ) -> Vec<Value> {
        let items = {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let now = Utc::now();

            let mut items = inner
                .entries
                .get(&key)
                .filter(|e| !e.is_evicted(now))
                .and_then(|e| e.data.as_array().cloned())
                .unwrap_or_default();

            let mut seen: HashSet<String> = items
                .iter()
                .filter_map(|v| id_of(v).map(|id| id.to_string()))
                .collect();

            for item in new_items {
                match id_of(&item) {
                    Some(id) if !seen.insert(id.to_string()) => continue,
                    _ => items.push(item),
                }
            }

            inner.entries.insert(
                key,
                CacheEntry::fresh(Value::Array(items.clone()), seq, policy, now),
            );
            items
        };

        self.schedule_flush();
        items
    }

    /// Length of the array cached under `key`, if any.
    pub fn peek_len(&self, key: &QueryKey) -> Option<usize> {
        let now = Utc::now();
        let inner = self.inner.lock().ok()?;
        inner
            .entries
            .get(key)
            .filter(|e| !e.is_evicted(now))
            .and_then(|e| e.data.as_array().map(Vec::len))
    }

    /// Drop every entry and in-flight load (sign-out).  The next flush
    /// persists the empty state.
    pub fn clear(self: &Arc<Self>) {
        {
            let mut inner = self.lock();
            inner.entries.clear();
            inner.inflight.clear();
            inner.generation += 1;
        }
        self.schedule_flush();
    }

    // -- Persistence -------------------------------------------------------

    /// Schedule a persisted write-back, at most one per throttle interval.
    fn schedule_flush(self: &Arc<Self>) {
        let delay = {
            let mut inner = self.lock();
            if inner.flush_pending {
                return;
            }
            inner.flush_pending = true;
            match inner.last_flush {
                Some(t) => QUERY_CACHE_FLUSH_THROTTLE.saturating_sub(t.elapsed()),
                None => Duration::ZERO,
            }
        };

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            cache.flush_now();
        });
    }

    /// Write the current entries to the persisted store, dropping evicted
    /// ones.  Overlapping flushes are harmless: last write wins.
    pub(crate) fn flush_now(&self) {
        let now = Utc::now();
        let snapshot: Vec<(QueryKey, CacheEntry)> = {
            let mut inner = self.lock();
            inner.flush_pending = false;
            inner.last_flush = Some(tokio::time::Instant::now());
            inner
                .entries
                .iter()
                .filter(|(_, e)| !e.is_evicted(now))
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect()
        };

        self.store.set_json(&Self::snapshot_key(), &snapshot);
    }
}
