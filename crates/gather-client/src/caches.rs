//! Domain caches: thin typed wrappers over the persisted store.
//!
//! Set membership here is the *local* belief about server state; it can
//! diverge from the server until the next authoritative refetch (see
//! `SyncService::my_event_ids`).  All updates are read-modify-write over
//! the store and accept its lack of cross-key atomicity.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gather_shared::constants::{
    EVENT_DETAIL_MAX_AGE, KEY_PREFIX_ATTENDING, KEY_PREFIX_EVENT_DETAIL, KEY_PREFIX_STARRED,
};
use gather_shared::models::Event;
use gather_shared::types::{EventId, ProfileId};

use crate::persist::PersistedStore;

// ---------------------------------------------------------------------------
// Per-user event id sets (starred / attending)
// ---------------------------------------------------------------------------

/// A per-user set of event ids stored as a JSON array.
pub struct IdSetCache {
    store: Arc<PersistedStore>,
    prefix: &'static str,
}

impl IdSetCache {
    pub fn starred(store: Arc<PersistedStore>) -> Self {
        Self {
            store,
            prefix: KEY_PREFIX_STARRED,
        }
    }

    pub fn attending(store: Arc<PersistedStore>) -> Self {
        Self {
            store,
            prefix: KEY_PREFIX_ATTENDING,
        }
    }

    fn key(&self, user: ProfileId) -> String {
        format!("{}{}", self.prefix, user)
    }

    /// The set for `user`; empty when nothing is stored.
    pub fn get(&self, user: ProfileId) -> BTreeSet<EventId> {
        self.store.get_json(&self.key(user)).unwrap_or_default()
    }

    /// Raw stored value, distinguishing "absent" from "empty" so mutation
    /// snapshots can restore verbatim.
    pub fn get_raw(&self, user: ProfileId) -> Option<BTreeSet<EventId>> {
        self.store.get_json(&self.key(user))
    }

    /// Replace the whole set (authoritative refetch).
    pub fn set(&self, user: ProfileId, ids: &BTreeSet<EventId>) {
        self.store.set_json(&self.key(user), ids);
    }

    /// Restore a snapshot taken with [`IdSetCache::get_raw`].
    pub fn restore(&self, user: ProfileId, snapshot: Option<BTreeSet<EventId>>) {
        match snapshot {
            Some(ids) => self.set(user, &ids),
            None => self.store.remove(&self.key(user)),
        }
    }

    pub fn add(&self, user: ProfileId, id: EventId) {
        let mut ids = self.get(user);
        if ids.insert(id) {
            self.set(user, &ids);
        }
    }

    pub fn remove(&self, user: ProfileId, id: EventId) {
        let mut ids = self.get(user);
        if ids.remove(&id) {
            self.set(user, &ids);
        }
    }

    pub fn contains(&self, user: ProfileId, id: EventId) -> bool {
        self.get(user).contains(&id)
    }

    pub fn clear(&self, user: ProfileId) {
        self.store.remove(&self.key(user));
    }
}

// ---------------------------------------------------------------------------
// Event detail snapshots
// ---------------------------------------------------------------------------

/// The persisted shape of one detail snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEventDetail {
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

/// Per-event detail snapshots with a hard freshness ceiling: an entry
/// older than one hour is treated as absent even though it is still
/// physically stored.
pub struct EventDetailCache {
    store: Arc<PersistedStore>,
}

impl EventDetailCache {
    pub fn new(store: Arc<PersistedStore>) -> Self {
        Self { store }
    }

    fn key(id: EventId) -> String {
        format!("{KEY_PREFIX_EVENT_DETAIL}{id}")
    }

    /// The cached event, or `None` when absent or older than the max age.
    pub fn get(&self, id: EventId) -> Option<Event> {
        let stored: StoredEventDetail = self.store.get_json(&Self::key(id))?;
        let age = Utc::now() - stored.timestamp;
        if age.to_std().ok()? > EVENT_DETAIL_MAX_AGE {
            return None;
        }
        Some(stored.event)
    }

    /// Raw stored value regardless of age, for mutation snapshots.
    pub fn get_raw(&self, id: EventId) -> Option<StoredEventDetail> {
        self.store.get_json(&Self::key(id))
    }

    /// Store a fresh snapshot, stamped now.
    pub fn set(&self, event: &Event) {
        let stored = StoredEventDetail {
            event: event.clone(),
            timestamp: Utc::now(),
        };
        self.store.set_json(&Self::key(event.id), &stored);
    }

    /// Restore a snapshot taken with [`EventDetailCache::get_raw`],
    /// keeping its original timestamp.
    pub fn restore(&self, id: EventId, snapshot: Option<StoredEventDetail>) {
        match snapshot {
            Some(stored) => self.store.set_json(&Self::key(id), &stored),
            None => self.store.remove(&Self::key(id)),
        }
    }

    pub fn remove(&self, id: EventId) {
        self.store.remove(&Self::key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> Arc<PersistedStore> {
        Arc::new(PersistedStore::in_memory())
    }

    fn sample_event(id: i64) -> Event {
        use gather_shared::models::*;
        use gather_shared::types::GroupId;

        Event {
            id: EventId(id),
            title: "Sample".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            location: None,
            meeting_url: None,
            participants_count: 5,
            max_participant: None,
            min_participant: None,
            status: EventStatus::Open,
            display: EventDisplay::Public,
            tags: Vec::new(),
            owner: Profile {
                id: ProfileId(1),
                handle: "owner".to_string(),
                nickname: None,
                image_url: None,
                about: None,
                verified: false,
                status: None,
            },
            group_id: Some(GroupId(3579)),
            roles: Vec::new(),
            tickets: Vec::new(),
            participants: Vec::new(),
        }
    }

    #[test]
    fn id_set_add_remove_round_trip() {
        let cache = IdSetCache::starred(store());
        let user = ProfileId(9);

        assert!(!cache.contains(user, EventId(42)));
        cache.add(user, EventId(42));
        cache.add(user, EventId(7));
        assert!(cache.contains(user, EventId(42)));

        cache.remove(user, EventId(42));
        assert!(!cache.contains(user, EventId(42)));
        assert!(cache.contains(user, EventId(7)));
    }

    #[test]
    fn id_sets_are_per_user_and_per_kind() {
        let store = store();
        let starred = IdSetCache::starred(Arc::clone(&store));
        let attending = IdSetCache::attending(store);

        starred.add(ProfileId(1), EventId(5));
        assert!(!starred.contains(ProfileId(2), EventId(5)));
        assert!(!attending.contains(ProfileId(1), EventId(5)));
    }

    #[test]
    fn restore_distinguishes_absent_from_empty() {
        let cache = IdSetCache::attending(store());
        let user = ProfileId(3);

        assert!(cache.get_raw(user).is_none());
        cache.add(user, EventId(1));

        let snapshot = cache.get_raw(user);
        cache.restore(user, None);
        assert!(cache.get_raw(user).is_none());

        cache.restore(user, snapshot);
        assert!(cache.contains(user, EventId(1)));
    }

    /// A detail snapshot written two hours ago is a miss even though
    /// the store still physically contains it.
    #[test]
    fn old_detail_snapshot_is_a_miss() {
        let store = store();
        let cache = EventDetailCache::new(Arc::clone(&store));
        let event = sample_event(42);

        let stale = StoredEventDetail {
            event: event.clone(),
            timestamp: Utc::now() - Duration::hours(2),
        };
        store.set_json(&EventDetailCache::key(EventId(42)), &stale);

        assert!(cache.get(EventId(42)).is_none());
        // Still physically present.
        assert!(cache.get_raw(EventId(42)).is_some());

        cache.set(&event);
        assert_eq!(cache.get(EventId(42)).unwrap().id, EventId(42));
    }
}
