//! Test doubles shared by the crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use gather_api::{ApiError, EventsApi};
use gather_shared::models::{
    Event, EventDisplay, EventStatus, Group, Profile, ProfileUpdate,
};
use gather_shared::types::{EventId, GroupId, ProfileId};
use gather_shared::Credential;

pub(crate) fn sample_profile(id: i64, handle: &str) -> Profile {
    Profile {
        id: ProfileId(id),
        handle: handle.to_string(),
        nickname: None,
        image_url: None,
        about: None,
        verified: false,
        status: None,
    }
}

pub(crate) fn sample_event(id: i64) -> Event {
    Event {
        id: EventId(id),
        title: format!("Event {id}"),
        start_time: Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap(),
        location: Some("Community Hall".to_string()),
        meeting_url: None,
        participants_count: 5,
        max_participant: None,
        min_participant: None,
        status: EventStatus::Open,
        display: EventDisplay::Public,
        tags: Vec::new(),
        owner: sample_profile(1, "owner"),
        group_id: Some(GroupId(3579)),
        roles: Vec::new(),
        tickets: Vec::new(),
        participants: Vec::new(),
    }
}

pub(crate) fn sample_group(id: i64, handle: &str) -> Group {
    Group {
        id: GroupId(id),
        handle: handle.to_string(),
        nickname: None,
        image_url: None,
        memberships_count: 10,
        events_count: 3,
    }
}

fn poisonless<'a, T>(m: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    match m.lock() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    }
}

/// A programmable in-memory gateway.
///
/// Mutations append their name to `calls` (in execution order), can be
/// made to fail wholesale, and can be slowed down to widen race windows
/// under paused tokio time.
pub(crate) struct StubApi {
    pub profile: Mutex<Option<Profile>>,
    pub group_events: Mutex<Vec<Event>>,
    pub events: Mutex<HashMap<EventId, Event>>,
    pub starred: Mutex<Vec<EventId>>,
    pub attending: Mutex<Vec<EventId>>,
    pub groups: Mutex<Vec<Group>>,
    pub fail_mutations: AtomicBool,
    pub auth_expired: AtomicBool,
    pub mutation_delay: Mutex<Option<Duration>>,
    pub read_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for StubApi {
    fn default() -> Self {
        Self {
            profile: Mutex::new(Some(sample_profile(42, "viewer"))),
            group_events: Mutex::new(Vec::new()),
            events: Mutex::new(HashMap::new()),
            starred: Mutex::new(Vec::new()),
            attending: Mutex::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
            fail_mutations: AtomicBool::new(false),
            auth_expired: AtomicBool::new(false),
            mutation_delay: Mutex::new(None),
            read_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubApi {
    pub fn calls(&self) -> Vec<String> {
        poisonless(&self.calls).clone()
    }

    async fn slow_read(&self) {
        let delay = *poisonless(&self.read_delay);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
    }

    async fn mutate(&self, name: &str) -> gather_api::Result<()> {
        let delay = *poisonless(&self.mutation_delay);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        poisonless(&self.calls).push(name.to_string());
        if self.auth_expired.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 401,
                body: "token expired".to_string(),
            });
        }
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

impl EventsApi for StubApi {
    async fn profile_by_token(&self, _cred: &Credential) -> Option<Profile> {
        poisonless(&self.profile).clone()
    }

    async fn profile_by_handle(&self, handle: &str) -> Option<Profile> {
        poisonless(&self.profile)
            .clone()
            .filter(|p| p.handle == handle)
    }

    async fn events_for_group(
        &self,
        _group: GroupId,
        _upcoming_only: bool,
        offset: usize,
        limit: usize,
    ) -> gather_api::Result<Vec<Event>> {
        poisonless(&self.calls).push("events_for_group".to_string());
        let events = poisonless(&self.group_events);
        Ok(events.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn event_by_id(&self, id: EventId) -> gather_api::Result<Option<Event>> {
        self.slow_read().await;
        poisonless(&self.calls).push("event_by_id".to_string());
        Ok(poisonless(&self.events).get(&id).cloned())
    }

    async fn attending_event_ids(
        &self,
        _profile: ProfileId,
        _cred: &Credential,
    ) -> gather_api::Result<Vec<EventId>> {
        Ok(poisonless(&self.attending).clone())
    }

    async fn starred_event_ids(&self, _cred: &Credential) -> gather_api::Result<Vec<EventId>> {
        Ok(poisonless(&self.starred).clone())
    }

    async fn groups_for_user(
        &self,
        _profile: ProfileId,
        _cred: &Credential,
    ) -> gather_api::Result<Vec<Group>> {
        Ok(poisonless(&self.groups).clone())
    }

    async fn list_groups(&self) -> gather_api::Result<Vec<Group>> {
        Ok(poisonless(&self.groups).clone())
    }

    async fn star(&self, _id: EventId, _cred: &Credential) -> gather_api::Result<()> {
        self.mutate("star").await
    }

    async fn unstar(&self, _id: EventId, _cred: &Credential) -> gather_api::Result<()> {
        self.mutate("unstar").await
    }

    async fn attend(&self, _id: EventId, _cred: &Credential) -> gather_api::Result<()> {
        self.mutate("attend").await
    }

    async fn cancel_attendance(&self, _id: EventId, _cred: &Credential) -> gather_api::Result<()> {
        self.mutate("cancel").await
    }

    async fn send_pin(&self, _email: &str) -> gather_api::Result<()> {
        poisonless(&self.calls).push("send_pin".to_string());
        Ok(())
    }

    async fn verify_pin(&self, _email: &str, pin: &str) -> gather_api::Result<String> {
        poisonless(&self.calls).push("verify_pin".to_string());
        if pin == "000000" {
            return Err(ApiError::Status {
                status: 401,
                body: "wrong pin".to_string(),
            });
        }
        Ok("tok_test".to_string())
    }

    async fn update_profile(
        &self,
        _cred: &Credential,
        update: ProfileUpdate,
    ) -> gather_api::Result<Profile> {
        let mut profile = poisonless(&self.profile);
        let current = profile.clone().ok_or(ApiError::Status {
            status: 401,
            body: "no profile".to_string(),
        })?;
        let updated = Profile {
            nickname: update.nickname.or(current.nickname),
            image_url: update.image_url.or(current.image_url),
            about: update.about.or(current.about),
            ..current
        };
        *profile = Some(updated.clone());
        Ok(updated)
    }

    async fn upload_image(
        &self,
        _cred: &Credential,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> gather_api::Result<String> {
        Ok(format!("https://cdn.test/{file_name}"))
    }
}
