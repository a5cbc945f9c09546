//! The high-level sync facade the UI talks to.
//!
//! [`SyncService`] ties the gateway, the cache context and the session
//! together: reads go through the query cache or a domain cache,
//! mutations go through the optimistic coordinator, and every returned
//! event is annotated with the viewer's join status.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex};

use tracing::{info, warn};

use gather_api::EventsApi;
use gather_shared::constants::DEFAULT_PAGE_SIZE;
use gather_shared::models::{Event, EventWithJoinStatus, Group, Profile, ProfileUpdate};
use gather_shared::types::{EventId, GroupId, ProfileId};
use gather_shared::Credential;

use crate::context::CacheContext;
use crate::error::{ClientError, Result};
use crate::join_status::annotate;
use crate::mutations::MutationCoordinator;
use crate::query_cache::{FreshnessPolicy, QueryKey};
use crate::session::SessionStore;

// Query-key layout.  Mutations patch and invalidate by these prefixes,
// so they live next to the reads that populate them.

pub(crate) fn group_events_prefix() -> QueryKey {
    QueryKey::new("group-events")
}

pub(crate) fn group_events_key(group: GroupId, upcoming_only: bool) -> QueryKey {
    group_events_prefix().part(group).part(upcoming_only)
}

fn event_detail_key(id: EventId) -> QueryKey {
    QueryKey::new("event-detail").part(id)
}

fn profile_handle_key(handle: &str) -> QueryKey {
    QueryKey::new("profile-handle").part(handle)
}

fn my_groups_key(profile: ProfileId) -> QueryKey {
    QueryKey::new("my-groups").part(profile)
}

fn groups_key() -> QueryKey {
    QueryKey::new("groups")
}

/// One page of annotated events.  `has_more` is a heuristic: a combined
/// list whose length is a whole number of pages probably has a next page.
#[derive(Debug)]
pub struct EventPage {
    pub events: Vec<EventWithJoinStatus>,
    pub has_more: bool,
}

/// The viewer's starred and attending sets, freshly fetched.
#[derive(Debug)]
pub struct MyEvents {
    pub starred: BTreeSet<EventId>,
    pub attending: BTreeSet<EventId>,
}

#[derive(Clone)]
struct ActiveSession {
    credential: Credential,
    profile: Profile,
}

pub struct SyncService<A: EventsApi> {
    api: Arc<A>,
    ctx: Arc<CacheContext>,
    session: SessionStore,
    mutations: MutationCoordinator<A>,
    active: StdMutex<Option<ActiveSession>>,
}

impl<A: EventsApi> SyncService<A> {
    pub fn new(api: Arc<A>, ctx: Arc<CacheContext>) -> Self {
        Self {
            session: SessionStore::new(Arc::clone(&ctx.store)),
            mutations: MutationCoordinator::new(Arc::clone(&api), Arc::clone(&ctx)),
            api,
            ctx,
            active: StdMutex::new(None),
        }
    }

    // -- Session -----------------------------------------------------------

    /// Resume the persisted session, if any.  Returns `None` when no
    /// credential is stored or the profile lookup fails; the credential
    /// stays persisted in the latter case so a later attempt can succeed.
    pub async fn restore_session(&self) -> Option<Profile> {
        let cred = self.session.credential()?;
        match self.api.profile_by_token(&cred).await {
            Some(profile) => {
                self.set_active(cred, profile.clone());
                info!(profile = %profile.id, "session restored");
                Some(profile)
            }
            None => {
                warn!("stored credential did not resolve to a profile");
                None
            }
        }
    }

    /// Request an email sign-in PIN.
    pub async fn request_pin(&self, email: &str) -> Result<()> {
        self.api
            .send_pin(email)
            .await
            .map_err(|e| ClientError::from(e).classify())
    }

    /// Exchange email + PIN for a session.
    pub async fn sign_in_with_pin(&self, email: &str, pin: &str) -> Result<Profile> {
        let token = self
            .api
            .verify_pin(email, pin)
            .await
            .map_err(|e| ClientError::from(e).classify())?;
        self.sign_in_with_token(&token).await
    }

    /// Start a session from a raw token (PIN exchange, OAuth callback or
    /// a demo token).  The real/demo classification happens here, once.
    pub async fn sign_in_with_token(&self, token: &str) -> Result<Profile> {
        let cred = Credential::from_token(token);
        let demo = cred.is_demo();
        let profile = self
            .api
            .profile_by_token(&cred)
            .await
            .ok_or(ClientError::Auth)?;

        self.session.set_credential(&cred);
        self.set_active(cred, profile.clone());
        info!(profile = %profile.id, demo, "signed in");
        Ok(profile)
    }

    /// End the session and erase everything it cached.
    pub fn sign_out(&self) {
        *self.lock_active() = None;
        self.ctx.queries.clear();
        self.session.clear();
    }

    pub fn is_signed_in(&self) -> bool {
        self.lock_active().is_some()
    }

    /// The signed-in profile id, if any.
    pub fn viewer(&self) -> Option<ProfileId> {
        self.lock_active().as_ref().map(|a| a.profile.id)
    }

    /// The signed-in profile; refreshed from the gateway when reachable,
    /// otherwise the last known copy.
    pub async fn my_profile(&self) -> Result<Profile> {
        let active = self.active()?;
        match self.api.profile_by_token(&active.credential).await {
            Some(profile) => {
                self.set_active(active.credential, profile.clone());
                Ok(profile)
            }
            None => Ok(active.profile),
        }
    }

    pub async fn update_my_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let active = self.active()?;
        let profile = self
            .api
            .update_profile(&active.credential, update)
            .await
            .map_err(|e| ClientError::from(e).classify())?;
        self.set_active(active.credential, profile.clone());
        Ok(profile)
    }

    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let active = self.active()?;
        self.api
            .upload_image(&active.credential, file_name, bytes)
            .await
            .map_err(|e| ClientError::from(e).classify())
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        match self.active.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        }
    }

    fn set_active(&self, credential: Credential, profile: Profile) {
        *self.lock_active() = Some(ActiveSession {
            credential,
            profile,
        });
    }

    fn active(&self) -> Result<ActiveSession> {
        self.lock_active().clone().ok_or(ClientError::Auth)
    }

    // -- Reads -------------------------------------------------------------

    /// First page of a group's events, cache-first.
    pub async fn events_for_group(
        &self,
        group: GroupId,
        upcoming_only: bool,
    ) -> Result<EventPage> {
        let api = Arc::clone(&self.api);
        let events: Vec<Event> = self
            .ctx
            .queries
            .read(
                group_events_key(group, upcoming_only),
                FreshnessPolicy::event_list(),
                move || async move {
                    api.events_for_group(group, upcoming_only, 0, DEFAULT_PAGE_SIZE)
                        .await
                        .map_err(ClientError::from)
                },
            )
            .await
            .map_err(ClientError::classify)?;
        Ok(self.page(events))
    }

    /// Fetch the next page and merge it into the cached list,
    /// de-duplicating events that shifted between pages server-side.
    pub async fn load_more_events(
        &self,
        group: GroupId,
        upcoming_only: bool,
    ) -> Result<EventPage> {
        let key = group_events_key(group, upcoming_only);
        let offset = self.ctx.queries.peek_len(&key).unwrap_or(0);

        let page = self
            .api
            .events_for_group(group, upcoming_only, offset, DEFAULT_PAGE_SIZE)
            .await
            .map_err(|e| ClientError::from(e).classify())?;
        let fetched = page.len();

        let new_items = page
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let combined = self.ctx.queries.append_page(
            key,
            FreshnessPolicy::event_list(),
            new_items,
            |v| v.get("id").cloned(),
        );

        let events = combined
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Event>, _>>()?;
        Ok(EventPage {
            events: self.annotate_all(events),
            has_more: fetched == DEFAULT_PAGE_SIZE,
        })
    }

    /// Event detail, from the detail cache when younger than its max
    /// age.  Misses go through the query cache so concurrent reads of one
    /// id coalesce onto a single fetch; the result is mirrored back into
    /// the detail cache.
    pub async fn event_detail(&self, id: EventId) -> Result<Option<EventWithJoinStatus>> {
        if let Some(event) = self.ctx.event_details.get(id) {
            return Ok(Some(self.annotate_one(event)));
        }

        let api = Arc::clone(&self.api);
        let fetched: Option<Event> = self
            .ctx
            .queries
            .read(
                event_detail_key(id),
                FreshnessPolicy::event_detail(),
                move || async move { api.event_by_id(id).await.map_err(ClientError::from) },
            )
            .await
            .map_err(ClientError::classify)?;
        match fetched {
            Some(event) => {
                self.ctx.event_details.set(&event);
                Ok(Some(self.annotate_one(event)))
            }
            None => Ok(None),
        }
    }

    /// Public profile lookup, cached.  The gateway's null-on-failure
    /// contract means a missing profile and a failed lookup both cache as
    /// `None` until the entry goes stale.
    pub async fn profile_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        let api = Arc::clone(&self.api);
        let handle_owned = handle.to_string();
        self.ctx
            .queries
            .read(
                profile_handle_key(handle),
                FreshnessPolicy::profile(),
                move || async move { Ok(api.profile_by_handle(&handle_owned).await) },
            )
            .await
            .map_err(ClientError::classify)
    }

    /// Groups the signed-in profile belongs to, cached per profile.
    pub async fn my_groups(&self) -> Result<Vec<Group>> {
        let active = self.active()?;
        let api = Arc::clone(&self.api);
        let profile = active.profile.id;
        let cred = active.credential;
        self.ctx
            .queries
            .read(
                my_groups_key(profile),
                FreshnessPolicy::group_list(),
                move || async move {
                    api.groups_for_user(profile, &cred)
                        .await
                        .map_err(ClientError::from)
                },
            )
            .await
            .map_err(ClientError::classify)
    }

    /// All public groups, cached.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let api = Arc::clone(&self.api);
        self.ctx
            .queries
            .read(groups_key(), FreshnessPolicy::group_list(), move || {
                async move { api.list_groups().await.map_err(ClientError::from) }
            })
            .await
            .map_err(ClientError::classify)
    }

    /// Authoritative refetch of the viewer's starred and attending sets,
    /// mirrored into the domain caches so join-status derivation and
    /// optimistic mutations see them.
    pub async fn my_event_ids(&self) -> Result<MyEvents> {
        let active = self.active()?;
        let viewer = active.profile.id;

        let starred: BTreeSet<EventId> = self
            .api
            .starred_event_ids(&active.credential)
            .await
            .map_err(|e| ClientError::from(e).classify())?
            .into_iter()
            .collect();
        let attending: BTreeSet<EventId> = self
            .api
            .attending_event_ids(viewer, &active.credential)
            .await
            .map_err(|e| ClientError::from(e).classify())?
            .into_iter()
            .collect();

        self.ctx.starred.set(viewer, &starred);
        self.ctx.attending.set(viewer, &attending);
        Ok(MyEvents { starred, attending })
    }

    /// Pull-to-refresh: mark every list stale and refetch the viewer's
    /// sets.
    pub async fn refresh(&self) -> Result<()> {
        self.ctx.queries.invalidate(&group_events_prefix());
        self.ctx.queries.invalidate(&QueryKey::new("event-detail"));
        self.ctx.queries.invalidate(&groups_key());
        self.ctx.queries.invalidate(&QueryKey::new("my-groups"));
        self.ctx.queries.invalidate(&QueryKey::new("profile-handle"));
        if self.is_signed_in() {
            self.my_event_ids().await?;
        }
        Ok(())
    }

    // -- Mutations ---------------------------------------------------------

    pub async fn set_starred(&self, id: EventId, starred: bool) -> Result<()> {
        let active = self.active()?;
        self.mutations
            .set_starred(&active.credential, active.profile.id, id, starred)
            .await
    }

    pub async fn set_attending(&self, id: EventId, attending: bool) -> Result<()> {
        let active = self.active()?;
        self.mutations
            .set_attending(&active.credential, active.profile.id, id, attending)
            .await
    }

    // -- Annotation --------------------------------------------------------

    fn annotate_all(&self, events: Vec<Event>) -> Vec<EventWithJoinStatus> {
        let viewer = self.viewer();
        let (starred, attending) = self.viewer_sets(viewer);
        events
            .into_iter()
            .map(|e| annotate(e, viewer, &starred, &attending))
            .collect()
    }

    fn annotate_one(&self, event: Event) -> EventWithJoinStatus {
        let viewer = self.viewer();
        let (starred, attending) = self.viewer_sets(viewer);
        annotate(event, viewer, &starred, &attending)
    }

    fn viewer_sets(
        &self,
        viewer: Option<ProfileId>,
    ) -> (BTreeSet<EventId>, BTreeSet<EventId>) {
        match viewer {
            Some(v) => (self.ctx.starred.get(v), self.ctx.attending.get(v)),
            None => (BTreeSet::new(), BTreeSet::new()),
        }
    }

    fn page(&self, events: Vec<Event>) -> EventPage {
        let has_more = !events.is_empty() && events.len() % DEFAULT_PAGE_SIZE == 0;
        EventPage {
            events: self.annotate_all(events),
            has_more,
        }
    }
}
