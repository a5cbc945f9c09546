//! The [`EventsApi`] trait: the seam between the sync layer and the wire.
//!
//! The client crate is generic over this trait so tests can substitute a
//! programmable fake for the real [`crate::ApiClient`].

use std::future::Future;

use gather_shared::models::{Event, Group, Profile, ProfileUpdate};
use gather_shared::types::{EventId, GroupId, ProfileId};
use gather_shared::Credential;

use crate::Result;

/// Typed access to the events platform.
///
/// Contract summary:
/// - Profile lookups return `None` on *any* failure (4xx, network); callers
///   must treat `None` as "not authenticated / not found", never as an
///   error to display.
/// - List reads return ascending start time; a page of exactly `limit`
///   items means another page likely exists.
/// - Mutations resolve with no payload on success and fail with a
///   descriptive [`crate::ApiError`] otherwise.
/// - A [`Credential::Demo`] short-circuits every mutation into a simulated
///   success and every authenticated read into placeholder data, before
///   any network call.
pub trait EventsApi: Send + Sync + 'static {
    /// Look up the profile owning `cred`.  `None` on any failure.
    fn profile_by_token(&self, cred: &Credential)
        -> impl Future<Output = Option<Profile>> + Send;

    /// Look up a public profile by handle.  `None` on any failure.
    fn profile_by_handle(&self, handle: &str) -> impl Future<Output = Option<Profile>> + Send;

    /// Events of a group, ascending by start time, with offset/limit
    /// pagination.  `upcoming_only` restricts to events starting now or
    /// later.
    fn events_for_group(
        &self,
        group: GroupId,
        upcoming_only: bool,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Event>>> + Send;

    /// Extended event detail (participants, tickets, roles); `None` when
    /// the id does not exist.
    fn event_by_id(&self, id: EventId) -> impl Future<Output = Result<Option<Event>>> + Send;

    /// Ids of events the profile is going to (applied / attending /
    /// checked).  Viewer-scoped: the credential rides as a bearer header
    /// on the graph query.
    fn attending_event_ids(
        &self,
        profile: ProfileId,
        cred: &Credential,
    ) -> impl Future<Output = Result<Vec<EventId>>> + Send;

    /// Ids of events the credential's owner has starred.
    fn starred_event_ids(
        &self,
        cred: &Credential,
    ) -> impl Future<Output = Result<Vec<EventId>>> + Send;

    /// Groups the profile belongs to.  Viewer-scoped like
    /// [`EventsApi::attending_event_ids`].
    fn groups_for_user(
        &self,
        profile: ProfileId,
        cred: &Credential,
    ) -> impl Future<Output = Result<Vec<Group>>> + Send;

    /// All public groups, ordered for display.
    fn list_groups(&self) -> impl Future<Output = Result<Vec<Group>>> + Send;

    // -- Mutations ---------------------------------------------------------

    fn star(&self, id: EventId, cred: &Credential) -> impl Future<Output = Result<()>> + Send;

    fn unstar(&self, id: EventId, cred: &Credential) -> impl Future<Output = Result<()>> + Send;

    fn attend(&self, id: EventId, cred: &Credential) -> impl Future<Output = Result<()>> + Send;

    fn cancel_attendance(
        &self,
        id: EventId,
        cred: &Credential,
    ) -> impl Future<Output = Result<()>> + Send;

    // -- Auth and profile management --------------------------------------

    /// Request an email sign-in PIN.
    fn send_pin(&self, email: &str) -> impl Future<Output = Result<()>> + Send;

    /// Exchange an email + PIN for an auth token.  Fails descriptively
    /// when the code is wrong or expired.
    fn verify_pin(&self, email: &str, pin: &str) -> impl Future<Output = Result<String>> + Send;

    /// Update the credential owner's profile; returns the updated profile.
    fn update_profile(
        &self,
        cred: &Credential,
        update: ProfileUpdate,
    ) -> impl Future<Output = Result<Profile>> + Send;

    /// Upload an image; returns the hosted URL.
    fn upload_image(
        &self,
        cred: &Credential,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String>> + Send;
}
