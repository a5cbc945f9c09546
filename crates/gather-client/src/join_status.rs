//! Per-viewer join-status derivation.
//!
//! `is_owner` / `is_attending` / `is_starred` are computed at view time
//! from the event plus the viewer's cached sets, never stored on the
//! event entity itself.

use std::collections::BTreeSet;

use gather_shared::models::{Event, EventWithJoinStatus};
use gather_shared::types::{EventId, ProfileId};

/// Annotate an event with the viewer's derived flags.
///
/// `is_attending` is true when the attending set contains the event *or*
/// the event's participant list carries the viewer with an active status;
/// the participant list is fresher right after a detail fetch, the set is
/// fresher right after an optimistic mutation.
pub fn annotate(
    event: Event,
    viewer: Option<ProfileId>,
    starred: &BTreeSet<EventId>,
    attending: &BTreeSet<EventId>,
) -> EventWithJoinStatus {
    let is_owner = viewer.is_some_and(|v| v == event.owner.id);
    let is_attending = attending.contains(&event.id)
        || viewer.is_some_and(|v| {
            event
                .participants
                .iter()
                .any(|p| p.profile.id == v && p.status.is_active())
        });
    let is_starred = starred.contains(&event.id);

    EventWithJoinStatus {
        event,
        is_owner,
        is_attending,
        is_starred,
    }
}
