//! Domain model structs mirrored from the events platform.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be cached
//! as JSON and handed directly to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, GroupId, ProfileId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user profile.  The `handle` is the unique human-readable slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub handle: String,
    /// Display name; may be absent, in which case the handle is shown.
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    pub about: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub status: Option<String>,
}

impl Profile {
    /// Name to render: nickname when set, handle otherwise.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => &self.handle,
        }
    }
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    pub about: Option<String>,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A community group that hosts events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub handle: String,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    /// Used for list ordering on group screens.
    #[serde(default)]
    pub memberships_count: i64,
    #[serde(default)]
    pub events_count: i64,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Event lifecycle status as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Open,
    Pending,
    Cancel,
    Closed,
    #[serde(untagged)]
    Unknown(String),
}

/// Visibility of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventDisplay {
    Public,
    Private,
    #[serde(untagged)]
    Unknown(String),
}

/// A participant's membership status on an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Applied,
    Attending,
    Checked,
    Cancelled,
}

impl ParticipantStatus {
    /// Whether this status counts as "going" for join-status derivation.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Applied | Self::Attending | Self::Checked)
    }
}

/// A role assignment on an event (host, co-host, speaker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    Host,
    CoHost,
    Speaker,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub role: EventRole,
    /// Profile holding the role; the server may also record just a name.
    pub profile_id: Option<ProfileId>,
    pub nickname: Option<String>,
}

/// A ticket type attached to an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    /// Price in the smallest currency unit; `None` means free.
    pub price: Option<i64>,
    pub quantity: Option<i64>,
}

/// A participant entry on an event's detail view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub profile: Profile,
    pub status: ParticipantStatus,
}

/// An event as mirrored from the server.
///
/// Identity and all fields are server-owned; the client never invents an
/// `EventId`.  Start/end timestamps are stored in UTC and corrected for
/// display via [`crate::time::display_time`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    /// Presence of a meeting URL implies an online event.
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub participants_count: i64,
    pub max_participant: Option<i64>,
    pub min_participant: Option<i64>,
    pub status: EventStatus,
    pub display: EventDisplay,
    /// Ordered tag list; tags prefixed with `:` are internal markers and
    /// are excluded from [`Event::display_tags`].
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner: Profile,
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Event {
    /// Whether the event takes place online.
    pub fn is_online(&self) -> bool {
        self.meeting_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Tags meant for display (non-`:`-prefixed, original order).
    pub fn display_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|t| !t.starts_with(':'))
    }
}

// ---------------------------------------------------------------------------
// EventWithJoinStatus
// ---------------------------------------------------------------------------

/// An [`Event`] annotated with per-viewer derived flags.
///
/// The flags are view-local: the same event shown to two different viewers
/// produces two distinct values, and none of the flags is ever persisted
/// back onto the event entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventWithJoinStatus {
    #[serde(flatten)]
    pub event: Event,
    pub is_owner: bool,
    pub is_attending: bool,
    pub is_starred: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, ProfileId};
    use chrono::TimeZone;

    fn profile(id: i64, handle: &str) -> Profile {
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

    pub(crate) fn event(id: i64) -> Event {
        Event {
            id: EventId(id),
            title: format!("Event {id}"),
            start_time: Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            location: Some("Community Hall".to_string()),
            meeting_url: None,
            participants_count: 0,
            max_participant: None,
            min_participant: None,
            status: EventStatus::Open,
            display: EventDisplay::Public,
            tags: Vec::new(),
            owner: profile(1, "owner"),
            group_id: None,
            roles: Vec::new(),
            tickets: Vec::new(),
            participants: Vec::new(),
        }
    }

    #[test]
    fn display_name_falls_back_to_handle() {
        let mut p = profile(7, "alice");
        assert_eq!(p.display_name(), "alice");
        p.nickname = Some("Alice".to_string());
        assert_eq!(p.display_name(), "Alice");
        p.nickname = Some(String::new());
        assert_eq!(p.display_name(), "alice");
    }

    #[test]
    fn display_tags_skips_marker_tags() {
        let mut e = event(1);
        e.tags = vec![
            ":featured".to_string(),
            "music".to_string(),
            "outdoors".to_string(),
        ];
        let tags: Vec<&str> = e.display_tags().collect();
        assert_eq!(tags, vec!["music", "outdoors"]);
    }

    #[test]
    fn online_requires_nonempty_meeting_url() {
        let mut e = event(1);
        assert!(!e.is_online());
        e.meeting_url = Some(String::new());
        assert!(!e.is_online());
        e.meeting_url = Some("https://meet.example/abc".to_string());
        assert!(e.is_online());
    }

    #[test]
    fn unknown_status_round_trips() {
        let status: EventStatus = serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(status, EventStatus::Unknown("draft".to_string()));
        let open: EventStatus = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(open, EventStatus::Open);
    }
}
