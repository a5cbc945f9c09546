//! GraphQL transport: read queries against the platform's graph endpoint.
//!
//! Responses arrive as loosely-typed rows (string timestamps, string
//! enums) and are converted into the shared domain models here, so the
//! rest of the workspace only ever sees typed values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gather_shared::models::{
    Event, EventDisplay, EventRole, EventStatus, Group, Participant, ParticipantStatus, Profile,
    RoleAssignment, Ticket,
};
use gather_shared::time::parse_event_time;
use gather_shared::types::{EventId, GroupId, ProfileId};
use gather_shared::Credential;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::Result;

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const EVENTS_FOR_GROUP_QUERY: &str = r#"
query EventsForGroup($group_id: bigint!, $starts_after: timestamp!, $limit: Int!, $offset: Int!) {
  events(
    where: {group_id: {_eq: $group_id}, start_time: {_gte: $starts_after}, status: {_neq: "cancel"}}
    order_by: {start_time: asc}
    limit: $limit
    offset: $offset
  ) {
    id title start_time end_time location meeting_url
    participants_count max_participant min_participant
    status display tags group_id
    owner { id handle nickname image_url about verified status }
  }
}"#;

const EVENT_BY_ID_QUERY: &str = r#"
query EventById($id: bigint!) {
  events(where: {id: {_eq: $id}}, limit: 1) {
    id title start_time end_time location meeting_url
    participants_count max_participant min_participant
    status display tags group_id
    owner { id handle nickname image_url about verified status }
    event_roles { role profile_id nickname }
    tickets { id title price quantity }
    participants {
      status
      profile { id handle nickname image_url about verified status }
    }
  }
}"#;

const ATTENDING_IDS_QUERY: &str = r#"
query AttendingIds($profile_id: bigint!, $statuses: [String!]!) {
  participants(where: {profile_id: {_eq: $profile_id}, status: {_in: $statuses}}) {
    event_id
  }
}"#;

const GROUPS_FOR_USER_QUERY: &str = r#"
query GroupsForUser($profile_id: bigint!) {
  groups(
    where: {memberships: {profile_id: {_eq: $profile_id}}}
    order_by: {events_count: desc}
  ) {
    id handle nickname image_url memberships_count events_count
  }
}"#;

const LIST_GROUPS_QUERY: &str = r#"
query ListGroups {
  groups(order_by: {memberships_count: desc}) {
    id handle nickname image_url memberships_count events_count
  }
}"#;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileRow {
    pub id: i64,
    pub handle: String,
    pub nickname: Option<String>,
    pub image_url: Option<String>,
    pub about: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: ProfileId(row.id),
            handle: row.handle,
            nickname: row.nickname,
            image_url: row.image_url,
            about: row.about,
            verified: row.verified.unwrap_or(false),
            status: row.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: String,
    profile_id: Option<i64>,
    nickname: Option<String>,
}

impl RoleRow {
    fn into_assignment(self) -> Option<RoleAssignment> {
        let role = match self.role.as_str() {
            "host" => EventRole::Host,
            "co_host" => EventRole::CoHost,
            "speaker" => EventRole::Speaker,
            other => {
                tracing::debug!(role = %other, "ignoring unknown event role");
                return None;
            }
        };
        Some(RoleAssignment {
            role,
            profile_id: self.profile_id.map(ProfileId),
            nickname: self.nickname,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TicketRow {
    id: i64,
    title: String,
    price: Option<i64>,
    quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    status: String,
    profile: ProfileRow,
}

impl ParticipantRow {
    fn into_participant(self) -> Option<Participant> {
        let status = match self.status.as_str() {
            "applied" => ParticipantStatus::Applied,
            "attending" => ParticipantStatus::Attending,
            "checked" => ParticipantStatus::Checked,
            "cancelled" => ParticipantStatus::Cancelled,
            other => {
                tracing::debug!(status = %other, "ignoring unknown participant status");
                return None;
            }
        };
        Some(Participant {
            profile: self.profile.into(),
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRow {
    id: i64,
    title: String,
    start_time: String,
    end_time: String,
    location: Option<String>,
    meeting_url: Option<String>,
    #[serde(default)]
    participants_count: i64,
    max_participant: Option<i64>,
    min_participant: Option<i64>,
    status: Option<String>,
    display: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    group_id: Option<i64>,
    owner: ProfileRow,
    #[serde(default)]
    event_roles: Vec<RoleRow>,
    #[serde(default)]
    tickets: Vec<TicketRow>,
    #[serde(default)]
    participants: Vec<ParticipantRow>,
}

impl EventRow {
    pub(crate) fn into_event(self) -> Result<Event> {
        let status = match self.status.as_deref() {
            None | Some("open") => EventStatus::Open,
            Some("pending") => EventStatus::Pending,
            Some("cancel") => EventStatus::Cancel,
            Some("closed") => EventStatus::Closed,
            Some(other) => EventStatus::Unknown(other.to_string()),
        };
        let display = match self.display.as_deref() {
            None | Some("public") => EventDisplay::Public,
            Some("private") => EventDisplay::Private,
            Some(other) => EventDisplay::Unknown(other.to_string()),
        };

        Ok(Event {
            id: EventId(self.id),
            title: self.title,
            start_time: parse_event_time(&self.start_time)?,
            end_time: parse_event_time(&self.end_time)?,
            location: self.location,
            meeting_url: self.meeting_url,
            participants_count: self.participants_count,
            max_participant: self.max_participant,
            min_participant: self.min_participant,
            status,
            display,
            tags: self.tags.unwrap_or_default(),
            owner: self.owner.into(),
            group_id: self.group_id.map(GroupId),
            roles: self
                .event_roles
                .into_iter()
                .filter_map(RoleRow::into_assignment)
                .collect(),
            tickets: self
                .tickets
                .into_iter()
                .map(|t| Ticket {
                    id: t.id,
                    title: t.title,
                    price: t.price,
                    quantity: t.quantity,
                })
                .collect(),
            participants: self
                .participants
                .into_iter()
                .filter_map(ParticipantRow::into_participant)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EventsData {
    events: Vec<EventRow>,
}

#[derive(Debug, Deserialize)]
struct ParticipantIdsData {
    participants: Vec<ParticipantIdRow>,
}

#[derive(Debug, Deserialize)]
struct ParticipantIdRow {
    event_id: i64,
}

#[derive(Debug, Deserialize)]
struct GroupsData {
    groups: Vec<GroupRow>,
}

#[derive(Debug, Deserialize)]
struct GroupRow {
    id: i64,
    handle: String,
    nickname: Option<String>,
    image_url: Option<String>,
    #[serde(default)]
    memberships_count: i64,
    #[serde(default)]
    events_count: i64,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: GroupId(row.id),
            handle: row.handle,
            nickname: row.nickname,
            image_url: row.image_url,
            memberships_count: row.memberships_count,
            events_count: row.events_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

impl ApiClient {
    /// POST a GraphQL query.  Viewer-scoped reads pass the signed-in
    /// credential and get a bearer header; public reads pass `None` and go
    /// out anonymous.  Demo tokens never reach the wire.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: Value,
        cred: Option<&Credential>,
    ) -> Result<T> {
        let mut req = self
            .http()
            .post(self.config().graphql_url.clone())
            .json(&GraphqlRequest { query, variables });

        if let Some(Credential::Real(token)) = cred {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphqlResponse<T> = serde_json::from_str(&body)?;

        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(ApiError::GraphQl(messages.join("; ")));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::GraphQl("response carried no data".to_string()))
    }

    pub(crate) async fn gql_events_for_group(
        &self,
        group: GroupId,
        upcoming_only: bool,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Event>> {
        // Non-upcoming reads use an epoch lower bound so one query shape
        // serves both modes.
        let starts_after = if upcoming_only {
            self.corrected_now().format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            "1970-01-01T00:00:00".to_string()
        };

        let data: EventsData = self
            .graphql(
                EVENTS_FOR_GROUP_QUERY,
                json!({
                    "group_id": group.0,
                    "starts_after": starts_after,
                    "limit": limit,
                    "offset": offset,
                }),
                None,
            )
            .await?;

        data.events.into_iter().map(EventRow::into_event).collect()
    }

    pub(crate) async fn gql_event_by_id(&self, id: EventId) -> Result<Option<Event>> {
        let data: EventsData = self
            .graphql(EVENT_BY_ID_QUERY, json!({ "id": id.0 }), None)
            .await?;

        match data.events.into_iter().next() {
            Some(row) => Ok(Some(row.into_event()?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn gql_attending_event_ids(
        &self,
        profile: ProfileId,
        cred: &Credential,
    ) -> Result<Vec<EventId>> {
        let data: ParticipantIdsData = self
            .graphql(
                ATTENDING_IDS_QUERY,
                json!({
                    "profile_id": profile.0,
                    "statuses": ["applied", "attending", "checked"],
                }),
                Some(cred),
            )
            .await?;

        Ok(data
            .participants
            .into_iter()
            .map(|row| EventId(row.event_id))
            .collect())
    }

    pub(crate) async fn gql_groups_for_user(
        &self,
        profile: ProfileId,
        cred: &Credential,
    ) -> Result<Vec<Group>> {
        let data: GroupsData = self
            .graphql(
                GROUPS_FOR_USER_QUERY,
                json!({ "profile_id": profile.0 }),
                Some(cred),
            )
            .await?;
        Ok(data.groups.into_iter().map(Group::from).collect())
    }

    pub(crate) async fn gql_list_groups(&self) -> Result<Vec<Group>> {
        let data: GroupsData = self.graphql(LIST_GROUPS_QUERY, json!({}), None).await?;
        Ok(data.groups.into_iter().map(Group::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_row_converts_and_parses_times() {
        let row: EventRow = serde_json::from_value(json!({
            "id": 42,
            "title": "Picnic",
            "start_time": "2026-03-01T18:00:00",
            "end_time": "2026-03-01T20:00:00",
            "location": "Park",
            "meeting_url": null,
            "participants_count": 3,
            "max_participant": 20,
            "min_participant": null,
            "status": "open",
            "display": "public",
            "tags": [":featured", "outdoors"],
            "group_id": 3579,
            "owner": {"id": 1, "handle": "alice", "nickname": null,
                      "image_url": null, "about": null}
        }))
        .unwrap();

        let event = row.into_event().unwrap();
        assert_eq!(event.id, EventId(42));
        assert_eq!(event.group_id, Some(GroupId(3579)));
        assert_eq!(event.status, EventStatus::Open);
        assert_eq!(event.display_tags().collect::<Vec<_>>(), vec!["outdoors"]);
    }

    #[test]
    fn unknown_status_is_preserved() {
        let row: EventRow = serde_json::from_value(json!({
            "id": 1,
            "title": "X",
            "start_time": "2026-03-01T18:00:00",
            "end_time": "2026-03-01T19:00:00",
            "status": "draft",
            "owner": {"id": 1, "handle": "a"}
        }))
        .unwrap();

        let event = row.into_event().unwrap();
        assert_eq!(event.status, EventStatus::Unknown("draft".to_string()));
    }

    #[test]
    fn graphql_errors_are_collected() {
        let envelope: GraphqlResponse<EventsData> = serde_json::from_value(json!({
            "errors": [{"message": "field 'evnts' not found"}]
        }))
        .unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.len(), 1);
    }
}
