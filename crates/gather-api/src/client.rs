//! Gateway configuration and the concrete [`ApiClient`].
//!
//! All settings have sensible defaults so the client can be constructed
//! with zero configuration during development.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use gather_shared::constants::REQUEST_TIMEOUT;
use gather_shared::models::{Event, Group, Profile, ProfileUpdate};
use gather_shared::time::{display_time, DEFAULT_DISPLAY_OFFSET_HOURS};
use gather_shared::types::{EventId, GroupId, ProfileId};
use gather_shared::Credential;

use crate::api::EventsApi;
use crate::demo;
use crate::error::ApiError;
use crate::Result;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the REST API.
    /// Env: `GATHER_REST_BASE`
    pub rest_base: String,

    /// Full URL of the GraphQL endpoint.
    /// Env: `GATHER_GRAPHQL_URL`
    pub graphql_url: String,

    /// Per-request timeout; expiry is reported as a gateway failure.
    /// Env: `GATHER_TIMEOUT_SECS`
    pub timeout: std::time::Duration,

    /// Hour offset applied when comparing event times against "now".
    /// Env: `GATHER_DISPLAY_OFFSET_HOURS`
    pub display_offset_hours: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_base: "https://api.gather.example".to_string(),
            graphql_url: "https://graph.gather.example/v1/graphql".to_string(),
            timeout: REQUEST_TIMEOUT,
            display_offset_hours: DEFAULT_DISPLAY_OFFSET_HOURS,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("GATHER_REST_BASE") {
            config.rest_base = base;
        }

        if let Ok(url) = std::env::var("GATHER_GRAPHQL_URL") {
            config.graphql_url = url;
        }

        if let Ok(val) = std::env::var("GATHER_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.timeout = std::time::Duration::from_secs(secs),
                Err(_) => warn!(value = %val, "Invalid GATHER_TIMEOUT_SECS, using default"),
            }
        }

        if let Ok(val) = std::env::var("GATHER_DISPLAY_OFFSET_HOURS") {
            match val.parse::<i64>() {
                Ok(hours) => config.display_offset_hours = hours,
                Err(_) => {
                    warn!(value = %val, "Invalid GATHER_DISPLAY_OFFSET_HOURS, using default")
                }
            }
        }

        config
    }
}

/// The concrete Remote Data Gateway.
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// "Now" in the platform's corrected display timezone, for comparing
    /// against server-stored event timestamps.
    pub(crate) fn corrected_now(&self) -> DateTime<FixedOffset> {
        display_time(Utc::now(), self.config.display_offset_hours)
    }
}

impl EventsApi for ApiClient {
    async fn profile_by_token(&self, cred: &Credential) -> Option<Profile> {
        if cred.is_demo() {
            return Some(demo::demo_profile());
        }

        match self.rest_profile_by_token(cred).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "profile lookup by token failed");
                None
            }
        }
    }

    async fn profile_by_handle(&self, handle: &str) -> Option<Profile> {
        match self.rest_profile_by_handle(handle).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(handle = %handle, error = %e, "profile lookup by handle failed");
                None
            }
        }
    }

    async fn events_for_group(
        &self,
        group: GroupId,
        upcoming_only: bool,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Event>> {
        self.gql_events_for_group(group, upcoming_only, offset, limit)
            .await
    }

    async fn event_by_id(&self, id: EventId) -> Result<Option<Event>> {
        self.gql_event_by_id(id).await
    }

    async fn attending_event_ids(&self, profile: ProfileId, cred: &Credential) -> Result<Vec<EventId>> {
        if cred.is_demo() {
            return Ok(demo::demo_attending_event_ids());
        }
        self.gql_attending_event_ids(profile, cred).await
    }

    async fn starred_event_ids(&self, cred: &Credential) -> Result<Vec<EventId>> {
        if cred.is_demo() {
            return Ok(demo::demo_starred_event_ids());
        }
        self.rest_starred_event_ids(cred).await
    }

    async fn groups_for_user(&self, profile: ProfileId, cred: &Credential) -> Result<Vec<Group>> {
        if cred.is_demo() {
            return Ok(Vec::new());
        }
        self.gql_groups_for_user(profile, cred).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.gql_list_groups().await
    }

    async fn star(&self, id: EventId, cred: &Credential) -> Result<()> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(());
        }
        self.rest_event_mutation("event/star", id, cred).await
    }

    async fn unstar(&self, id: EventId, cred: &Credential) -> Result<()> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(());
        }
        self.rest_event_mutation("event/unstar", id, cred).await
    }

    async fn attend(&self, id: EventId, cred: &Credential) -> Result<()> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(());
        }
        self.rest_event_mutation("event/join", id, cred).await
    }

    async fn cancel_attendance(&self, id: EventId, cred: &Credential) -> Result<()> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(());
        }
        self.rest_event_mutation("event/cancel", id, cred).await
    }

    async fn send_pin(&self, email: &str) -> Result<()> {
        self.rest_send_pin(email).await
    }

    async fn verify_pin(&self, email: &str, pin: &str) -> Result<String> {
        self.rest_verify_pin(email, pin).await
    }

    async fn update_profile(&self, cred: &Credential, update: ProfileUpdate) -> Result<Profile> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(demo::demo_profile());
        }
        self.rest_update_profile(cred, update).await
    }

    async fn upload_image(
        &self,
        cred: &Credential,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        if cred.is_demo() {
            demo::simulate_latency().await;
            return Ok(format!("https://demo.invalid/uploads/{file_name}"));
        }
        self.rest_upload_image(cred, file_name, bytes).await
    }
}
