//! REST transport: profile, auth and mutation endpoints.
//!
//! The REST API takes the auth token as an explicit request parameter
//! rather than a header.  Non-2xx responses surface their status and body
//! so the UI can show the server's message after a rollback.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use gather_shared::models::{Profile, ProfileUpdate};
use gather_shared::types::EventId;
use gather_shared::Credential;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::graphql::ProfileRow;
use crate::Result;

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    auth_token: String,
}

#[derive(Debug, Deserialize)]
struct IdListResponse {
    #[serde(default)]
    event_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    result: String,
}

impl ApiClient {
    fn rest_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config().rest_base.trim_end_matches('/'))
    }

    async fn rest_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self.http().get(self.rest_url(path)).query(query).send().await?;
        Self::decode(resp).await
    }

    async fn rest_post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let resp = self.http().post(self.rest_url(path)).json(&body).send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    // -- Profiles ----------------------------------------------------------

    pub(crate) async fn rest_profile_by_token(&self, cred: &Credential) -> Result<Profile> {
        let row: ProfileRow = self
            .rest_get("profile/me", &[("auth_token", cred.token())])
            .await?;
        Ok(row.into())
    }

    pub(crate) async fn rest_profile_by_handle(&self, handle: &str) -> Result<Profile> {
        let row: ProfileRow = self
            .rest_get("profile/get_by_handle", &[("handle", handle)])
            .await?;
        Ok(row.into())
    }

    pub(crate) async fn rest_update_profile(
        &self,
        cred: &Credential,
        update: ProfileUpdate,
    ) -> Result<Profile> {
        let row: ProfileRow = self
            .rest_post(
                "profile/update",
                json!({
                    "auth_token": cred.token(),
                    "nickname": update.nickname,
                    "image_url": update.image_url,
                    "about": update.about,
                }),
            )
            .await?;
        Ok(row.into())
    }

    pub(crate) async fn rest_upload_image(
        &self,
        cred: &Credential,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("auth_token", cred.token().to_string())
            .part("data", part);

        let resp = self
            .http()
            .post(self.rest_url("service/upload_image"))
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = Self::decode(resp).await?;
        Ok(upload.result)
    }

    // -- Event mutations ---------------------------------------------------

    /// Shared shape of all four event mutations: POST the event id and the
    /// token, succeed on 2xx, no payload.
    pub(crate) async fn rest_event_mutation(
        &self,
        path: &str,
        id: EventId,
        cred: &Credential,
    ) -> Result<()> {
        let _: Value = self
            .rest_post(path, json!({ "id": id.0, "auth_token": cred.token() }))
            .await?;
        Ok(())
    }

    pub(crate) async fn rest_starred_event_ids(&self, cred: &Credential) -> Result<Vec<EventId>> {
        let resp: IdListResponse = self
            .rest_get("event/starred", &[("auth_token", cred.token())])
            .await?;
        Ok(resp.event_ids.into_iter().map(EventId).collect())
    }

    // -- Email PIN auth ----------------------------------------------------

    pub(crate) async fn rest_send_pin(&self, email: &str) -> Result<()> {
        let _: Value = self
            .rest_post("auth/send_pin", json!({ "email": email }))
            .await?;
        Ok(())
    }

    pub(crate) async fn rest_verify_pin(&self, email: &str, pin: &str) -> Result<String> {
        let resp: AuthTokenResponse = self
            .rest_post("auth/verify_pin", json!({ "email": email, "code": pin }))
            .await?;
        Ok(resp.auth_token)
    }
}
