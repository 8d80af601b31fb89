//! Directory REST client
//!
//! Thin wrapper over the directory service endpoints used by the engine:
//! - `GET  /users/{key}` - user lookup by address or id
//! - `GET  /groups/{id}/members/$ref` - reference-only member listing
//! - `GET  /groups/{id}/members` - full member listing
//! - `POST /users/{id}/checkMemberGroups` - direct membership check
//!
//! Listings follow `@odata.nextLink` up to a configured page limit.

use async_trait::async_trait;
use gc_common::{DirectoryId, GroupReference};
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::RequestError;
use crate::normalize::DirectoryReference;
use crate::token::AccessToken;

/// User attributes requested on lookup
const USER_SELECT: &str = "id,mail,userPrincipalName";

/// A directory user as returned by the lookup endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

/// A member entry from the full listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
}

/// Directory operations the engine depends on
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    /// Look up a single user by email address or directory id
    async fn get_user(&self, key: &str, token: &AccessToken) -> Result<UserRecord, RequestError>;

    /// Group members as lightweight references
    async fn list_member_references(
        &self,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<Vec<DirectoryReference>, RequestError>;

    /// Group members as full objects
    async fn list_members(
        &self,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<Vec<MemberObject>, RequestError>;

    /// Which of `groups` the user belongs to, as raw identifier strings
    async fn check_member_groups(
        &self,
        user: &DirectoryId,
        groups: &[DirectoryId],
        token: &AccessToken,
    ) -> Result<Vec<String>, RequestError>;
}

/// Directory client configuration
#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    /// Directory API base URL, e.g. `https://graph.microsoft.com/v1.0`
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Upper bound on pages followed per listing
    pub max_pages: u32,
}

impl Default for GraphClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_pages: 50,
        }
    }
}

impl GraphClientConfig {
    /// HTTP client honouring the configured timeouts
    pub fn build_http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckMemberGroupsRequest {
    group_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CheckMemberGroupsResponse {
    value: Vec<String>,
}

/// reqwest-backed [`DirectoryApi`]
pub struct GraphClient {
    config: GraphClientConfig,
    http: reqwest::Client,
}

impl GraphClient {
    pub fn new(config: GraphClientConfig) -> reqwest::Result<Self> {
        let http = config.build_http_client()?;
        Ok(Self { config, http })
    }

    /// Share an existing HTTP client (and its connection pool)
    pub fn with_http_client(config: GraphClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &AccessToken,
    ) -> Result<T, RequestError> {
        let response = request
            .bearer_auth(token.value())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "Directory request failed");
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(RequestError::from_body)
    }

    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: String,
        token: &AccessToken,
    ) -> Result<Vec<T>, RequestError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            if pages >= self.config.max_pages {
                return Err(RequestError::TooManyPages(self.config.max_pages));
            }
            pages += 1;

            let page: Page<T> = self.send_json(self.http.get(&url), token).await?;
            items.extend(page.value);
            next = page.next_link;
        }

        debug!(pages, items = items.len(), "Listing complete");
        Ok(items)
    }
}

#[async_trait]
impl DirectoryApi for GraphClient {
    async fn get_user(&self, key: &str, token: &AccessToken) -> Result<UserRecord, RequestError> {
        let url = self.url(&format!("users/{}", urlencoding::encode(key)));
        let request = self.http.get(&url).query(&[("$select", USER_SELECT)]);
        self.send_json(request, token).await
    }

    async fn list_member_references(
        &self,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<Vec<DirectoryReference>, RequestError> {
        let url = self.url(&format!("groups/{}/members/$ref", group.group_id));
        self.get_all_pages(url, token).await
    }

    async fn list_members(
        &self,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<Vec<MemberObject>, RequestError> {
        let url = self.url(&format!("groups/{}/members", group.group_id));
        self.get_all_pages(url, token).await
    }

    async fn check_member_groups(
        &self,
        user: &DirectoryId,
        groups: &[DirectoryId],
        token: &AccessToken,
    ) -> Result<Vec<String>, RequestError> {
        let url = self.url(&format!("users/{}/checkMemberGroups", user));
        let body = CheckMemberGroupsRequest {
            group_ids: groups.iter().map(ToString::to_string).collect(),
        };
        let response: CheckMemberGroupsResponse =
            self.send_json(self.http.post(&url).json(&body), token).await?;
        Ok(response.value)
    }
}
