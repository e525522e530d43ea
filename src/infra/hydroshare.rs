//! HTTP client for the HydroShare REST API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::core::{
    Connector, Credentials, HarvestError, RemoteMetadataClient, ResourceDescriptor,
    ResourceMetadata, SystemMetadata,
};

const USER_AGENT: &str = concat!("resource-harvester/", env!("CARGO_PKG_VERSION"));
const LISTING_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct ResourcePage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<ResourceDescriptor>,
}

/// Client bound to one host and one account.
///
/// Idle connections are never pooled: each worker drives the client from its
/// own runtime, and a connection cannot outlive the runtime that opened it.
#[derive(Clone)]
pub struct HydroShareClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HydroShareClient {
    /// Build a client for `base_url` (scheme and host, no trailing path).
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::RemoteCallFailed` if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, HarvestError> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// The scheme and host requests go to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HarvestError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.url().as_str()));
        }
        Ok(response.json().await?)
    }
}

impl fmt::Debug for HydroShareClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydroShareClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// HTTP client shared by the remote API adapters. Idle connections are never
/// pooled.
pub(super) fn http_client() -> Result<Client, HarvestError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(0)
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

pub(super) fn status_error(status: StatusCode, url: &str) -> HarvestError {
    HarvestError::RemoteCallFailed(format!("{url} returned {status}"))
}

#[async_trait]
impl RemoteMetadataClient for HydroShareClient {
    async fn list_resources(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ResourceDescriptor>, HarvestError> {
        let first = self.get(&format!("{}/hsapi/resource/", self.base_url)).query(&[
            ("from_date", from.format(LISTING_DATE_FORMAT).to_string()),
            ("to_date", to.format(LISTING_DATE_FORMAT).to_string()),
        ]);

        let mut page: ResourcePage = self.fetch(first).await?;
        let mut resources = std::mem::take(&mut page.results);
        while let Some(next) = page.next.take() {
            debug!(url = %next, "Following listing page");
            page = self.fetch(self.get(&next)).await?;
            resources.append(&mut page.results);
        }
        Ok(resources)
    }

    async fn get_science_metadata(&self, id: &str) -> Result<ResourceMetadata, HarvestError> {
        self.fetch(self.get(&format!("{}/hsapi/resource/{id}/scimeta/elements/", self.base_url)))
            .await
    }

    async fn get_system_metadata(&self, id: &str) -> Result<SystemMetadata, HarvestError> {
        self.fetch(self.get(&format!("{}/hsapi/resource/{id}/sysmeta/", self.base_url)))
            .await
    }

    async fn verify_credentials(&self) -> Result<(), HarvestError> {
        let response = self
            .get(&format!("{}/hsapi/userInfo/", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, response.url().as_str()))
        }
    }
}

/// Builds [`HydroShareClient`]s from collected credentials.
#[derive(Debug, Clone, Copy)]
pub struct HydroShareConnector {
    use_https: bool,
}

impl HydroShareConnector {
    /// Connect over https when `use_https` is set, plain http otherwise.
    #[must_use]
    pub const fn new(use_https: bool) -> Self {
        Self { use_https }
    }
}

impl Default for HydroShareConnector {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connector for HydroShareConnector {
    type Client = HydroShareClient;

    fn connect(&self, credentials: &Credentials) -> Result<HydroShareClient, HarvestError> {
        let scheme = if self.use_https { "https" } else { "http" };
        let base_url = format!("{scheme}://{}", credentials.host.trim_end_matches('/'));
        HydroShareClient::new(base_url, &credentials.username, &credentials.password)
    }
}
