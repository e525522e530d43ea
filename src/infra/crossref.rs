//! Citation counts from the Crossref REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::hydroshare::{http_client, status_error};
use crate::core::{CitationClient, HarvestError};

#[derive(Debug, Deserialize)]
struct WorkEnvelope {
    message: Work,
}

#[derive(Debug, Deserialize)]
struct Work {
    #[serde(rename = "is-referenced-by-count", default)]
    is_referenced_by_count: u64,
}

/// Looks up `works/{doi}` and reads `is-referenced-by-count`.
#[derive(Debug, Clone)]
pub struct CrossrefClient {
    http: Client,
    base_url: String,
}

impl CrossrefClient {
    /// Client for the index at `base_url`, e.g. `https://api.crossref.org`.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::RemoteCallFailed` if the HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, HarvestError> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CitationClient for CrossrefClient {
    async fn citation_count(&self, doi: &str) -> Result<u64, HarvestError> {
        let response = self
            .http
            .get(format!("{}/works/{doi}", self.base_url))
            .send()
            .await?;
        let status = response.status();
        // DOIs registered elsewhere (DataCite) are unknown here.
        if status == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(status_error(status, response.url().as_str()));
        }
        let envelope: WorkEnvelope = response.json().await?;
        Ok(envelope.message.is_referenced_by_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_reference_count() {
        let mut server = mockito::Server::new_async().await;
        let work = server
            .mock("GET", "/works/10.4211/hs.r1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "ok", "message": {"DOI": "10.4211/hs.r1", "is-referenced-by-count": 7}}"#)
            .create_async()
            .await;

        let client = CrossrefClient::new(server.url()).unwrap();
        assert_eq!(client.citation_count("10.4211/hs.r1").await.unwrap(), 7);
        work.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_doi_has_no_citations() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/works/10.4211/hs.gone")
            .with_status(404)
            .with_body("Resource not found.")
            .create_async()
            .await;

        let client = CrossrefClient::new(server.url()).unwrap();
        assert_eq!(client.citation_count("10.4211/hs.gone").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_server_error_is_remote_error() {
        let mut server = mockito::Server::new_async().await;
        let _busy = server
            .mock("GET", "/works/10.4211/hs.r1")
            .with_status(503)
            .create_async()
            .await;

        let client = CrossrefClient::new(server.url()).unwrap();
        assert!(matches!(
            client.citation_count("10.4211/hs.r1").await,
            Err(HarvestError::RemoteCallFailed(_))
        ));
    }
}
