//! Boundary of the remote metadata API.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::HarvestError;

/// One entry of a resource listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource identifier.
    pub resource_id: String,
    /// Title, when the listing includes it.
    #[serde(default)]
    pub resource_title: Option<String>,
}

/// One funding source attached to a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingAgency {
    /// Agency name.
    pub agency_name: Option<String>,
    /// Agency URL.
    pub agency_url: Option<String>,
    /// Award number.
    pub award_number: Option<String>,
    /// Award title.
    pub award_title: Option<String>,
}

/// A named external identifier, e.g. a DOI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Identifier scheme (`doi`, `hydroShareIdentifier`, ...).
    pub name: String,
    /// Identifier URL.
    pub url: String,
}

/// Metadata for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceMetadata {
    /// Resource title.
    pub title: String,
    /// Funding sources.
    pub funding_agencies: Vec<FundingAgency>,
    /// Whether the resource has been formally published.
    pub published: bool,
    /// External identifiers.
    pub identifiers: Vec<Identifier>,
}

impl ResourceMetadata {
    /// The DOI, reduced from its URL to `prefix/suffix`.
    ///
    /// `https://doi.org/10.4211/hs.abc` becomes `10.4211/hs.abc`.
    #[must_use]
    pub fn doi(&self) -> Option<String> {
        let url = &self.identifiers.iter().find(|i| i.name == "doi")?.url;
        let segments: Vec<&str> = url.trim_end_matches('/').rsplitn(3, '/').collect();
        match segments.as_slice() {
            [suffix, prefix, _] | [suffix, prefix] => Some(format!("{prefix}/{suffix}")),
            _ => None,
        }
    }
}

/// Publication state of a resource, as reported by its system metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemMetadata {
    /// Whether the resource has been formally published.
    pub published: bool,
}

/// The remote metadata API, one call per request.
///
/// Implementations must be stateless per call: workers share one instance and
/// call it concurrently from separate runtimes.
#[async_trait]
pub trait RemoteMetadataClient: Send + Sync + 'static {
    /// List resources created in `[from, to)`.
    async fn list_resources(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ResourceDescriptor>, HarvestError>;

    /// Fetch the science metadata (title, funding, identifiers) of one
    /// resource. `published` is left unset.
    async fn get_science_metadata(&self, id: &str) -> Result<ResourceMetadata, HarvestError>;

    /// Fetch the system metadata of one resource.
    async fn get_system_metadata(&self, id: &str) -> Result<SystemMetadata, HarvestError>;

    /// Fetch both metadata documents and merge them.
    async fn get_metadata(&self, id: &str) -> Result<ResourceMetadata, HarvestError> {
        let system = self.get_system_metadata(id).await?;
        let mut meta = self.get_science_metadata(id).await?;
        meta.published = system.published;
        Ok(meta)
    }

    /// Check that the client's credentials are accepted.
    async fn verify_credentials(&self) -> Result<(), HarvestError>;
}

/// A citation index that counts the works citing a DOI.
#[async_trait]
pub trait CitationClient: Send + Sync + 'static {
    /// Number of works citing `doi`. A DOI the index does not know has none.
    async fn citation_count(&self, doi: &str) -> Result<u64, HarvestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_identifiers(identifiers: Vec<Identifier>) -> ResourceMetadata {
        ResourceMetadata { identifiers, ..ResourceMetadata::default() }
    }

    #[test]
    fn test_doi_from_url() {
        let meta = with_identifiers(vec![
            Identifier { name: "hydroShareIdentifier".into(), url: "https://x/resource/abc".into() },
            Identifier { name: "doi".into(), url: "https://doi.org/10.4211/hs.abc".into() },
        ]);
        assert_eq!(meta.doi().as_deref(), Some("10.4211/hs.abc"));
    }

    #[test]
    fn test_doi_missing() {
        assert_eq!(with_identifiers(vec![]).doi(), None);
    }

    struct Split {
        published: bool,
    }

    #[async_trait]
    impl RemoteMetadataClient for Split {
        async fn list_resources(
            &self,
            _from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<ResourceDescriptor>, HarvestError> {
            Ok(Vec::new())
        }

        async fn get_science_metadata(&self, _id: &str) -> Result<ResourceMetadata, HarvestError> {
            Ok(ResourceMetadata { title: "Snow".into(), ..ResourceMetadata::default() })
        }

        async fn get_system_metadata(&self, _id: &str) -> Result<SystemMetadata, HarvestError> {
            Ok(SystemMetadata { published: self.published })
        }

        async fn verify_credentials(&self) -> Result<(), HarvestError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_get_metadata_merges_both_documents() {
        let meta = Split { published: true }.get_metadata("r1").await.unwrap();
        assert_eq!(meta.title, "Snow");
        assert!(meta.published);
        assert!(!Split { published: false }.get_metadata("r1").await.unwrap().published);
    }

    #[test]
    fn test_metadata_tolerates_missing_fields() {
        let meta: ResourceMetadata =
            serde_json::from_str(r#"{"title": "Snow depth", "funding_agencies": [{"agency_name": "NSF"}]}"#)
                .unwrap();
        assert_eq!(meta.title, "Snow depth");
        assert!(!meta.published);
        assert_eq!(meta.funding_agencies[0].agency_name.as_deref(), Some("NSF"));
        assert_eq!(meta.funding_agencies[0].award_number, None);
    }
}
