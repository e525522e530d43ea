//! Item processors for the two harvest stages.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{
    CitationClient, DateInterval, HarvestError, ItemProcessor, RemoteMetadataClient,
    ResourceMetadata, ResultRecord,
};

/// Funding records for one resource: one per agency, tagged with the
/// resource's title and id.
#[must_use]
pub fn funding_records(id: &str, meta: &ResourceMetadata) -> Vec<ResultRecord> {
    meta.funding_agencies
        .iter()
        .map(|agency| {
            ResultRecord::new()
                .with("agency_name", Value::from(agency.agency_name.clone()))
                .with("agency_url", Value::from(agency.agency_url.clone()))
                .with("award_number", Value::from(agency.award_number.clone()))
                .with("award_title", Value::from(agency.award_title.clone()))
                .with("res_title", meta.title.clone())
                .with("res_id", id)
        })
        .collect()
}

/// `{resid, doi}` for a published resource that carries a DOI.
#[must_use]
pub fn doi_record(id: &str, meta: &ResourceMetadata) -> Option<ResultRecord> {
    if !meta.published {
        return None;
    }
    let doi = meta.doi()?;
    Some(ResultRecord::new().with("resid", id).with("doi", doi))
}

/// Lists the resources created in one interval.
pub struct DiscoveryProcessor<C> {
    client: Arc<C>,
}

impl<C> DiscoveryProcessor<C> {
    /// Share `client` with every worker.
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: RemoteMetadataClient> ItemProcessor<DateInterval, String> for DiscoveryProcessor<C> {
    async fn process(&self, interval: DateInterval) -> Result<Vec<String>, HarvestError> {
        let listed = self.client.list_resources(interval.start, interval.end).await?;
        Ok(listed.into_iter().map(|r| r.resource_id).collect())
    }
}

/// Fetches science metadata and emits funding records.
pub struct FundingProcessor<C> {
    client: Arc<C>,
}

impl<C> FundingProcessor<C> {
    /// Share `client` with every worker.
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: RemoteMetadataClient> ItemProcessor<String, ResultRecord> for FundingProcessor<C> {
    async fn process(&self, id: String) -> Result<Vec<ResultRecord>, HarvestError> {
        let meta = self.client.get_science_metadata(&id).await?;
        Ok(funding_records(&id, &meta))
    }
}

/// Emits a DOI record for published resources. Science metadata is only
/// fetched once system metadata reports the resource as published.
pub struct DoiProcessor<C> {
    client: Arc<C>,
}

impl<C> DoiProcessor<C> {
    /// Share `client` with every worker.
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: RemoteMetadataClient> ItemProcessor<String, ResultRecord> for DoiProcessor<C> {
    async fn process(&self, id: String) -> Result<Vec<ResultRecord>, HarvestError> {
        if !self.client.get_system_metadata(&id).await?.published {
            return Ok(Vec::new());
        }
        let mut meta = self.client.get_science_metadata(&id).await?;
        meta.published = true;
        Ok(doi_record(&id, &meta).into_iter().collect())
    }
}

/// One DOI whose citations should be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationLookup {
    /// Resource the DOI belongs to.
    pub resid: String,
    /// The DOI, `prefix/suffix`.
    pub doi: String,
}

impl CitationLookup {
    /// Lookup for a DOI table row; `None` when `resid` or `doi` is missing.
    #[must_use]
    pub fn from_record(record: &ResultRecord) -> Option<Self> {
        Some(Self { resid: record.text("resid")?, doi: record.text("doi")? })
    }
}

/// Counts the citations of one DOI and emits `{resid, citations}`.
pub struct CitationProcessor<C: ?Sized> {
    client: Arc<C>,
}

impl<C: ?Sized> CitationProcessor<C> {
    /// Share `client` with every worker.
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: CitationClient + ?Sized> ItemProcessor<CitationLookup, ResultRecord> for CitationProcessor<C> {
    async fn process(&self, lookup: CitationLookup) -> Result<Vec<ResultRecord>, HarvestError> {
        let citations = self.client.citation_count(&lookup.doi).await?;
        Ok(vec![ResultRecord::new()
            .with("resid", lookup.resid)
            .with("citations", citations)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FundingAgency, Identifier, ResourceDescriptor, SystemMetadata};
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Science metadata always works; system metadata fails or reports
    /// `published`.
    struct Flaky {
        published: Option<bool>,
        science_calls: AtomicUsize,
    }

    impl Flaky {
        fn new(published: Option<bool>) -> Arc<Self> {
            Arc::new(Self { published, science_calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl RemoteMetadataClient for Flaky {
        async fn list_resources(
            &self,
            _from: NaiveDateTime,
            _to: NaiveDateTime,
        ) -> Result<Vec<ResourceDescriptor>, HarvestError> {
            Ok(Vec::new())
        }

        async fn get_science_metadata(&self, _id: &str) -> Result<ResourceMetadata, HarvestError> {
            self.science_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResourceMetadata {
                title: "Snowpack".into(),
                funding_agencies: vec![FundingAgency { agency_name: Some("NSF".into()), ..FundingAgency::default() }],
                identifiers: vec![doi_identifier()],
                ..ResourceMetadata::default()
            })
        }

        async fn get_system_metadata(&self, _id: &str) -> Result<SystemMetadata, HarvestError> {
            self.published
                .map(|published| SystemMetadata { published })
                .ok_or_else(|| HarvestError::RemoteCallFailed("sysmeta returned 500".into()))
        }

        async fn verify_credentials(&self) -> Result<(), HarvestError> {
            Ok(())
        }
    }

    struct FixedCount(u64);

    #[async_trait]
    impl CitationClient for FixedCount {
        async fn citation_count(&self, _doi: &str) -> Result<u64, HarvestError> {
            Ok(self.0)
        }
    }

    fn doi_identifier() -> Identifier {
        Identifier { name: "doi".into(), url: "https://doi.org/10.4211/hs.r1".into() }
    }

    #[test]
    fn test_one_funding_record_per_agency() {
        let meta = ResourceMetadata {
            title: "Snowpack".into(),
            funding_agencies: vec![
                FundingAgency { agency_name: Some("NSF".into()), award_number: Some("123".into()), ..FundingAgency::default() },
                FundingAgency { agency_name: Some("NOAA".into()), ..FundingAgency::default() },
            ],
            ..ResourceMetadata::default()
        };

        let records = funding_records("r1", &meta);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("res_id").as_deref(), Some("r1"));
        assert_eq!(records[0].text("res_title").as_deref(), Some("Snowpack"));
        assert_eq!(records[0].text("award_number").as_deref(), Some("123"));
        assert_eq!(records[1].text("award_number"), None);
        assert_eq!(records[1].len(), 6);
    }

    #[test]
    fn test_unfunded_resource_yields_nothing() {
        assert!(funding_records("r1", &ResourceMetadata::default()).is_empty());
    }

    #[test]
    fn test_doi_only_when_published() {
        let mut meta = ResourceMetadata { identifiers: vec![doi_identifier()], ..ResourceMetadata::default() };
        assert!(doi_record("r1", &meta).is_none());

        meta.published = true;
        let record = doi_record("r1", &meta).unwrap();
        assert_eq!(record.text("resid").as_deref(), Some("r1"));
        assert_eq!(record.text("doi").as_deref(), Some("10.4211/hs.r1"));
    }

    #[tokio::test]
    async fn test_funding_survives_system_metadata_failure() {
        let client = Flaky::new(None);
        let records = FundingProcessor::new(Arc::clone(&client))
            .process("r1".into())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("agency_name").as_deref(), Some("NSF"));
        assert_eq!(client.science_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_doi_fetches_science_metadata_only_when_published() {
        let unpublished = Flaky::new(Some(false));
        let records = DoiProcessor::new(Arc::clone(&unpublished)).process("r1".into()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(unpublished.science_calls.load(Ordering::SeqCst), 0);

        let published = Flaky::new(Some(true));
        let records = DoiProcessor::new(Arc::clone(&published)).process("r1".into()).await.unwrap();
        assert_eq!(records[0].text("doi").as_deref(), Some("10.4211/hs.r1"));
        assert_eq!(published.science_calls.load(Ordering::SeqCst), 1);

        let broken = Flaky::new(None);
        assert!(DoiProcessor::new(broken).process("r1".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_citation_record() {
        let client: Arc<dyn CitationClient> = Arc::new(FixedCount(4));
        let lookup = CitationLookup::from_record(
            &ResultRecord::new().with("resid", "r1").with("doi", "10.4211/hs.r1"),
        )
        .unwrap();
        let records = CitationProcessor::new(client).process(lookup).await.unwrap();
        assert_eq!(records[0].text("resid").as_deref(), Some("r1"));
        assert_eq!(records[0].get("citations"), Some(&Value::from(4u64)));
    }

    #[test]
    fn test_citation_lookup_needs_doi() {
        assert!(CitationLookup::from_record(&ResultRecord::new().with("resid", "r1")).is_none());
    }

    #[test]
    fn test_published_without_doi_yields_nothing() {
        let meta = ResourceMetadata { published: true, ..ResourceMetadata::default() };
        assert!(doi_record("r1", &meta).is_none());
    }
}
