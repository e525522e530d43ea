//! Concrete harvests built from the core pieces: the per-stage processors
//! and the coordinator that sequences discovery and metadata harvesting.

pub mod coordinator;
pub mod processors;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use coordinator::{CoordinatorReport, HarvestCoordinator, HarvestState, CITATIONS_COLUMN};
pub use processors::{
    doi_record, funding_records, CitationLookup, CitationProcessor, DiscoveryProcessor,
    DoiProcessor, FundingProcessor,
};

/// Columns summarized after a funding harvest.
pub const FUNDING_SUMMARY_COLUMNS: [&str; 4] =
    ["agency_name", "agency_url", "award_number", "award_title"];

/// Which per-resource metadata a harvest collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HarvestKind {
    /// One record per funding agency of every resource.
    Funding,
    /// One record per published resource carrying a DOI.
    Doi,
}

impl HarvestKind {
    /// Short name used for output files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Funding => "funding",
            Self::Doi => "doi",
        }
    }
}

impl fmt::Display for HarvestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Files a harvest reads and writes inside its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    /// Discovered identifiers (`resources_list.json`).
    pub identifiers: PathBuf,
    /// Final harvested table (`<kind>.json`).
    pub table: PathBuf,
    /// CSV export (`<kind>.csv`).
    pub csv: PathBuf,
    /// Dropped items (`<kind>-failures.json`).
    pub failures: PathBuf,
    /// Resource table produced by other tooling, joined into funding exports.
    pub resources: PathBuf,
}

impl CheckpointPaths {
    /// Paths for `kind` under `working_dir`.
    #[must_use]
    pub fn new(working_dir: &Path, kind: HarvestKind) -> Self {
        let name = kind.name();
        Self {
            identifiers: working_dir.join("resources_list.json"),
            table: working_dir.join(format!("{name}.json")),
            csv: working_dir.join(format!("{name}.csv")),
            failures: working_dir.join(format!("{name}-failures.json")),
            resources: working_dir.join("resources.json"),
        }
    }
}
