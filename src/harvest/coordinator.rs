//! Two-stage harvest: discover resource identifiers, then fetch metadata for
//! each of them.
//!
//! ```text
//! NotStarted -> DiscoveringIds -> IdsCached -> HarvestingMetadata -> [CountingCitations] -> Done
//!      |                                            ^
//!      +---- identifier checkpoint exists ----------+
//!
//! NotStarted -> [CountingCitations] -> Done   when the final table already exists
//! any state -> Failed                         on authentication or other fatal errors
//! ```
//!
//! Citation counting only happens for DOI harvests with a citation index
//! attached. Credentials are requested only when a stage actually has to call
//! the remote API; the citation index needs none.

use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::processors::{
    CitationLookup, CitationProcessor, DiscoveryProcessor, DoiProcessor, FundingProcessor,
};
use super::{CheckpointPaths, HarvestKind, FUNDING_SUMMARY_COLUMNS};
use crate::config::HarvestConfig;
use crate::core::{
    aggregate, auth, partition_dates, CitationClient, ColumnSummary, Connector, CredentialSource,
    HarvestError, HarvestOutcome, IdentifierList, ItemFailure, ProgressSink, ResultRecord,
    SilentProgress, Table, TableStore, WorkerPool,
};
use crate::infra::{CsvTableStore, JsonTableStore};

/// Key joining funding records onto the resource table.
const JOIN_KEY: &str = "res_title";
/// Column holding citation counts in DOI tables.
pub const CITATIONS_COLUMN: &str = "citations";

/// Where a harvest is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestState {
    /// Nothing has happened yet.
    NotStarted,
    /// The discovery pool is listing resources.
    DiscoveringIds,
    /// Discovered identifiers were written to disk.
    IdsCached,
    /// The metadata pool is running.
    HarvestingMetadata,
    /// The citation pool is counting citations of harvested DOIs.
    CountingCitations,
    /// The final table exists.
    Done,
    /// A fatal error stopped the harvest.
    Failed,
}

impl HarvestState {
    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What a finished harvest produced.
#[derive(Debug)]
pub struct CoordinatorReport {
    /// Id attached to every log line of the run.
    pub harvest_id: Uuid,
    /// Which harvest ran.
    pub kind: HarvestKind,
    /// The harvested (or cached) table.
    pub table: Table,
    /// Identifiers the metadata stage worked through; zero when the final
    /// table came from a checkpoint.
    pub identifiers: usize,
    /// Intervals dropped during discovery.
    pub discovery_failures: Vec<ItemFailure>,
    /// Identifiers dropped during metadata harvesting.
    pub metadata_failures: Vec<ItemFailure>,
    /// DOIs whose citation lookup was dropped; their `citations` cell is null.
    pub citation_failures: Vec<ItemFailure>,
    /// Every state visited, in order.
    pub states: Vec<HarvestState>,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// True when the final table was loaded instead of harvested.
    pub from_checkpoint: bool,
}

impl CoordinatorReport {
    /// Column summaries shown to the operator. Only funding harvests have any.
    #[must_use]
    pub fn summary(&self) -> Vec<(&'static str, ColumnSummary)> {
        match self.kind {
            HarvestKind::Funding => FUNDING_SUMMARY_COLUMNS
                .iter()
                .map(|&column| (column, self.table.describe(column)))
                .collect(),
            HarvestKind::Doi => Vec::new(),
        }
    }

    /// Dropped items across every stage.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.discovery_failures.len() + self.metadata_failures.len() + self.citation_failures.len()
    }

    /// Resources cited at least once, most cited first.
    #[must_use]
    pub fn cited(&self) -> Vec<(String, u64)> {
        let mut cited: Vec<(String, u64)> = self
            .table
            .rows()
            .iter()
            .filter_map(|row| {
                let count = row.get(CITATIONS_COLUMN).and_then(Value::as_u64)?;
                Some((row.text("resid")?, count))
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        cited.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        cited
    }
}

/// Failures file contents.
#[derive(Serialize)]
struct FailureReport<'a> {
    harvest_id: Uuid,
    kind: HarvestKind,
    discovery: &'a [ItemFailure],
    metadata: &'a [ItemFailure],
    citations: &'a [ItemFailure],
}

impl FailureReport<'_> {
    fn dropped(&self) -> usize {
        self.discovery.len() + self.metadata.len() + self.citations.len()
    }
}

/// Sequences the discovery and metadata pools for one [`HarvestKind`].
///
/// `S` supplies credentials, `K` turns them into a remote client and `T`
/// persists checkpoints.
pub struct HarvestCoordinator<S, K, T = JsonTableStore> {
    kind: HarvestKind,
    config: HarvestConfig,
    source: S,
    connector: K,
    store: T,
    progress: Arc<dyn ProgressSink>,
    citations: Option<Arc<dyn CitationClient>>,
    history: Vec<HarvestState>,
}

impl<S, K> HarvestCoordinator<S, K, JsonTableStore>
where
    S: CredentialSource,
    K: Connector,
{
    /// Coordinator with JSON checkpoints and no progress output.
    pub fn new(kind: HarvestKind, config: HarvestConfig, source: S, connector: K) -> Self {
        Self {
            kind,
            config,
            source,
            connector,
            store: JsonTableStore::new(),
            progress: Arc::new(SilentProgress::new()),
            citations: None,
            history: vec![HarvestState::NotStarted],
        }
    }
}

impl<S, K, T> HarvestCoordinator<S, K, T>
where
    S: CredentialSource,
    K: Connector,
    T: TableStore,
{
    /// Use a different checkpoint store.
    pub fn with_store<U: TableStore>(self, store: U) -> HarvestCoordinator<S, K, U> {
        HarvestCoordinator {
            kind: self.kind,
            config: self.config,
            source: self.source,
            connector: self.connector,
            store,
            progress: self.progress,
            citations: self.citations,
            history: self.history,
        }
    }

    /// Count citations of every harvested DOI against `index`. Ignored by
    /// funding harvests.
    #[must_use]
    pub fn with_citations(mut self, index: Arc<dyn CitationClient>) -> Self {
        self.citations = Some(index);
        self
    }

    /// Report progress marks to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> HarvestState {
        self.history.last().copied().unwrap_or(HarvestState::NotStarted)
    }

    /// Every state visited by the latest run.
    #[must_use]
    pub fn history(&self) -> &[HarvestState] {
        &self.history
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Run the harvest to a terminal state.
    ///
    /// Blocks the calling thread; it must not be called from inside an async
    /// runtime.
    ///
    /// # Errors
    ///
    /// - `HarvestError::AuthenticationFailed` once the retry budget is spent
    /// - `HarvestError::InvalidConfig` / `InvalidRange` for a bad configuration
    /// - `HarvestError::EmptyResult` when discovery found nothing to harvest
    /// - pool and storage errors
    pub fn run(&mut self) -> Result<CoordinatorReport, HarvestError> {
        let harvest_id = Uuid::new_v4();
        let span = info_span!("harvest", harvest_id = %harvest_id, kind = %self.kind);
        let _entered = span.enter();

        self.history = vec![HarvestState::NotStarted];
        let started = Instant::now();
        let result = self.execute(harvest_id, started);
        if let Err(e) = &result {
            error!(error = %e, "Harvest failed");
            self.transition(HarvestState::Failed);
        }
        result
    }

    fn transition(&mut self, next: HarvestState) {
        info!(from = ?self.state(), to = ?next, "Harvest state change");
        self.history.push(next);
    }

    fn execute(
        &mut self,
        harvest_id: Uuid,
        started: Instant,
    ) -> Result<CoordinatorReport, HarvestError> {
        self.config.validate().map_err(HarvestError::InvalidConfig)?;
        let paths = CheckpointPaths::new(&self.config.working_dir, self.kind);

        if !self.config.force && self.store.exists(&paths.table) {
            info!(path = %paths.table.display(), "Using cached harvest result");
            let mut table = self.store.load_table(&paths.table)?;
            let mut citation_failures = Vec::new();
            if self.citations_enabled() {
                citation_failures = self.add_citations(&mut table)?;
                self.store.save_table(&table, &paths.table)?;
                self.export_csv(&table, &paths)?;
                write_failures(
                    &FailureReport {
                        harvest_id,
                        kind: self.kind,
                        discovery: &[],
                        metadata: &[],
                        citations: &citation_failures,
                    },
                    &paths,
                )?;
            }
            self.transition(HarvestState::Done);
            return Ok(CoordinatorReport {
                harvest_id,
                kind: self.kind,
                table,
                identifiers: 0,
                discovery_failures: Vec::new(),
                metadata_failures: Vec::new(),
                citation_failures,
                states: self.history.clone(),
                elapsed: started.elapsed(),
                from_checkpoint: true,
            });
        }

        create_dir_all(&self.config.working_dir)?;
        let client = Arc::new(self.authenticate()?);

        let cached_ids = !self.config.force && self.store.exists(&paths.identifiers);
        let (ids, discovery_failures) = if cached_ids {
            let ids = self.store.load_identifiers(&paths.identifiers)?;
            info!(
                path = %paths.identifiers.display(),
                identifiers = ids.len(),
                "Using cached identifier list"
            );
            (ids, Vec::new())
        } else {
            self.transition(HarvestState::DiscoveringIds);
            let (ids, failures) = self.discover(&client)?;
            self.store.save_identifiers(&ids, &paths.identifiers)?;
            self.transition(HarvestState::IdsCached);
            (ids, failures)
        };

        self.transition(HarvestState::HarvestingMetadata);
        let identifiers = ids.len();
        let outcome = self.harvest_metadata(&client, ids)?;
        let metadata_failures = outcome.failures;
        let mut table = aggregate(outcome.records, identifiers)?;
        let citation_failures = self.add_citations(&mut table)?;

        self.store.save_table(&table, &paths.table)?;
        self.export_csv(&table, &paths)?;
        let failures = FailureReport {
            harvest_id,
            kind: self.kind,
            discovery: &discovery_failures,
            metadata: &metadata_failures,
            citations: &citation_failures,
        };
        write_failures(&failures, &paths)?;
        let dropped = failures.dropped();

        self.transition(HarvestState::Done);
        info!(
            records = table.len(),
            identifiers = identifiers,
            failures = dropped,
            "Harvest complete"
        );

        Ok(CoordinatorReport {
            harvest_id,
            kind: self.kind,
            table,
            identifiers,
            discovery_failures,
            metadata_failures,
            citation_failures,
            states: self.history.clone(),
            elapsed: started.elapsed(),
            from_checkpoint: false,
        })
    }

    fn authenticate(&mut self) -> Result<K::Client, HarvestError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(auth::authenticate(
            &mut self.source,
            &self.connector,
            &self.config.host,
            self.config.auth_attempts,
            self.config.pool_config().deadline,
        ))
    }

    fn discover(
        &self,
        client: &Arc<K::Client>,
    ) -> Result<(IdentifierList, Vec<ItemFailure>), HarvestError> {
        let intervals = partition_dates(
            self.config.begin,
            self.config.end_date(),
            self.config.partitions,
        )?;
        info!(intervals = intervals.len(), "Discovering resources");

        let pool = WorkerPool::start_with_progress(
            self.config.pool_config(),
            DiscoveryProcessor::new(Arc::clone(client)),
            Arc::clone(&self.progress),
        )?;
        let outcome = pool.run(intervals)?;

        let ids: IdentifierList = outcome.records.into_iter().collect();
        info!(
            identifiers = ids.len(),
            dropped_intervals = outcome.failures.len(),
            "Discovery finished"
        );
        Ok((ids, outcome.failures))
    }

    fn harvest_metadata(
        &self,
        client: &Arc<K::Client>,
        ids: IdentifierList,
    ) -> Result<HarvestOutcome<ResultRecord>, HarvestError> {
        let config = self.config.pool_config();
        let progress = Arc::clone(&self.progress);
        let client = Arc::clone(client);

        let pool = match self.kind {
            HarvestKind::Funding => {
                WorkerPool::start_with_progress(config, FundingProcessor::new(client), progress)?
            }
            HarvestKind::Doi => {
                WorkerPool::start_with_progress(config, DoiProcessor::new(client), progress)?
            }
        };
        let outcome = pool.run(ids)?;
        if outcome.timed_out() > 0 {
            warn!(timed_out = outcome.timed_out(), "Some identifiers hit the deadline");
        }
        Ok(outcome)
    }

    fn citations_enabled(&self) -> bool {
        self.kind == HarvestKind::Doi && self.citations.is_some()
    }

    /// Fill the `citations` column of a DOI table, replacing earlier counts.
    /// Rows whose lookup was dropped get a null count.
    fn add_citations(&mut self, table: &mut Table) -> Result<Vec<ItemFailure>, HarvestError> {
        let index = match &self.citations {
            Some(index) if self.kind == HarvestKind::Doi => Arc::clone(index),
            _ => return Ok(Vec::new()),
        };
        self.transition(HarvestState::CountingCitations);

        let lookups: Vec<CitationLookup> =
            table.rows().iter().filter_map(CitationLookup::from_record).collect();
        info!(dois = lookups.len(), "Counting citations");

        let pool = WorkerPool::start_with_progress(
            self.config.pool_config(),
            CitationProcessor::new(index),
            Arc::clone(&self.progress),
        )?;
        let outcome = pool.run(lookups)?;

        let counts: HashMap<String, Value> = outcome
            .records
            .into_iter()
            .filter_map(|r| Some((r.text("resid")?, r.get(CITATIONS_COLUMN)?.clone())))
            .collect();
        *table = with_citation_counts(std::mem::take(table), &counts);
        info!(
            counted = counts.len(),
            dropped = outcome.failures.len(),
            "Citation counting finished"
        );
        Ok(outcome.failures)
    }

    fn export_csv(&self, table: &Table, paths: &CheckpointPaths) -> Result<(), HarvestError> {
        let csv = CsvTableStore::new();
        if self.kind != HarvestKind::Funding {
            return csv.save_table(table, &paths.csv);
        }

        if self.store.exists(&paths.resources) {
            let resources = self.store.load_table(&paths.resources)?;
            let joined = table.outer_join(&resources, JOIN_KEY);
            info!(rows = joined.len(), "Joined funding records with resource table");
            csv.save_table(&joined, &paths.csv)
        } else {
            warn!(
                path = %paths.resources.display(),
                "Resource table not found, exporting funding records unjoined"
            );
            csv.save_table(table, &paths.csv)
        }
    }
}

fn with_citation_counts(table: Table, counts: &HashMap<String, Value>) -> Table {
    let mut columns = table.columns().to_vec();
    if !columns.iter().any(|c| c == CITATIONS_COLUMN) {
        columns.push(CITATIONS_COLUMN.to_string());
    }
    let rows = table
        .into_rows()
        .into_iter()
        .map(|mut row| {
            let count = row
                .text("resid")
                .and_then(|id| counts.get(&id).cloned())
                .unwrap_or(Value::Null);
            row.insert(CITATIONS_COLUMN, count);
            row
        })
        .collect();
    Table::with_columns(columns, rows)
}

/// Write the failure report when anything was dropped.
fn write_failures(report: &FailureReport<'_>, paths: &CheckpointPaths) -> Result<(), HarvestError> {
    if report.dropped() == 0 {
        return Ok(());
    }
    let mut writer = BufWriter::new(File::create(&paths.failures)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    warn!(
        path = %paths.failures.display(),
        dropped = report.dropped(),
        "Wrote failure report"
    );
    Ok(())
}
