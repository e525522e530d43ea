//! Command-line entry point: `harvest funding|doi --working-dir <dir>`.

use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{error, info};

use resource_harvester::config::{load_dotenv, HarvestConfig};
use resource_harvester::core::{AppResult, CredentialSource, MarkStream, StaticCredentials};
use resource_harvester::harvest::{CoordinatorReport, HarvestCoordinator, HarvestKind};
use resource_harvester::infra::{CrossrefClient, HydroShareConnector, TerminalPrompt};
use resource_harvester::util::init_tracing;

#[derive(Parser)]
#[command(author, version, about = "Harvest funding or DOI metadata from HydroShare", long_about = None)]
struct Cli {
    /// Which metadata to harvest
    #[arg(value_enum)]
    kind: HarvestKind,

    /// Directory holding checkpoints and outputs
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore existing checkpoints and collect everything again
    #[arg(short = 'c', long)]
    force: bool,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-item deadline in seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Number of discovery intervals
    #[arg(long)]
    partitions: Option<usize>,

    /// First creation date to discover (YYYY-MM-DD)
    #[arg(long)]
    begin: Option<NaiveDate>,

    /// Last creation date to discover, exclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Remote host
    #[arg(long)]
    host: Option<String>,

    /// Account name; prompts when unset
    #[arg(short, long, env = "HARVEST_USERNAME")]
    username: Option<String>,

    /// Account password; prompts when unset
    #[arg(long, env = "HARVEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Print column statistics of the result; DOI harvests count citations
    /// first and print the cited resources
    #[arg(short, long)]
    print_stats: bool,
}

impl Cli {
    fn harvest_config(&self) -> AppResult<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                HarvestConfig::from_json_str(&text).map_err(anyhow::Error::msg)?
            }
            None => HarvestConfig::default(),
        };
        config.apply_env().map_err(anyhow::Error::msg)?;

        if let Some(dir) = &self.working_dir {
            config.working_dir.clone_from(dir);
        }
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(workers) = self.workers {
            config.worker_count = Some(workers);
        }
        if let Some(secs) = self.deadline_secs {
            config.deadline_secs = secs;
        }
        if let Some(partitions) = self.partitions {
            config.partitions = partitions;
        }
        if let Some(begin) = self.begin {
            config.begin = begin;
        }
        if self.end.is_some() {
            config.end = self.end;
        }
        config.force |= self.force;

        config.validate().map_err(anyhow::Error::msg).context("invalid configuration")?;
        Ok(config)
    }

    fn credentials(&self) -> Box<dyn CredentialSource> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Box::new(StaticCredentials::new(username, password)),
            _ => Box::new(TerminalPrompt::new()),
        }
    }
}

fn print_report(report: &CoordinatorReport, print_stats: bool) {
    eprintln!();
    if report.from_checkpoint {
        println!("--> loaded {} records from a previous harvest", report.table.len());
    } else {
        println!(
            "--> harvested {} records from {} resources in {:.2} seconds",
            report.table.len(),
            report.identifiers,
            report.elapsed.as_secs_f64()
        );
    }
    if report.failure_count() > 0 {
        println!("--> {} items dropped", report.failure_count());
    }

    if !print_stats {
        return;
    }
    if report.kind == HarvestKind::Doi {
        let rule = "-".repeat(50);
        println!("{rule}\nResource Citation Summary\n{rule}");
        println!("{:<40}{:<10}", "ResourceID", "Citation Count");
        for (resid, count) in report.cited() {
            println!("{resid:<40}{count:<10}");
        }
        println!("{rule}");
    }
    for (column, summary) in report.summary() {
        println!(
            "{column:<14} count={:<6} unique={:<6} top={:<30} freq={}",
            summary.count,
            summary.unique,
            summary.top.as_deref().unwrap_or("-"),
            summary.freq
        );
    }
}

fn run(cli: &Cli) -> AppResult<()> {
    let config = cli.harvest_config()?;
    info!(
        kind = %cli.kind,
        working_dir = %config.working_dir.display(),
        host = %config.host,
        "Starting harvest"
    );

    let connector = HydroShareConnector::new(config.use_https);
    let citation_index = if cli.print_stats && cli.kind == HarvestKind::Doi {
        Some(CrossrefClient::new(config.citation_url.as_str())?)
    } else {
        None
    };
    let mut coordinator = HarvestCoordinator::new(cli.kind, config, cli.credentials(), connector)
        .with_progress(Arc::new(MarkStream::stderr()));
    if let Some(index) = citation_index {
        coordinator = coordinator.with_citations(Arc::new(index));
    }

    let report = coordinator
        .run()
        .with_context(|| format!("{} harvest failed", cli.kind))?;
    print_report(&report, cli.print_stats);
    Ok(())
}

fn main() {
    load_dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        error!(error = %e, "Harvest aborted");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
