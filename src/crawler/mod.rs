//! Crawler module for fetching and orchestration
//!
//! This module contains the core scraping machinery, including:
//! - Proxy rotation and retry policies
//! - HTTP fetching with unbounded or bounded retries
//! - Headless browser sessions for JavaScript-only steps
//! - Bounded fan-out over a worker pool
//! - Per-site orchestration and the long-running driver loop

pub mod browser;
mod coordinator;
pub mod fetcher;
pub mod pool;
pub mod proxy;
pub mod retry;

pub use coordinator::ScrapeOrchestrator;
pub use fetcher::{FetchRequest, FetchResult, ResilientFetcher};
pub use pool::WorkerPool;
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use retry::{FailureKind, RetryPolicy};

use crate::config::Config;
use crate::output::RunSummary;
use crate::sites::{BringoAdapter, GlovoAdapter, SiteAdapter, SiteContext};
use crate::storage::{existing_entities, CsvSink, RecordSink, SqliteSink, STAMP_FORMAT};
use chrono::Local;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Which configured sites a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SiteSelection {
    Bringo,
    Glovo,
    #[default]
    All,
}

impl SiteSelection {
    pub fn includes_bringo(self) -> bool {
        matches!(self, SiteSelection::Bringo | SiteSelection::All)
    }

    pub fn includes_glovo(self) -> bool {
        matches!(self, SiteSelection::Glovo | SiteSelection::All)
    }
}

/// Options of one run that do not come from the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub sites: SiteSelection,
    /// Scrape only the root addressed by this URL
    pub root_url: Option<String>,
    /// Output stamp; the current time when unset
    pub stamp: Option<String>,
}

/// Runs every selected site once and returns one summary per site
///
/// A failing site does not keep the other one from running, but the first
/// site error is returned once both have been tried.
pub async fn run_once(config: &Config, options: &RunOptions) -> crate::Result<Vec<RunSummary>> {
    let rotator = match &config.scraper.proxies_path {
        Some(path) => ProxyRotator::from_file(path)?,
        None => ProxyRotator::direct(),
    };
    let context = SiteContext::from_config(config, Arc::new(rotator));
    let pool = WorkerPool::new(config.scraper.max_concurrency)
        .with_item_timeout(config.scraper.item_timeout());

    std::fs::create_dir_all(&config.output.results_dir)?;

    let mut summaries = Vec::new();
    let mut first_error = None;

    if options.sites.includes_bringo() {
        if let Some(settings) = &config.bringo {
            let adapter = BringoAdapter::new(settings, &context)?;
            match run_site(config, adapter, pool.clone(), settings.table.as_deref(), options).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    tracing::error!("bringo run failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        } else if options.sites == SiteSelection::Bringo {
            tracing::warn!("No [bringo] section in configuration");
        }
    }

    if options.sites.includes_glovo() {
        if let Some(settings) = &config.glovo {
            let adapter = GlovoAdapter::new(settings, &context)?;
            match run_site(config, adapter, pool.clone(), settings.table.as_deref(), options).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    tracing::error!("glovo run failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        } else if options.sites == SiteSelection::Glovo {
            tracing::warn!("No [glovo] section in configuration");
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summaries),
    }
}

async fn run_site<A: SiteAdapter>(
    config: &Config,
    adapter: A,
    pool: WorkerPool,
    table: Option<&str>,
    options: &RunOptions,
) -> crate::Result<RunSummary> {
    let folder = config.output.results_dir.join(adapter.name());
    std::fs::create_dir_all(&folder)?;

    let exclusions = existing_entities(&folder)?;
    tracing::info!("{} output files already in {}", exclusions.len(), folder.display());

    let mut orchestrator = ScrapeOrchestrator::new(adapter, pool)
        .with_sink(Arc::new(CsvSink::new(folder)))
        .with_exclusions(exclusions);
    if let Some(stamp) = &options.stamp {
        orchestrator = orchestrator.with_stamp(stamp.clone());
    }

    if let Some(sink) = table_sink::<A>(config.output.database_path.as_deref(), table)? {
        orchestrator = orchestrator.with_sink(sink);
    }

    let summary = match &options.root_url {
        Some(url) => orchestrator.run_root_url(url).await?,
        None => orchestrator.run().await?,
    };
    summary.log();
    Ok(summary)
}

fn table_sink<A: SiteAdapter>(
    database: Option<&Path>,
    table: Option<&str>,
) -> crate::Result<Option<Arc<dyn RecordSink<A::Record>>>> {
    match (database, table) {
        (Some(path), Some(table)) => {
            tracing::info!("Appending records to table {} in {}", table, path.display());
            Ok(Some(Arc::new(SqliteSink::open(path, table)?)))
        }
        _ => Ok(None),
    }
}

/// Runs forever: one run per interval, restarting after a delay on failure
///
/// A restart keeps the stamp of the failed attempt, so stores it already
/// wrote are skipped. Each scheduled run gets a fresh stamp.
pub async fn run_forever(config: &Config, options: &RunOptions) {
    let interval = Duration::from_secs(config.scraper.run_interval_hours * 3600);
    let restart_delay = Duration::from_secs(config.scraper.restart_delay_secs);

    let mut options = options.clone();
    loop {
        if options.stamp.is_none() {
            options.stamp = Some(Local::now().format(STAMP_FORMAT).to_string());
        }
        match run_once(config, &options).await {
            Ok(summaries) => {
                tracing::info!(
                    "Run complete ({} sites), next run in {}h",
                    summaries.len(),
                    config.scraper.run_interval_hours
                );
                options.stamp = None;
                tokio::time::sleep(interval).await;
            }
            Err(e) => {
                tracing::error!("Run failed: {}; restarting in {:?}", e, restart_delay);
                tokio::time::sleep(restart_delay).await;
            }
        }
    }
}
