//! Scrape orchestration
//!
//! The orchestrator walks one site top-down:
//! - Discovering roots, skipping those this run has already written
//! - Discovering stores and listing pages sequentially
//! - Fanning listing pages and then items out over the worker pool
//! - Deduplicating the store's records and appending them to every sink
//!
//! Records are written once per store, so progress made before a crash
//! is kept. A store whose write fails is logged and counted; the run moves
//! on to the next store.

use crate::crawler::pool::WorkerPool;
use crate::output::{RunStats, RunSummary};
use crate::sites::SiteAdapter;
use crate::storage::{dedupe_by, stamped_stem, Record, RecordSink, STAMP_FORMAT};
use crate::ConfigError;
use chrono::Local;
use std::collections::HashSet;
use std::sync::Arc;

/// Drives one site adapter from roots to written records
pub struct ScrapeOrchestrator<A: SiteAdapter> {
    adapter: Arc<A>,
    pool: WorkerPool,
    sinks: Vec<Arc<dyn RecordSink<A::Record>>>,
    exclusions: HashSet<String>,
    stamp: String,
    stats: Arc<RunStats>,
}

impl<A: SiteAdapter> ScrapeOrchestrator<A> {
    pub fn new(adapter: A, pool: WorkerPool) -> Self {
        let stats = Arc::new(RunStats::new(adapter.name()));
        Self {
            adapter: Arc::new(adapter),
            pool,
            sinks: Vec::new(),
            exclusions: HashSet::new(),
            stamp: Local::now().format(STAMP_FORMAT).to_string(),
            stats,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink<A::Record>>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Stamped file stems to skip on a full run
    ///
    /// Only stems carrying this run's stamp match, so exclusions resume a
    /// restarted run and never skip a later scheduled one.
    pub fn with_exclusions(mut self, exclusions: HashSet<String>) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Overrides the `YYYY_MM_DD_HH_MM` suffix of destination names
    pub fn with_stamp(mut self, stamp: impl Into<String>) -> Self {
        self.stamp = stamp.into();
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Full run over every root the site lists
    pub async fn run(&self) -> crate::Result<RunSummary> {
        tracing::info!("Starting {} run", self.adapter.name());

        let roots = self.adapter.discover_roots().await?;
        self.stats.add_roots(roots.len());

        for root in &roots {
            if let Some(key) = self.adapter.root_key(root) {
                if self.exclusions.contains(&stamped_stem(&key, &self.stamp)) {
                    tracing::info!("Skipping {}: already scraped", key);
                    self.stats.add_skipped();
                    continue;
                }
            }
            self.scrape_root(root).await?;
        }

        Ok(self.stats.snapshot())
    }

    /// Run limited to the root addressed by `url`; exclusions do not apply
    pub async fn run_root_url(&self, url: &str) -> crate::Result<RunSummary> {
        let root = self.adapter.root_from_url(url).await?.ok_or_else(|| {
            ConfigError::InvalidUrl(format!(
                "{} cannot start from a single URL ({})",
                self.adapter.name(),
                url
            ))
        })?;
        self.stats.add_roots(1);
        self.scrape_root(&root).await?;
        Ok(self.stats.snapshot())
    }

    async fn scrape_root(&self, root: &A::Root) -> crate::Result<()> {
        let stores = match self.adapter.discover_stores(root).await {
            Ok(stores) => stores,
            Err(e) => {
                tracing::warn!("Store discovery failed: {}", e);
                return Ok(());
            }
        };
        self.stats.add_stores(stores.len());
        tracing::info!("Found {} stores", stores.len());

        let check_destination = self.adapter.root_key(root).is_none();
        for store in &stores {
            let destination = self.adapter.destination(root, store);
            if check_destination && self.exclusions.contains(&stamped_stem(&destination, &self.stamp)) {
                tracing::info!("Skipping {}: already scraped", destination);
                self.stats.add_skipped();
                continue;
            }
            self.scrape_store(store, &destination).await;
        }
        Ok(())
    }

    /// Scrapes one store and appends its records to `destination` plus the
    /// run stamp
    ///
    /// Returns the number of records written; zero when every sink failed
    /// or the store had nothing to write.
    pub async fn scrape_store(&self, store: &A::Store, destination: &str) -> usize {
        let listings = match self.adapter.discover_listings(store).await {
            Ok(listings) => listings,
            Err(e) => {
                tracing::warn!("Listing discovery failed for {}: {}", destination, e);
                return 0;
            }
        };
        self.stats.add_listings(listings.len());
        tracing::info!("---> listings : {}", listings.len());

        let adapter = Arc::clone(&self.adapter);
        let pages = self
            .pool
            .run_all(listings, move |listing| {
                let adapter = Arc::clone(&adapter);
                async move { adapter.extract_listing(listing).await }
            })
            .await;
        self.stats.add_failed_listings(pages.iter().filter(|page| page.is_none()).count());

        let items: Vec<A::Item> = pages.into_iter().flatten().flatten().collect();
        self.stats.add_items(items.len());
        tracing::info!("---> found items : {}", items.len());

        let adapter = Arc::clone(&self.adapter);
        let details = self
            .pool
            .run_all(items, move |item| {
                let adapter = Arc::clone(&adapter);
                async move { adapter.extract_detail(item).await }
            })
            .await;
        self.stats.add_failed(details.iter().filter(|detail| detail.is_none()).count());

        let records: Vec<A::Record> = details.into_iter().flatten().flatten().collect();
        let records = dedupe_by(records, |record| record.id().to_string());

        let stem = stamped_stem(destination, &self.stamp);
        let written = self.write(records, &stem).await;
        tracing::info!("---> stored {} records in {}", written, stem);
        written
    }

    /// Appends to every sink; a failing sink does not stop the others
    async fn write(&self, records: Vec<A::Record>, stem: &str) -> usize {
        if records.is_empty() {
            return 0;
        }

        let records = Arc::new(records);
        let mut failed = false;
        for sink in &self.sinks {
            let name = sink.name().to_string();
            let sink = Arc::clone(sink);
            let batch = Arc::clone(&records);
            let target = stem.to_string();
            match tokio::task::spawn_blocking(move || sink.append(&batch, &target)).await {
                Ok(Ok(appended)) => tracing::debug!("{} sink appended {} records", name, appended),
                Ok(Err(e)) => {
                    failed = true;
                    tracing::warn!(sink = %name, destination = %stem, "Write failed: {}", e);
                }
                Err(e) => {
                    failed = true;
                    tracing::warn!(sink = %name, destination = %stem, "Write task aborted: {}", e);
                }
            }
        }

        if failed {
            self.stats.add_failed_store();
            return 0;
        }
        self.stats.add_written(records.len());
        records.len()
    }
}
