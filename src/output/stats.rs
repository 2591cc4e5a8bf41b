//! Run statistics
//!
//! Counters are shared between the orchestrator and its worker tasks, so
//! they are plain atomics. A `RunSummary` is a snapshot taken at the end.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one site run
#[derive(Debug)]
pub struct RunStats {
    site: String,
    started: Instant,
    roots: AtomicU64,
    skipped: AtomicU64,
    stores: AtomicU64,
    listings: AtomicU64,
    items: AtomicU64,
    records_written: AtomicU64,
    failed_listings: AtomicU64,
    failed_items: AtomicU64,
    failed_stores: AtomicU64,
}

impl RunStats {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            started: Instant::now(),
            roots: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            listings: AtomicU64::new(0),
            items: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            failed_listings: AtomicU64::new(0),
            failed_items: AtomicU64::new(0),
            failed_stores: AtomicU64::new(0),
        }
    }

    pub fn add_roots(&self, n: usize) {
        self.roots.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stores(&self, n: usize) {
        self.stores.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_listings(&self, n: usize) {
        self.listings.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_items(&self, n: usize) {
        self.items.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_written(&self, n: usize) {
        self.records_written.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_failed(&self, n: usize) {
        self.failed_items.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn add_failed_listings(&self, n: usize) {
        self.failed_listings.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// A store whose records could not be written to some sink
    pub fn add_failed_store(&self) {
        self.failed_stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            site: self.site.clone(),
            elapsed: self.started.elapsed(),
            roots: self.roots.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            listings: self.listings.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            failed_listings: self.failed_listings.load(Ordering::Relaxed),
            failed_items: self.failed_items.load(Ordering::Relaxed),
            failed_stores: self.failed_stores.load(Ordering::Relaxed),
        }
    }
}

/// Counts for one finished site run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub site: String,
    pub elapsed: Duration,
    pub roots: u64,
    pub skipped: u64,
    pub stores: u64,
    pub listings: u64,
    pub items: u64,
    pub records_written: u64,
    pub failed_listings: u64,
    pub failed_items: u64,
    pub failed_stores: u64,
}

impl RunSummary {
    /// Share of discovered items that produced a record
    pub fn success_rate(&self) -> f64 {
        if self.items == 0 {
            return 0.0;
        }
        (self.items.saturating_sub(self.failed_items) as f64 / self.items as f64) * 100.0
    }

    pub fn log(&self) {
        tracing::info!(
            site = %self.site,
            roots = self.roots,
            skipped = self.skipped,
            stores = self.stores,
            listings = self.listings,
            items = self.items,
            written = self.records_written,
            failed_listings = self.failed_listings,
            failed = self.failed_items,
            failed_stores = self.failed_stores,
            "Run finished in {:.1}s",
            self.elapsed.as_secs_f64()
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.site)?;
        writeln!(
            f,
            "  Roots: {} ({} entities skipped as already scraped)",
            self.roots, self.skipped
        )?;
        writeln!(f, "  Stores: {}", self.stores)?;
        writeln!(f, "  Listings: {} ({} failed)", self.listings, self.failed_listings)?;
        writeln!(f, "  Items: {} ({} failed)", self.items, self.failed_items)?;
        writeln!(
            f,
            "  Records written: {} ({} stores failed to write)",
            self.records_written, self.failed_stores
        )?;
        write!(
            f,
            "  Success rate: {:.1}% in {:.1}s",
            self.success_rate(),
            self.elapsed.as_secs_f64()
        )
    }
}

/// Prints summaries to stdout
pub fn print_summary(summaries: &[RunSummary]) {
    for summary in summaries {
        println!("{}\n", summary);
    }
}
