//! Output module for run summaries
//!
//! This module handles:
//! - Counting entities and failures while a site is being scraped
//! - Rendering the end-of-run summary to the log and to stdout

pub mod stats;

pub use stats::{print_summary, RunStats, RunSummary};
