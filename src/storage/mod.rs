//! Storage module for persisting scraped records
//!
//! This module handles everything that leaves the process, including:
//! - Appending flat records to per-entity CSV files
//! - Appending the same records to an optional SQLite table
//! - First-seen deduplication of entity lists
//! - Scanning a results folder for entities scraped by earlier runs

mod csv_sink;
mod history;
mod schema;
mod sqlite;
mod traits;

pub use csv_sink::CsvSink;
pub use history::{existing_entities, sanitize_entity, stamped_stem, STAMP_FORMAT};
pub use sqlite::SqliteSink;
pub use traits::{Record, RecordSink, SinkError, SinkResult};

use std::collections::HashSet;
use std::hash::Hash;

/// Keeps the first item for each key, preserving input order
pub fn dedupe_by<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}
