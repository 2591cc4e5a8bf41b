//! Sink traits and error types
//!
//! This module defines the row shape shared by every site and the trait
//! implemented by each output destination.

use thiserror::Error;

/// Errors that can occur while appending records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Sink lock poisoned: {0}")]
    Poisoned(String),

    #[error("Sink task failed: {0}")]
    Task(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// A flat, string-valued output row
///
/// Every field is opaque text. `values` must line up with `COLUMNS`.
pub trait Record: Send + Sync + 'static {
    /// Column names in output order
    const COLUMNS: &'static [&'static str];

    /// Content-derived identifier, unique within one batch
    fn id(&self) -> &str;

    /// Field values in `COLUMNS` order
    fn values(&self) -> Vec<&str>;
}

/// An append-only output destination
///
/// Implementations must be safe to share between worker tasks. Appending an
/// empty slice is a no-op. The first append to a destination creates it.
pub trait RecordSink<R: Record>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Appends `records` to `destination`; returns the number of rows written
    fn append(&self, records: &[R], destination: &str) -> SinkResult<usize>;
}
