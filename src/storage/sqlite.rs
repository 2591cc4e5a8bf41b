//! SQLite destination
//!
//! Rows are appended to a single table; the table and its index are created
//! on first use. Transient database errors (busy, locked, I/O) are retried
//! with a fixed delay until the batch lands.

use crate::crawler::retry::{FailureKind, RetryPolicy};
use crate::storage::schema::{create_table_sql, insert_sql, is_valid_identifier};
use crate::storage::traits::{Record, RecordSink, SinkError, SinkResult};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Delay between two attempts of a failed insert
pub const INSERT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// SQLite table sink
pub struct SqliteSink {
    conn: Mutex<Connection>,
    table: String,
    retry: RetryPolicy,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Destination table, created lazily
    pub fn open(path: &Path, table: &str) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        Self::with_connection(conn, table)
    }

    /// Wraps an existing connection (in-memory databases in tests)
    pub fn with_connection(conn: Connection, table: &str) -> SinkResult<Self> {
        if !is_valid_identifier(table) {
            return Err(SinkError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            retry: RetryPolicy::fixed(INSERT_RETRY_DELAY),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of rows currently in the table
    pub fn count(&self) -> SinkResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn lock(&self) -> SinkResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))
    }

    fn insert_batch<R: Record>(
        conn: &mut Connection,
        table: &str,
        records: &[R],
        destination: &str,
    ) -> rusqlite::Result<usize> {
        conn.execute_batch(&create_table_sql(table, R::COLUMNS))?;

        let tx = conn.transaction()?;
        {
            let mut statement = tx.prepare(&insert_sql(table, R::COLUMNS))?;
            for record in records {
                let mut values = record.values();
                values.push(destination);
                statement.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }
}

impl<R: Record> RecordSink<R> for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn append(&self, records: &[R], destination: &str) -> SinkResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let mut retry = self.retry.start();
        loop {
            match Self::insert_batch(&mut conn, &self.table, records, destination) {
                Ok(written) => {
                    tracing::debug!("Inserted {} rows into {}", written, self.table);
                    return Ok(written);
                }
                Err(e) if is_transient(&e) => {
                    tracing::warn!(table = %self.table, error = %e, "Insert failed, retrying");
                    match retry.record_failure(FailureKind::Network) {
                        Some(delay) => std::thread::sleep(delay),
                        None => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_transient(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::DiskFull
        )
    )
}
