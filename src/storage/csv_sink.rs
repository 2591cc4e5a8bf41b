//! CSV destination
//!
//! One file per destination under the site's results folder. The header is
//! written only when the file is created.

use crate::storage::traits::{Record, RecordSink, SinkError, SinkResult};
use csv::WriterBuilder;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct CsvSink {
    folder: PathBuf,
    // Serializes appends so rows from concurrent batches never interleave
    lock: Mutex<()>,
}

impl CsvSink {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn path_for(&self, destination: &str) -> PathBuf {
        self.folder.join(format!("{}.csv", destination))
    }
}

impl<R: Record> RecordSink<R> for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, records: &[R], destination: &str) -> SinkResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|e| SinkError::Poisoned(e.to_string()))?;

        fs::create_dir_all(&self.folder)?;
        let path = self.path_for(destination);
        let is_new = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(R::COLUMNS)?;
        }
        for record in records {
            writer.write_record(record.values())?;
        }
        writer.flush()?;

        tracing::debug!("Appended {} rows to {}", records.len(), path.display());
        Ok(records.len())
    }
}
