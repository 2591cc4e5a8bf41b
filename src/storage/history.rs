//! Output file naming and entities already written
//!
//! Output files are named `<entity>_<YYYY_MM_DD_HH_MM>.csv`, with the stamp
//! fixed once per scheduled run. A run skips an entity only when a file with
//! the exact same stem exists, which happens when the run is restarted after
//! a failure. The next scheduled run has a new stamp and writes everything
//! again.

use std::collections::HashSet;
use std::io;
use std::path::Path;

/// chrono format of the stamp appended to output file stems
pub const STAMP_FORMAT: &str = "%Y_%m_%d_%H_%M";

/// Replaces path separators and control characters in a scraped name
///
/// Store and city names become file names and must not escape the results
/// folder.
pub fn sanitize_entity(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "unnamed".to_string();
    }
    cleaned
}

/// File stem of `entity` for the run stamped `stamp`
pub fn stamped_stem(entity: &str, stamp: &str) -> String {
    format!("{}_{}", sanitize_entity(entity), stamp)
}

/// Stems of the output files in `dir`
///
/// A missing folder yields an empty set.
pub fn existing_entities(dir: &Path) -> io::Result<HashSet<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };

    let mut stems = HashSet::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(stem.to_string());
        }
    }
    Ok(stems)
}
