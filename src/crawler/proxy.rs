//! Round-robin proxy rotation
//!
//! The cursor is shared by every fetcher and browser launch in the process,
//! so consecutive requests (including retries of the same request) leave
//! through different proxies.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A proxy address as written in the proxies file (e.g. `http://1.2.3.4:8080`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyEndpoint(String);

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out proxies in order, wrapping around at the end of the list
#[derive(Debug, Default)]
pub struct ProxyRotator {
    endpoints: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    /// A rotator with no proxies; every request goes out directly
    pub fn direct() -> Self {
        Self::default()
    }

    /// Loads the proxies file; a missing file means no proxies
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            tracing::info!("Proxy file {} not found, using direct connections", path.display());
            return Ok(Self::direct());
        }

        let content = std::fs::read_to_string(path)?;
        let endpoints = parse_proxy_list(&content);
        tracing::info!("Loaded {} proxies from {}", endpoints.len(), path.display());
        Ok(Self::new(endpoints))
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Index of the next proxy, or `None` when the list is empty
    pub fn next_index(&self) -> Option<usize> {
        if self.endpoints.is_empty() {
            return None;
        }
        // Relaxed is enough: only the modular position matters
        Some(self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len())
    }

    /// The next proxy in rotation
    pub fn next(&self) -> Option<&ProxyEndpoint> {
        self.next_index().map(|i| &self.endpoints[i])
    }
}

/// Parses a proxies file: one address per line, blank lines and commas dropped
pub fn parse_proxy_list(content: &str) -> Vec<ProxyEndpoint> {
    content
        .lines()
        .map(|line| line.trim().replace(',', ""))
        .filter(|line| !line.is_empty())
        .map(ProxyEndpoint::new)
        .collect()
}
