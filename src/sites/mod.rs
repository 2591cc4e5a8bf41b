//! Site adapters
//!
//! Each retailer is walked as a four-level hierarchy: roots (markets or
//! cities), stores, listings (pages or collections) and items. An adapter
//! knows how to discover each level and how to turn an item into a flat
//! record; the orchestrator owns traversal, fan-out and writing.
//!
//! Every level is its own type and carries copies of its ancestors' fields,
//! so a record can always be built from the item alone.

pub mod bringo;
pub mod glovo;
pub mod markup;

use crate::config::Config;
use crate::crawler::browser::{BrowserLauncher, BrowserOptions};
use crate::crawler::{ProxyRotator, ResilientFetcher, RetryPolicy};
use crate::storage::Record;
use crate::{ExtractResult, FetchError};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

pub use bringo::BringoAdapter;
pub use glovo::GlovoAdapter;

/// Capability set of one retailer
#[async_trait]
pub trait SiteAdapter: Send + Sync + 'static {
    type Root: Clone + Send + Sync + 'static;
    type Store: Clone + Send + Sync + 'static;
    type Listing: Clone + Send + Sync + 'static;
    type Item: Clone + Send + Sync + 'static;
    type Record: Record;

    /// Short site name; also the results sub-folder
    fn name(&self) -> &str;

    /// All roots of a full run
    async fn discover_roots(&self) -> crate::Result<Vec<Self::Root>>;

    /// A single root addressed directly by URL
    async fn root_from_url(&self, _url: &str) -> crate::Result<Option<Self::Root>> {
        Ok(None)
    }

    /// Name compared against earlier output when the whole root maps to
    /// one destination
    fn root_key(&self, _root: &Self::Root) -> Option<String> {
        None
    }

    /// Output entity (file stem before the stamp) for a store's records
    fn destination(&self, root: &Self::Root, store: &Self::Store) -> String;

    async fn discover_stores(&self, root: &Self::Root) -> crate::Result<Vec<Self::Store>>;

    async fn discover_listings(&self, store: &Self::Store) -> crate::Result<Vec<Self::Listing>>;

    /// Items linked from one listing page
    async fn extract_listing(&self, listing: Self::Listing) -> ExtractResult<Vec<Self::Item>>;

    /// The record for one item; `None` when its page is gone
    async fn extract_detail(&self, item: Self::Item) -> ExtractResult<Option<Self::Record>>;
}

/// Resources shared by every adapter of one run
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub rotator: Arc<ProxyRotator>,
    pub retry: RetryPolicy,
    pub browser: BrowserOptions,
    /// Delay and bounds for re-launching a browser that failed to start
    pub provision: RetryPolicy,
}

impl SiteContext {
    pub fn from_config(config: &Config, rotator: Arc<ProxyRotator>) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let provision = RetryPolicy {
            max_attempts: retry.max_attempts,
            max_elapsed: retry.max_elapsed,
            ..RetryPolicy::fixed(config.browser.provision_delay())
        };
        Self {
            rotator,
            retry,
            browser: BrowserOptions::from(&config.browser),
            provision,
        }
    }

    pub fn fetcher(&self, base_url: &str, timeout: Duration) -> Result<ResilientFetcher, FetchError> {
        ResilientFetcher::new(base_url, timeout, Arc::clone(&self.rotator), self.retry.clone())
    }

    pub fn launcher(&self) -> BrowserLauncher {
        BrowserLauncher::new(self.browser.clone(), Arc::clone(&self.rotator))
    }
}

/// Content hash identifying a product: sha256 of `"{name}_{image}"`, hex
pub fn product_id(name: &str, image: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", name, image).as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time, ISO-8601 with a `Z` suffix
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
