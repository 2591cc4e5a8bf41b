//! Grocery-Harvest: a resilient grocery catalog harvester
//!
//! This crate walks the category/store/product hierarchy of grocery-delivery
//! sites, retrying unreliable endpoints, fanning out work over a bounded
//! worker pool and appending flat product records to CSV files and an
//! optional SQLite table.

pub mod config;
pub mod crawler;
pub mod output;
pub mod sites;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Grocery-Harvest operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while building HTTP clients
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid proxy '{proxy}': {source}")]
    Proxy {
        proxy: String,
        source: reqwest::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        source: ::url::ParseError,
    },
}

/// Headless browser errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Browser config error: {0}")]
    Config(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Timed out after {timeout_secs}s waiting for {condition}")]
    WaitTimeout {
        condition: String,
        timeout_secs: u64,
    },

    #[error("Script evaluation error: {0}")]
    Script(String),

    #[error("Cookie {0} not set by the site")]
    MissingCookie(String),

    #[error("Invalid handshake transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::HandshakeState,
        to: state::HandshakeState,
    },
}

/// Errors produced while extracting entities from fetched markup
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Missing element '{selector}' on {url}")]
    MissingElement { selector: String, url: String },

    #[error("Missing attribute '{attribute}' on '{selector}' at {url}")]
    MissingAttribute {
        selector: String,
        attribute: String,
        url: String,
    },

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Result type alias for Grocery-Harvest operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for browser operations
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Result type alias for extraction operations
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchResult, ResilientFetcher, RetryPolicy, ScrapeOrchestrator, WorkerPool};
pub use sites::{product_id, SiteAdapter};
pub use storage::{dedupe_by, Record, RecordSink};
