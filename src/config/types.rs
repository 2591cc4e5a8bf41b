use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Grocery-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
    pub bringo: Option<BringoConfig>,
    pub glovo: Option<GlovoConfig>,
}

/// Scheduling and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Maximum number of concurrent units of work per fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Optional ceiling on the wall-clock time of one unit of work
    pub item_timeout_secs: Option<u64>,

    /// Pause between two complete runs
    #[serde(default = "default_run_interval_hours")]
    pub run_interval_hours: u64,

    /// Pause before retrying a run that failed
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// Plain-text proxy list, one address per line
    pub proxies_path: Option<PathBuf>,
}

/// Fetch retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Delay after a retryable HTTP status (milliseconds)
    #[serde(default = "default_status_delay_ms")]
    pub status_delay_ms: u64,

    /// Delay after a network error (milliseconds)
    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,

    /// Give up after this many attempts (unbounded when absent)
    pub max_attempts: Option<u32>,

    /// Give up once this much time has passed (unbounded when absent)
    pub max_elapsed_secs: Option<u64>,
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Upper bound for wait-until conditions
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Delay between two provisioning attempts
    #[serde(default = "default_provision_delay_secs")]
    pub provision_delay_secs: u64,

    /// Chrome/Chromium binary; auto-detected when absent
    pub executable: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Folder receiving one CSV subfolder per site
    pub results_dir: PathBuf,

    /// Path to the SQLite database file
    pub database_path: Option<PathBuf>,
}

/// Bringo: market -> store -> page -> product
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BringoConfig {
    #[serde(default = "default_bringo_base_url")]
    pub base_url: String,

    /// Delivery address typed into the location form
    pub address: String,

    /// Street number / floor typed next to the address
    pub street_number: String,

    #[serde(default = "default_bringo_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite table receiving the records, if any
    pub table: Option<String>,
}

/// Glovo: city -> category -> store -> collection -> product
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlovoConfig {
    #[serde(default = "default_glovo_base_url")]
    pub base_url: String,

    #[serde(default = "default_glovo_cities_url")]
    pub cities_url: String,

    /// A category is scraped when its URL or name contains one of these
    #[serde(default = "default_glovo_keywords")]
    pub category_keywords: Vec<String>,

    /// Bubbles whose label contains one of these are never expanded
    #[serde(default = "default_glovo_excluded_bubbles")]
    pub excluded_bubbles: Vec<String>,

    #[serde(default = "default_glovo_timeout_secs")]
    pub request_timeout_secs: u64,

    /// SQLite table receiving the records, if any
    pub table: Option<String>,
}

impl ScraperConfig {
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }
}

impl BrowserConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn provision_delay(&self) -> Duration {
        Duration::from_secs(self.provision_delay_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            item_timeout_secs: None,
            run_interval_hours: default_run_interval_hours(),
            restart_delay_secs: default_restart_delay_secs(),
            proxies_path: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            status_delay_ms: default_status_delay_ms(),
            error_delay_ms: default_error_delay_ms(),
            max_attempts: None,
            max_elapsed_secs: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            wait_timeout_secs: default_wait_timeout_secs(),
            provision_delay_secs: default_provision_delay_secs(),
            executable: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    30
}

fn default_run_interval_hours() -> u64 {
    24
}

fn default_restart_delay_secs() -> u64 {
    30
}

fn default_status_delay_ms() -> u64 {
    10_000
}

fn default_error_delay_ms() -> u64 {
    20_000
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1600
}

fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_provision_delay_secs() -> u64 {
    5
}

fn default_bringo_base_url() -> String {
    "https://www.bringo.ma".to_string()
}

fn default_bringo_timeout_secs() -> u64 {
    20
}

fn default_glovo_base_url() -> String {
    "https://glovoapp.com".to_string()
}

fn default_glovo_cities_url() -> String {
    "https://glovoapp.com/ma/fr/map/villes/".to_string()
}

fn default_glovo_keywords() -> Vec<String> {
    ["super", "marjane", "mfccas", "carrefour", "march"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_glovo_excluded_bubbles() -> Vec<String> {
    vec!["Service".to_string(), "Coursier".to_string()]
}

fn default_glovo_timeout_secs() -> u64 {
    10
}
