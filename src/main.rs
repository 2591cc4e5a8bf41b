//! Grocery-Harvest main entry point
//!
//! This is the command-line interface for the grocery catalog harvester.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use grocery_harvest::config::{load_config_with_hash, Config};
use grocery_harvest::crawler::{run_forever, run_once, RunOptions, SiteSelection};
use grocery_harvest::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Grocery-Harvest: a resilient grocery catalog harvester
///
/// Walks the market, store and product listings of grocery-delivery sites
/// through rotating proxies and appends every product to per-store CSV
/// files (and optionally a SQLite table).
#[derive(Parser, Debug)]
#[command(name = "grocery-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient grocery catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Site to scrape
    #[arg(long, value_enum, default_value_t = SiteArg::All)]
    site: SiteArg,

    /// Scrape only the root (e.g. a city page) at this URL
    #[arg(long, value_name = "URL")]
    root_url: Option<String>,

    /// Run once instead of repeating every `run-interval-hours`
    #[arg(long)]
    once: bool,

    /// Validate config and show what would be scraped without scraping
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SiteArg {
    Bringo,
    Glovo,
    All,
}

impl From<SiteArg> for SiteSelection {
    fn from(arg: SiteArg) -> Self {
        match arg {
            SiteArg::Bringo => SiteSelection::Bringo,
            SiteArg::Glovo => SiteSelection::Glovo,
            SiteArg::All => SiteSelection::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.root_url.is_some() && cli.site == SiteArg::All {
        anyhow::bail!("--root-url needs a single --site");
    }

    let options = RunOptions {
        sites: cli.site.into(),
        root_url: cli.root_url,
        stamp: None,
    };

    if cli.dry_run {
        handle_dry_run(&config, &options);
    } else if cli.once || options.root_url.is_some() {
        let summaries = run_once(&config, &options).await?;
        print_summary(&summaries);
    } else {
        run_forever(&config, &options).await;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("grocery_harvest=info,warn"),
            1 => EnvFilter::new("grocery_harvest=debug,info"),
            2 => EnvFilter::new("grocery_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what a run would do
fn handle_dry_run(config: &Config, options: &RunOptions) {
    println!("=== Grocery-Harvest Dry Run ===\n");

    println!("Scraper:");
    println!("  Max concurrency: {}", config.scraper.max_concurrency);
    match config.scraper.item_timeout() {
        Some(timeout) => println!("  Item timeout: {}s", timeout.as_secs()),
        None => println!("  Item timeout: none"),
    }
    println!("  Run interval: {}h", config.scraper.run_interval_hours);
    match &config.scraper.proxies_path {
        Some(path) => println!("  Proxies: {}", path.display()),
        None => println!("  Proxies: direct connections"),
    }

    println!("\nRetry:");
    println!("  Status delay: {}ms", config.retry.status_delay_ms);
    println!("  Error delay: {}ms", config.retry.error_delay_ms);
    match config.retry.max_attempts {
        Some(n) => println!("  Max attempts: {}", n),
        None => println!("  Max attempts: unbounded"),
    }

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!(
        "  Window: {}x{}",
        config.browser.window_width, config.browser.window_height
    );

    println!("\nOutput:");
    println!("  Results: {}", config.output.results_dir.display());
    if let Some(path) = &config.output.database_path {
        println!("  Database: {}", path.display());
    }

    println!("\nSites:");
    if options.sites.includes_bringo() {
        match &config.bringo {
            Some(bringo) => println!(
                "  - bringo: {} (address: {} {})",
                bringo.base_url, bringo.street_number, bringo.address
            ),
            None => println!("  - bringo: not configured"),
        }
    }
    if options.sites.includes_glovo() {
        match &config.glovo {
            Some(glovo) => println!(
                "  - glovo: {} (keywords: {})",
                glovo.cities_url,
                glovo.category_keywords.join(", ")
            ),
            None => println!("  - glovo: not configured"),
        }
    }
    if let Some(url) = &options.root_url {
        println!("  Root URL: {}", url);
    }

    println!("\n✓ Configuration is valid");
}
