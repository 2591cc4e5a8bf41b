//! Configuration module for Grocery-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the handful of environment overrides the deployment relies on.
//!
//! # Example
//!
//! ```no_run
//! use grocery_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Results go to {}", config.output.results_dir.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BringoConfig, BrowserConfig, Config, GlovoConfig, OutputConfig, RetryConfig, ScraperConfig,
};

// Re-export parser functions
pub use parser::{
    apply_environment, compute_config_hash, load_config, load_config_with_hash,
    DATABASE_PATH_VAR, ENV_MODE_VAR,
};
