use crate::config::types::{
    BringoConfig, BrowserConfig, Config, GlovoConfig, OutputConfig, RetryConfig, ScraperConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_retry_config(&config.retry)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;

    if config.bringo.is_none() && config.glovo.is_none() {
        return Err(ConfigError::Validation(
            "at least one of [bringo] or [glovo] must be configured".to_string(),
        ));
    }

    if let Some(bringo) = &config.bringo {
        validate_bringo_config(bringo)?;
    }
    if let Some(glovo) = &config.glovo {
        validate_glovo_config(glovo)?;
    }

    Ok(())
}

fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 200 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 200, got {}",
            config.max_concurrency
        )));
    }

    if config.item_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "item-timeout-secs must be > 0 when set".to_string(),
        ));
    }

    if config.run_interval_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "run-interval-hours must be >= 1, got {}",
            config.run_interval_hours
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts == Some(0) {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.window_width < 320 || config.window_height < 240 {
        return Err(ConfigError::Validation(format!(
            "browser window {}x{} is too small",
            config.window_width, config.window_height
        )));
    }

    if config.wait_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "wait-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.results_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "results-dir cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.database_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "database-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_bringo_config(config: &BringoConfig) -> Result<(), ConfigError> {
    validate_base_url("bringo.base-url", &config.base_url)?;

    if config.address.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bringo.address cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "bringo.request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(table) = &config.table {
        validate_table_name(table)?;
    }

    Ok(())
}

fn validate_glovo_config(config: &GlovoConfig) -> Result<(), ConfigError> {
    validate_base_url("glovo.base-url", &config.base_url)?;
    validate_base_url("glovo.cities-url", &config.cities_url)?;

    if config.category_keywords.is_empty() {
        return Err(ConfigError::Validation(
            "glovo.category-keywords must list at least one keyword".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "glovo.request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(table) = &config.table {
        validate_table_name(table)?;
    }

    Ok(())
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", key, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            key, value
        )));
    }

    Ok(())
}

/// Table names are interpolated into DDL, so only identifiers pass
fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(ConfigError::Validation(format!(
            "table name '{}' must be an identifier ([A-Za-z_][A-Za-z0-9_]*)",
            table
        )));
    }

    Ok(())
}
