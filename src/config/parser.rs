use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Environment variable selecting the run mode; `dev` opens a visible browser
pub const ENV_MODE_VAR: &str = "ENV";

/// Environment variable overriding `output.database-path`
pub const DATABASE_PATH_VAR: &str = "GROCERY_DATABASE_PATH";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use grocery_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Concurrency: {}", config.scraper.max_concurrency);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;

    apply_environment(&mut config, |name| std::env::var(name).ok());

    validate(&config)?;

    Ok(config)
}

/// Applies environment overrides using the provided variable lookup
pub fn apply_environment<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(ENV_MODE_VAR).as_deref() == Some("dev") {
        config.browser.headless = false;
    }

    if let Some(path) = lookup(DATABASE_PATH_VAR).filter(|p| !p.is_empty()) {
        config.output.database_path = Some(PathBuf::from(path));
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that runs can be matched to the configuration
/// that produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const FULL_CONFIG: &str = r#"
[scraper]
max-concurrency = 12
item-timeout-secs = 600
proxies-path = "proxies.txt"

[retry]
status-delay-ms = 500
error-delay-ms = 1000
max-attempts = 5

[browser]
headless = true
wait-timeout-secs = 15

[output]
results-dir = "./results"
database-path = "./products.db"

[bringo]
address = "Boulevard Mohamed V, Casablanca"
street-number = "44"

[glovo]
table = "products"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(FULL_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scraper.max_concurrency, 12);
        assert_eq!(config.scraper.run_interval_hours, 24);
        assert_eq!(config.retry.max_attempts, Some(5));
        assert_eq!(config.browser.window_width, 1920);

        let bringo = config.bringo.unwrap();
        assert_eq!(bringo.base_url, "https://www.bringo.ma");
        assert_eq!(bringo.request_timeout_secs, 20);

        let glovo = config.glovo.unwrap();
        assert_eq!(glovo.request_timeout_secs, 10);
        assert_eq!(glovo.table.as_deref(), Some("products"));
        assert!(glovo.category_keywords.contains(&"carrefour".to_string()));
    }

    #[test]
    fn test_defaults_for_minimal_config() {
        let file = create_temp_config(
            r#"
[output]
results-dir = "results"

[glovo]
"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scraper.max_concurrency, 30);
        assert_eq!(config.retry.status_delay_ms, 10_000);
        assert_eq!(config.retry.error_delay_ms, 20_000);
        assert!(config.retry.max_attempts.is_none());
        assert!(config.bringo.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config(
            r#"
[scraper]
max-concurrency = 0

[output]
results-dir = "results"

[glovo]
"#,
        );
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_dev_mode_opens_visible_browser() {
        let file = create_temp_config(FULL_CONFIG);
        let mut config: Config =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();

        apply_environment(&mut config, |name| match name {
            ENV_MODE_VAR => Some("dev".to_string()),
            DATABASE_PATH_VAR => Some("/tmp/override.db".to_string()),
            _ => None,
        });

        assert!(!config.browser.headless);
        assert_eq!(
            config.output.database_path,
            Some(PathBuf::from("/tmp/override.db"))
        );
    }

    #[test]
    fn test_production_mode_keeps_headless() {
        let file = create_temp_config(FULL_CONFIG);
        let mut config: Config =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();

        apply_environment(&mut config, |name| {
            (name == ENV_MODE_VAR).then(|| "production".to_string())
        });

        assert!(config.browser.headless);
        assert_eq!(
            config.output.database_path,
            Some(PathBuf::from("./products.db"))
        );
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
