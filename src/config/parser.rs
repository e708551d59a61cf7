use crate::config::types::Config;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with each crawl session so a resumed crawl can be matched against
/// the configuration it originally ran with.
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

/// Validates semantic constraints the TOML parse cannot express
fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.crawler.concurrency == 0 {
        return Err(ConfigError::Validation(
            "crawler.concurrency must be at least 1".to_string(),
        ));
    }

    if config.crawler.max_retries == 0 {
        return Err(ConfigError::Validation(
            "crawler.max-retries must be at least 1".to_string(),
        ));
    }

    if config.crawler.rate_limit <= 0.0 {
        return Err(ConfigError::Validation(
            "crawler.rate-limit must be positive".to_string(),
        ));
    }

    if config.crawler.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(
            "crawler.backoff-factor must not be negative".to_string(),
        ));
    }

    if config.proxy.enabled && config.proxy.endpoints.is_empty() {
        return Err(ConfigError::Validation(
            "proxy.enabled requires at least one proxy.endpoints entry".to_string(),
        ));
    }

    if config.crawler.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "crawler.user-agents must not be empty".to_string(),
        ));
    }

    Ok(())
}
