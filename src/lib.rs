//! Siteglean: a breadth-first site crawler
//!
//! This crate implements a crawl orchestration engine: a deduplicating URL
//! frontier, a concurrent fetch pipeline with retry/backoff and proxy
//! failover, an adaptive per-domain rate limiter, and a resumable session
//! lifecycle. Content extraction and persistence are consumed through traits
//! with default implementations shipped in-crate.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod limiter;
pub mod proxy;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for siteglean operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crawler is already running")]
    AlreadyRunning,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for siteglean operations
pub type Result<T> = std::result::Result<T, GleanError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOptions, Crawler, EngineStats, StatsSnapshot};
pub use extract::{ContentExtractor, Document, ExtractedLink};
pub use storage::{PageStore, SqliteStore};
pub use url::{normalize_url, url_hash, UrlFrontier};
