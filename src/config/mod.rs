//! Configuration loading and validation
//!
//! Configuration is read from a TOML file into serde structs with defaults,
//! so a partial (or absent) file still yields a usable configuration. A
//! SHA-256 hash of the file content is stored with each crawl session to
//! detect configuration drift between runs.

mod parser;
mod types;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    Config, CrawlerConfig, ExtractConfig, FrontierConfig, OutputConfig, ProxyConfig,
};
