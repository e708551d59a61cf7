use serde::Deserialize;

/// Main configuration structure for siteglean
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers (also the admission gate size)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-seconds", default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of fetch attempts before a URL is abandoned
    #[serde(rename = "max-retries", default = "default_retries")]
    pub max_retries: u32,

    /// Base factor for exponential retry backoff, in seconds
    #[serde(rename = "backoff-factor", default = "default_backoff")]
    pub backoff_factor: f64,

    /// Verify TLS certificates
    #[serde(rename = "verify-ssl", default = "default_true")]
    pub verify_ssl: bool,

    /// Maximum pages to crawl; 0 means unlimited
    #[serde(rename = "max-pages", default)]
    pub max_pages: u64,

    /// Maximum link depth from the seed; 0 means unlimited
    #[serde(rename = "max-depth", default)]
    pub max_depth: u32,

    /// Initial per-domain rate limit in requests per second
    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: f64,

    /// How many stored links to re-enqueue when resuming a paused crawl
    #[serde(rename = "resume-batch", default = "default_resume_batch")]
    pub resume_batch: usize,

    /// User-Agent strings rotated across requests
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

/// Frontier admissibility configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontierConfig {
    /// Query parameters preserved during URL normalization; all others are
    /// stripped before dedup comparison
    #[serde(rename = "keep-params", default = "default_keep_params")]
    pub keep_params: Vec<String>,
}

/// Proxy pool configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Route requests through the proxy pool
    #[serde(default)]
    pub enabled: bool,

    /// Proxy credentials, `host:port` or `host:port:user:pass`
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Force a round-robin cursor advance every N grants
    #[serde(rename = "rotation-limit", default = "default_rotation_limit")]
    pub rotation_limit: u32,
}

/// Content extraction configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    /// CSS selector for the page's main content block
    #[serde(rename = "main-content-selector", default)]
    pub main_content_selector: Option<String>,

    /// CSS selector for a secondary content block (e.g. a site-wide banner)
    #[serde(rename = "secondary-content-selector", default)]
    pub secondary_content_selector: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout(),
            max_retries: default_retries(),
            backoff_factor: default_backoff(),
            verify_ssl: true,
            max_pages: 0,
            max_depth: 0,
            rate_limit: default_rate_limit(),
            resume_batch: default_resume_batch(),
            user_agents: default_user_agents(),
        }
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            keep_params: default_keep_params(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_backoff() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> f64 {
    0.5
}

fn default_resume_batch() -> usize {
    1000
}

fn default_rotation_limit() -> u32 {
    50
}

fn default_keep_params() -> Vec<String> {
    vec!["id".to_string(), "page".to_string(), "category".to_string()]
}

fn default_database_path() -> String {
    "./siteglean.db".to_string()
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1",
        "Mozilla/5.0 (Linux; Android 10; SM-G973F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Mobile Safari/537.36",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
