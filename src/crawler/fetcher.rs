//! HTTP fetch pipeline
//!
//! One `fetch` call drives the full retry state machine for a URL: header
//! rotation, proxy selection and failover, exponential backoff, manual
//! redirect handling, and MIME-routed content extraction. Redirects are not
//! followed automatically - the orchestrator re-enqueues redirect targets so
//! they pass back through admissibility checks at the correct depth.

use crate::crawler::headers::UserAgentPool;
use crate::extract::{Document, ExtractorSet};
use crate::proxy::{ProxyEndpoint, ProxyPool};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Terminal result of fetching one URL
#[derive(Debug)]
pub enum FetchResult {
    /// 200 response with extracted content
    Success {
        status_code: u16,
        content_type: String,
        elapsed: Duration,
        document: Document,
    },

    /// 3xx response; the target should re-enter the frontier at the same
    /// depth as the redirecting URL
    Redirected { target: Url },

    /// Terminal error for this URL (client error, or transport failure on
    /// the last attempt)
    Failed {
        status_code: Option<u16>,
        error: String,
        elapsed: Duration,
    },

    /// All retries spent, or a redirect without a usable Location; the
    /// caller counts this as a failed attempt
    Abandoned,
}

/// Fetch pipeline configuration, snapshotted from the crawl options
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub max_retries: u32,
    pub backoff_factor: f64,
    /// Sent as the Referer header on every request
    pub referer: String,
}

/// Issues HTTP requests with retry, backoff, and proxy failover
pub struct Fetcher {
    direct: Client,
    /// One client per proxy endpoint; reqwest binds proxies at build time
    proxied: Mutex<HashMap<String, Client>>,
    agents: Arc<UserAgentPool>,
    proxies: Option<Arc<ProxyPool>>,
    extractors: ExtractorSet,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(
        config: FetchConfig,
        agents: Arc<UserAgentPool>,
        proxies: Option<Arc<ProxyPool>>,
        extractors: ExtractorSet,
    ) -> Result<Self, reqwest::Error> {
        let direct = build_client(&config, None)?;
        Ok(Self {
            direct,
            proxied: Mutex::new(HashMap::new()),
            agents,
            proxies,
            extractors,
            config,
        })
    }

    /// A client without a proxy, for auxiliary requests (sitemaps)
    pub fn direct_client(&self) -> Client {
        self.direct.clone()
    }

    /// Runs the retry state machine for one URL
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut proxy = match &self.proxies {
            Some(pool) => pool.next_proxy(None).await,
            None => None,
        };

        for attempt in 0..self.config.max_retries {
            let client = match self.client_for(proxy.as_ref()) {
                Ok(client) => client,
                Err(e) => {
                    // A proxy endpoint reqwest refuses to configure is as
                    // good as failed; fall back to direct
                    tracing::warn!("Failed to build client for proxy: {}", e);
                    if let (Some(pool), Some(endpoint)) = (&self.proxies, proxy.as_ref()) {
                        pool.mark_failed(endpoint);
                    }
                    proxy = None;
                    self.direct.clone()
                }
            };

            let headers = self.agents.headers(Some(&self.config.referer));
            let started = Instant::now();

            let response = client.get(url.clone()).headers(headers).send().await;
            let elapsed = started.elapsed();

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::OK {
                        let content_type = response
                            .headers()
                            .get(reqwest::header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_lowercase();

                        let body = match response.bytes().await {
                            Ok(body) => body,
                            Err(e) => {
                                tracing::warn!("Body read failed for {}: {}", url, e);
                                proxy = self.fail_over(proxy).await;
                                if attempt + 1 < self.config.max_retries {
                                    self.backoff(attempt, false).await;
                                    continue;
                                }
                                return FetchResult::Failed {
                                    status_code: None,
                                    error: e.to_string(),
                                    elapsed,
                                };
                            }
                        };

                        if let (Some(pool), Some(endpoint)) = (&self.proxies, proxy.as_ref()) {
                            pool.mark_success(endpoint);
                        }

                        let document = self.extractors.extract(&body, &content_type, url);
                        return FetchResult::Success {
                            status_code: status.as_u16(),
                            content_type,
                            elapsed,
                            document,
                        };
                    }

                    if status.is_redirection() && REDIRECT_CODES.contains(&status.as_u16()) {
                        let location = response
                            .headers()
                            .get(reqwest::header::LOCATION)
                            .and_then(|v| v.to_str().ok());

                        return match location.and_then(|loc| url.join(loc).ok()) {
                            Some(target) => {
                                tracing::info!("Redirect: {} -> {}", url, target);
                                FetchResult::Redirected { target }
                            }
                            None => {
                                tracing::debug!("Dropping redirect without Location: {}", url);
                                FetchResult::Abandoned
                            }
                        };
                    }

                    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                        tracing::warn!("Blocked or rate limited: {} (HTTP {})", url, status);
                        proxy = self.fail_over(proxy).await;
                        self.backoff(attempt, true).await;
                        continue;
                    }

                    if status.is_server_error() {
                        tracing::warn!("Server error: {} (HTTP {})", url, status);
                        self.backoff(attempt, false).await;
                        continue;
                    }

                    // Any other non-redirect status is terminal for this URL
                    tracing::warn!("HTTP error: {} (HTTP {})", url, status);
                    return FetchResult::Failed {
                        status_code: Some(status.as_u16()),
                        error: format!("HTTP {}", status.as_u16()),
                        elapsed,
                    };
                }

                Err(e) => {
                    tracing::warn!("Request error for {}: {}", url, e);
                    proxy = self.fail_over(proxy).await;

                    if attempt + 1 < self.config.max_retries {
                        self.backoff(attempt, false).await;
                        continue;
                    }

                    return FetchResult::Failed {
                        status_code: None,
                        error: e.to_string(),
                        elapsed,
                    };
                }
            }
        }

        FetchResult::Abandoned
    }

    /// Marks the current proxy failed and draws a replacement
    async fn fail_over(&self, current: Option<ProxyEndpoint>) -> Option<ProxyEndpoint> {
        let pool = self.proxies.as_ref()?;
        if let Some(endpoint) = current {
            pool.mark_failed(&endpoint);
        }
        pool.next_proxy(None).await
    }

    async fn backoff(&self, attempt: u32, penalized: bool) {
        let delay = backoff_delay(self.config.backoff_factor, attempt, penalized);
        tracing::info!("Retrying in {:.1}s (attempt {})", delay.as_secs_f64(), attempt + 1);
        tokio::time::sleep(delay).await;
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, reqwest::Error> {
        let Some(endpoint) = proxy else {
            return Ok(self.direct.clone());
        };

        let key = endpoint.proxy_url();
        if let Some(client) = self.proxied.lock().unwrap().get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(&self.config, Some(endpoint))?;
        self.proxied.lock().unwrap().insert(key, client.clone());
        Ok(client)
    }
}

const REDIRECT_CODES: &[u16] = &[301, 302, 303, 307, 308];

/// Exponential backoff; 403/429 retries add a linear penalty on top
fn backoff_delay(factor: f64, attempt: u32, penalized: bool) -> Duration {
    let mut seconds = factor * 2f64.powi(attempt as i32);
    if penalized {
        seconds += (attempt + 1) as f64;
    }
    Duration::from_secs_f64(seconds)
}

fn build_client(
    config: &FetchConfig,
    proxy: Option<&ProxyEndpoint>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .danger_accept_invalid_certs(!config.verify_ssl)
        .gzip(true)
        .brotli(true);

    if let Some(endpoint) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(endpoint.proxy_url())?);
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0.5, 0, false), Duration::from_secs_f64(0.5));
        assert_eq!(backoff_delay(0.5, 1, false), Duration::from_secs_f64(1.0));
        assert_eq!(backoff_delay(0.5, 2, false), Duration::from_secs_f64(2.0));
    }

    #[test]
    fn test_penalized_backoff_adds_linear_term() {
        assert_eq!(backoff_delay(0.5, 0, true), Duration::from_secs_f64(1.5));
        assert_eq!(backoff_delay(0.5, 1, true), Duration::from_secs_f64(3.0));
    }

    #[test]
    fn test_build_client_direct_and_proxied() {
        let config = FetchConfig {
            timeout: Duration::from_secs(5),
            verify_ssl: false,
            max_retries: 3,
            backoff_factor: 0.5,
            referer: "http://example.com/".to_string(),
        };
        assert!(build_client(&config, None).is_ok());

        let endpoint = ProxyEndpoint::parse("127.0.0.1:8080").unwrap();
        assert!(build_client(&config, Some(&endpoint)).is_ok());
    }
}
