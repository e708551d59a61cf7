//! Sitemap discovery
//!
//! Seeds the frontier from `/sitemap.xml` (with a fallback probe list),
//! recursing into nested sitemap indexes under the crawl's rate limiter.
//! Parsing is namespace-tolerant: elements are matched on local names, so
//! prefixed, default-namespaced, and bare documents all work. When the XML
//! is malformed, a permissive text scan for `<loc>` spans takes over.
//! Every failure here is logged and swallowed - a site without a usable
//! sitemap is crawled from its seed URL alone.

use crate::crawler::headers::UserAgentPool;
use crate::limiter::AdaptiveRateLimiter;
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::io::Read;
use std::sync::{Arc, OnceLock};
use url::Url;

/// Probed in order when `/sitemap.xml` is not a 200
const FALLBACK_PATHS: &[&str] = &[
    "/sitemap_index.xml",
    "/sitemap.php",
    "/sitemap_index.xml.gz",
    "/sitemap.xml.gz",
];

/// Upper bound on nested sitemap fetches per discovery pass
const MAX_NESTED_SITEMAPS: usize = 50;

fn loc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<loc[^>]*>(.*?)</loc>").unwrap())
}

/// Fetches and parses sitemaps for one base URL
pub struct SitemapDiscovery {
    client: Client,
    agents: Arc<UserAgentPool>,
    limiter: Arc<AdaptiveRateLimiter>,
    base: Url,
}

impl SitemapDiscovery {
    pub fn new(
        client: Client,
        agents: Arc<UserAgentPool>,
        limiter: Arc<AdaptiveRateLimiter>,
        base: Url,
    ) -> Self {
        Self {
            client,
            agents,
            limiter,
            base,
        }
    }

    /// Collects every page URL the site's sitemaps declare
    pub async fn discover(&self) -> Vec<String> {
        let mut urls = Vec::new();
        let mut nested = Vec::new();

        let Some(root) = self.locate_root().await else {
            tracing::info!("No sitemap found for {}", self.base);
            return urls;
        };

        collect_locs(&root, &mut urls, &mut nested);

        let mut seen: HashSet<String> = HashSet::new();
        while let Some(sitemap_url) = nested.pop() {
            if !seen.insert(sitemap_url.clone()) {
                continue;
            }
            if seen.len() > MAX_NESTED_SITEMAPS {
                tracing::warn!("Nested sitemap limit reached, stopping discovery");
                break;
            }

            self.limiter.acquire(&sitemap_url).await;
            if let Some(content) = self.fetch_sitemap(&sitemap_url).await {
                collect_locs(&content, &mut urls, &mut nested);
            }
        }

        tracing::info!("Sitemap discovery found {} URLs", urls.len());
        urls
    }

    /// Fetches the primary sitemap, probing fallback paths on failure
    async fn locate_root(&self) -> Option<String> {
        let primary = self.base.join("/sitemap.xml").ok()?;
        if let Some(content) = self.fetch_sitemap(primary.as_str()).await {
            return Some(content);
        }

        for path in FALLBACK_PATHS {
            let Ok(candidate) = self.base.join(path) else {
                continue;
            };
            if let Some(content) = self.fetch_sitemap(candidate.as_str()).await {
                tracing::info!("Found alternate sitemap at {}", candidate);
                return Some(content);
            }
        }

        None
    }

    /// Fetches one sitemap document, gunzipping `.gz` URLs
    async fn fetch_sitemap(&self, url: &str) -> Option<String> {
        let headers = self.agents.headers(Some(self.base.as_str()));
        let response = match self.client.get(url).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Sitemap fetch error for {}: {}", url, e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!("Sitemap not available: {} (HTTP {})", url, response.status());
            return None;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Sitemap body error for {}: {}", url, e);
                return None;
            }
        };

        if url.ends_with(".gz") {
            gunzip(&body).or_else(|| {
                tracing::warn!("Failed to decompress sitemap {}", url);
                None
            })
        } else {
            Some(String::from_utf8_lossy(&body).into_owned())
        }
    }
}

/// Extracts `<loc>` values, splitting page URLs from nested sitemaps
///
/// Tries a proper XML parse first; on any XML error falls back to a
/// permissive text scan where `.xml`-shaped spans count as nested sitemaps.
fn collect_locs(content: &str, urls: &mut Vec<String>, nested: &mut Vec<String>) {
    if parse_xml_locs(content, urls, nested) {
        return;
    }

    tracing::warn!("Sitemap XML parse failed, falling back to text scan");
    for caps in loc_regex().captures_iter(content) {
        let loc = caps[1].trim().to_string();
        if loc.is_empty() {
            continue;
        }
        if loc.ends_with(".xml") || loc.ends_with(".xml.gz") || loc.contains(".xml?") {
            nested.push(loc);
        } else {
            urls.push(loc);
        }
    }
}

/// Namespace-tolerant XML pass; returns false when the document is not
/// well-formed so the caller can fall back
///
/// Results are committed only when the whole document parses, so a partial
/// parse followed by the text fallback cannot double-count URLs.
fn parse_xml_locs(content: &str, urls: &mut Vec<String>, nested: &mut Vec<String>) -> bool {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut found_urls = Vec::new();
    let mut found_nested = Vec::new();
    let mut found_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                found_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                if stack.last().map(String::as_str) == Some("loc") {
                    let text = match t.unescape() {
                        Ok(text) => text.trim().to_string(),
                        Err(_) => continue,
                    };
                    if text.is_empty() {
                        continue;
                    }
                    let parent = stack
                        .len()
                        .checked_sub(2)
                        .and_then(|i| stack.get(i))
                        .map(String::as_str);
                    match parent {
                        Some("sitemap") => found_nested.push(text),
                        Some("url") => found_urls.push(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => {
                if found_root {
                    urls.append(&mut found_urls);
                    nested.append(&mut found_nested);
                    return true;
                }
                return false;
            }
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Decompresses a gzip payload to text
fn gunzip(payload: &[u8]) -> Option<String> {
    let mut decoder = GzDecoder::new(payload);
    let mut out = String::new();
    decoder.read_to_string(&mut out).ok()?;
    Some(out)
}
