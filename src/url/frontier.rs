use crate::url::normalize::{normalize_url, url_hash};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use url::Url;

/// Schemes that can never be fetched over HTTP
const PSEUDO_SCHEMES: &[&str] = &[
    "mailto:",
    "tel:",
    "sms:",
    "whatsapp:",
    "intent:",
    "javascript:",
];

/// Binary/asset extensions that are never worth a GET
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".ico", ".svg", ".woff", ".woff2", ".ttf",
    ".eot",
];

fn extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Trailing ".ext" in the final path segment; dots elsewhere don't count
    RE.get_or_init(|| Regex::new(r"\.([^./]+)$").unwrap())
}

/// The URL frontier's dedup and admissibility state
///
/// Tracks two parallel visited sets (normalized strings and their hashes)
/// behind one mutex so check-and-insert is atomic: two workers racing the
/// same URL through `admissible` / `mark_visited` can never both fetch it.
pub struct UrlFrontier {
    base_host: String,
    keep_params: HashSet<String>,
    visited: Mutex<VisitedSets>,
}

#[derive(Default)]
struct VisitedSets {
    urls: HashSet<String>,
    hashes: HashSet<String>,
}

impl UrlFrontier {
    /// Creates a frontier scoped to the host of `base_url`
    pub fn new(base_url: &Url, keep_params: Vec<String>) -> Self {
        let base_host = base_url.host_str().unwrap_or_default().to_lowercase();
        Self {
            base_host,
            keep_params: keep_params.into_iter().collect(),
            visited: Mutex::new(VisitedSets::default()),
        }
    }

    /// Normalizes a URL under this frontier's query allow-list
    pub fn normalize(&self, raw: &str) -> String {
        normalize_url(raw, &self.keep_params)
    }

    /// Returns whether the URL's host matches the crawl's base host
    pub fn is_internal(&self, raw: &str) -> bool {
        match Url::parse(raw) {
            Ok(url) => url
                .host_str()
                .map(|h| h.eq_ignore_ascii_case(&self.base_host))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Decides whether a URL should ever be fetched
    ///
    /// False for pseudo-schemes, unparseable URLs, URLs without a host,
    /// external hosts, already-visited normalized forms (either set), and
    /// excluded asset extensions.
    pub fn admissible(&self, raw: &str) -> bool {
        let lowered = raw.trim_start().to_ascii_lowercase();
        if PSEUDO_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
            return false;
        }

        let parsed = match Url::parse(raw) {
            Ok(p) => p,
            Err(_) => return false,
        };
        if parsed.host_str().is_none() {
            return false;
        }

        if !self.is_internal(raw) {
            return false;
        }

        let normalized = self.normalize(raw);
        {
            let visited = self.visited.lock().unwrap();
            if visited.urls.contains(&normalized) || visited.hashes.contains(&url_hash(&normalized))
            {
                return false;
            }
        }

        if let Some(ext) = path_extension(&parsed) {
            if EXCLUDED_EXTENSIONS.contains(&ext.as_str()) {
                return false;
            }
        }

        true
    }

    /// Marks a URL as visited; idempotent
    ///
    /// Inserts both the normalized form and its hash under one lock. Called
    /// at dequeue time, before the fetch, so duplicate enqueues racing
    /// through the queue are rejected by the re-check in the worker loop.
    pub fn mark_visited(&self, raw: &str) {
        let normalized = self.normalize(raw);
        let hash = url_hash(&normalized);
        let mut visited = self.visited.lock().unwrap();
        visited.urls.insert(normalized);
        visited.hashes.insert(hash);
    }

    /// Number of distinct URLs marked visited so far
    pub fn visited_count(&self) -> usize {
        self.visited.lock().unwrap().urls.len()
    }
}

/// Extracts the lowercase `.ext` of the final path segment, if any
fn path_extension(url: &Url) -> Option<String> {
    let final_segment = url.path().rsplit('/').next().unwrap_or_default();
    extension_regex()
        .captures(final_segment)
        .map(|caps| format!(".{}", caps[1].to_lowercase()))
}
