use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin User-Agent rotation with a browser-shaped header set
pub struct UserAgentPool {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl UserAgentPool {
    pub fn new(agents: Vec<String>) -> Self {
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the next User-Agent in rotation
    pub fn next(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.agents[idx % self.agents.len()]
    }

    /// Builds the header set for one request
    ///
    /// Invalid header values (a misconfigured agent string with control
    /// characters, say) are skipped rather than failing the request.
    pub fn headers(&self, referer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(self.next()) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

        if let Some(referer) = referer {
            if let Ok(value) = HeaderValue::from_str(referer) {
                headers.insert(REFERER, value);
            }
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> UserAgentPool {
        UserAgentPool::new(vec!["Agent/1".to_string(), "Agent/2".to_string()])
    }

    #[test]
    fn test_round_robin() {
        let pool = pool();
        assert_eq!(pool.next(), "Agent/1");
        assert_eq!(pool.next(), "Agent/2");
        assert_eq!(pool.next(), "Agent/1");
    }

    #[test]
    fn test_headers_include_agent_and_referer() {
        let pool = pool();
        let headers = pool.headers(Some("http://example.com/"));

        assert_eq!(headers.get(USER_AGENT).unwrap(), "Agent/1");
        assert_eq!(headers.get(REFERER).unwrap(), "http://example.com/");
        assert!(headers.get(ACCEPT).is_some());
    }

    #[test]
    fn test_headers_without_referer() {
        let pool = pool();
        let headers = pool.headers(None);
        assert!(headers.get(REFERER).is_none());
    }
}
