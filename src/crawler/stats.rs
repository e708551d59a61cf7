use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Process-local crawl statistics
///
/// One instance per orchestrator, reset with it. The mutex is the explicit
/// concurrency boundary; callers only ever hold it for a counter bump or a
/// snapshot clone, never across I/O.
pub struct CrawlStats {
    inner: Mutex<StatsInner>,
}

#[derive(Default)]
struct StatsInner {
    total_enqueued: u64,
    successful: u64,
    failed: u64,
    status_codes: HashMap<u16, u64>,
    content_types: HashMap<String, u64>,
    total_response_time: f64,
}

/// Point-in-time view of the crawl counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_enqueued: u64,
    pub successful: u64,
    pub failed: u64,
    pub status_codes: HashMap<u16, u64>,
    pub content_types: HashMap<String, u64>,
    pub avg_response_time: f64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsInner::default()),
        }
    }

    /// Counts a URL entering the frontier queue
    pub fn record_enqueued(&self) {
        self.inner.lock().unwrap().total_enqueued += 1;
    }

    /// Counts a successful fetch outcome
    pub fn record_success(&self, status_code: u16, content_type: &str, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.successful += 1;
        *inner.status_codes.entry(status_code).or_insert(0) += 1;
        *inner
            .content_types
            .entry(content_type.to_string())
            .or_insert(0) += 1;
        inner.total_response_time += elapsed.as_secs_f64();
    }

    /// Counts a failed attempt; terminal HTTP errors carry their status
    pub fn record_failure(&self, status_code: Option<u16>) {
        let mut inner = self.inner.lock().unwrap();
        inner.failed += 1;
        if let Some(code) = status_code {
            *inner.status_codes.entry(code).or_insert(0) += 1;
        }
    }

    /// Best-effort snapshot of the current counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap();
        let avg_response_time = if inner.successful > 0 {
            inner.total_response_time / inner.successful as f64
        } else {
            0.0
        };

        StatsSnapshot {
            total_enqueued: inner.total_enqueued,
            successful: inner.successful,
            failed: inner.failed,
            status_codes: inner.status_codes.clone(),
            content_types: inner.content_types.clone(),
            avg_response_time,
        }
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = CrawlStats::new();

        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_success(200, "text/html", Duration::from_millis(100));
        stats.record_failure(Some(404));
        stats.record_failure(None);

        let snap = stats.snapshot();
        assert_eq!(snap.total_enqueued, 2);
        assert_eq!(snap.successful, 1);
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.status_codes.get(&200), Some(&1));
        assert_eq!(snap.status_codes.get(&404), Some(&1));
        assert_eq!(snap.content_types.get("text/html"), Some(&1));
    }

    #[test]
    fn test_average_response_time() {
        let stats = CrawlStats::new();
        stats.record_success(200, "text/html", Duration::from_millis(100));
        stats.record_success(200, "text/html", Duration::from_millis(300));

        let snap = stats.snapshot();
        assert!((snap.avg_response_time - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = CrawlStats::new().snapshot();
        assert_eq!(snap.successful, 0);
        assert_eq!(snap.avg_response_time, 0.0);
    }
}
