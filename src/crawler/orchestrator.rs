//! Crawl orchestration
//!
//! The `Crawler` owns every shared component - frontier, queue, rate
//! limiter, proxy pool, fetcher, statistics, storage handle - and drives a
//! fixed pool of workers over one frontier queue. Session lifecycle:
//! `idle -> running -> {paused, completed, failed}`, with `paused ->
//! running` on resume. The whole crawl only stops on pause, the max-pages
//! limit, or frontier exhaustion; per-URL failures stay local.

use crate::config::Config;
use crate::crawler::fetcher::{FetchConfig, FetchResult, Fetcher};
use crate::crawler::headers::UserAgentPool;
use crate::crawler::queue::FrontierQueue;
use crate::crawler::sitemap::SitemapDiscovery;
use crate::crawler::stats::{CrawlStats, StatsSnapshot};
use crate::crawler::timer::ScopedTimer;
use crate::extract::{Document, ExtractorSet, HtmlExtractor};
use crate::limiter::AdaptiveRateLimiter;
use crate::proxy::{ProxyPool, ProxyStats};
use crate::storage::{LinkRecord, PageRecord, PageStore, SessionStatus, StoreStats};
use crate::url::{url_hash, UrlFrontier};
use crate::{GleanError, Result, UrlError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Per-run options, merged from configuration and CLI flags
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOptions {
    pub max_pages: Option<u64>,
    pub max_depth: Option<u32>,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
    pub use_proxies: bool,
}

impl CrawlOptions {
    /// Derives options from a configuration, treating zero limits as
    /// unlimited
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_pages: (config.crawler.max_pages > 0).then_some(config.crawler.max_pages),
            max_depth: (config.crawler.max_depth > 0).then_some(config.crawler.max_depth),
            concurrency: config.crawler.concurrency,
            timeout_secs: config.crawler.timeout_seconds,
            verify_ssl: config.crawler.verify_ssl,
            use_proxies: config.proxy.enabled,
        }
    }
}

/// Wall-clock view of the engine
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStats {
    pub duration_seconds: f64,
    pub pages_per_minute: f64,
    pub is_running: bool,
    pub is_paused: bool,
}

/// Combined on-demand statistics: runtime, in-memory counters, storage
/// aggregates, and proxy pool health
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub runtime: RuntimeStats,
    pub crawl: StatsSnapshot,
    pub storage: Option<StoreStats>,
    pub proxy: Option<ProxyStats>,
}

/// The crawl orchestrator
pub struct Crawler {
    base_url: Url,
    options: CrawlOptions,
    resume_batch: usize,

    frontier: Arc<UrlFrontier>,
    limiter: Arc<AdaptiveRateLimiter>,
    proxies: Option<Arc<ProxyPool>>,
    agents: Arc<UserAgentPool>,
    fetcher: Arc<Fetcher>,
    store: Arc<Mutex<dyn PageStore>>,
    stats: Arc<CrawlStats>,

    /// Replaced with a fresh queue on every run; pause closes the current one
    queue: Mutex<Arc<FrontierQueue>>,
    gate: Arc<Semaphore>,

    running: AtomicBool,
    paused: AtomicBool,
    pages_crawled: AtomicU64,
    session_id: Mutex<Option<i64>>,
    started_at: Mutex<Option<Instant>>,
    ended_at: Mutex<Option<Instant>>,
}

impl Crawler {
    /// Builds a crawler for `base_url`
    pub fn new(
        base_url: &str,
        options: CrawlOptions,
        config: &Config,
        store: Arc<Mutex<dyn PageStore>>,
    ) -> Result<Arc<Self>> {
        let base = Url::parse(base_url)?;
        if base.host_str().is_none() {
            return Err(UrlError::MissingHost(base_url.to_string()).into());
        }

        let frontier = Arc::new(UrlFrontier::new(&base, config.frontier.keep_params.clone()));
        let limiter = Arc::new(AdaptiveRateLimiter::new(config.crawler.rate_limit));
        let proxies = options.use_proxies.then(|| {
            Arc::new(ProxyPool::new(
                &config.proxy.endpoints,
                config.proxy.rotation_limit,
            ))
        });
        let agents = Arc::new(UserAgentPool::new(config.crawler.user_agents.clone()));
        let extractors = ExtractorSet::new(Box::new(HtmlExtractor::new(&base, &config.extract)));

        let fetcher = Arc::new(Fetcher::new(
            FetchConfig {
                timeout: Duration::from_secs(options.timeout_secs),
                verify_ssl: options.verify_ssl,
                max_retries: config.crawler.max_retries,
                backoff_factor: config.crawler.backoff_factor,
                referer: base.to_string(),
            },
            agents.clone(),
            proxies.clone(),
            extractors,
        )?);

        let gate = Arc::new(Semaphore::new(options.concurrency));

        Ok(Arc::new(Self {
            base_url: base,
            resume_batch: config.crawler.resume_batch,
            frontier,
            limiter,
            proxies,
            agents,
            fetcher,
            store,
            stats: Arc::new(CrawlStats::new()),
            queue: Mutex::new(Arc::new(FrontierQueue::new())),
            gate,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            pages_crawled: AtomicU64::new(0),
            session_id: Mutex::new(None),
            started_at: Mutex::new(None),
            ended_at: Mutex::new(None),
            options,
        }))
    }

    /// Starts the crawl and blocks until it completes or pauses
    ///
    /// Rejects with `AlreadyRunning` when a crawl is in progress.
    pub async fn start(self: &Arc<Self>) -> Result<StatsSnapshot> {
        self.run(Vec::new()).await
    }

    /// Resumes a paused crawl from the storage backlog
    ///
    /// No-op when already running or when there is nothing paused to
    /// resume. Links come back without their original depth and re-enter
    /// the frontier at depth 0.
    pub async fn resume(self: &Arc<Self>) -> Result<StatsSnapshot> {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("Crawler is already running");
            return Ok(self.stats.snapshot());
        }
        // A fresh instance (no run yet) may resume from persisted state; an
        // instance that already ran to completion must be paused first
        let ran_before = self.started_at.lock().unwrap().is_some();
        if ran_before && !self.paused.load(Ordering::SeqCst) {
            tracing::warn!("Crawler is not paused, nothing to resume");
            return Ok(self.stats.snapshot());
        }

        let backlog = {
            let store = self.store.lock().unwrap();
            store.get_uncrawled_links(self.base_url.as_str(), self.resume_batch)?
        };

        if backlog.is_empty() {
            tracing::warn!("No uncrawled links found to resume from");
            return Ok(self.stats.snapshot());
        }

        tracing::info!("Resuming crawl with {} stored links", backlog.len());
        self.run(backlog).await
    }

    /// Pauses the crawl: new dequeues stop, in-flight fetches finish
    pub fn pause(&self) {
        if !self.running.load(Ordering::SeqCst) {
            tracing::warn!("Crawler is not running, nothing to pause");
            return;
        }

        tracing::info!("Pausing crawl");
        self.paused.store(true, Ordering::SeqCst);

        if let Some(id) = *self.session_id.lock().unwrap() {
            if let Err(e) = self.store.lock().unwrap().pause_session(id) {
                tracing::error!("Failed to persist paused session: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.queue.lock().unwrap().close();
    }

    /// Snapshot of the in-memory crawl counters
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Combined runtime, crawl, storage, and proxy statistics
    pub fn engine_stats(&self) -> EngineStats {
        let duration = {
            let started = self.started_at.lock().unwrap();
            let ended = self.ended_at.lock().unwrap();
            match (*started, *ended) {
                (Some(start), Some(end)) if end > start => end - start,
                (Some(start), _) => start.elapsed(),
                _ => Duration::ZERO,
            }
        };

        let minutes = duration.as_secs_f64() / 60.0;
        let crawled = self.pages_crawled.load(Ordering::SeqCst);

        let storage = {
            let session_id = *self.session_id.lock().unwrap();
            self.store.lock().unwrap().get_stats(session_id).ok()
        };

        EngineStats {
            runtime: RuntimeStats {
                duration_seconds: duration.as_secs_f64(),
                pages_per_minute: if minutes > 0.0 {
                    crawled as f64 / minutes
                } else {
                    0.0
                },
                is_running: self.running.load(Ordering::SeqCst),
                is_paused: self.paused.load(Ordering::SeqCst),
            },
            crawl: self.stats.snapshot(),
            storage,
            proxy: self.proxies.as_ref().map(|p| p.stats()),
        }
    }

    async fn run(self: &Arc<Self>, backlog: Vec<String>) -> Result<StatsSnapshot> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GleanError::AlreadyRunning);
        }
        self.paused.store(false, Ordering::SeqCst);
        *self.started_at.lock().unwrap() = Some(Instant::now());
        *self.ended_at.lock().unwrap() = None;

        tracing::info!("Crawl started: {}", self.base_url);
        let outcome = self.run_inner(backlog).await;

        self.running.store(false, Ordering::SeqCst);
        *self.ended_at.lock().unwrap() = Some(Instant::now());

        let status = if self.paused.load(Ordering::SeqCst) {
            SessionStatus::Paused
        } else if outcome.is_err() {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };

        if let Some(id) = *self.session_id.lock().unwrap() {
            if let Err(e) = self.store.lock().unwrap().end_session(id, status) {
                tracing::error!("Failed to close session {}: {}", id, e);
            }
        }

        let snapshot = self.stats.snapshot();
        self.log_stats(&snapshot);
        outcome.map(|_| snapshot)
    }

    async fn run_inner(self: &Arc<Self>, backlog: Vec<String>) -> Result<()> {
        // Storage must be reachable at startup; this is the one fatal error
        {
            let mut store = self.store.lock().unwrap();
            store.init_schema()?;
            let session_config = serde_json::json!({
                "base_url": self.base_url.as_str(),
                "options": self.options,
            })
            .to_string();
            let session_id = store.start_session(self.base_url.as_str(), &session_config)?;
            *self.session_id.lock().unwrap() = Some(session_id);
        }

        let queue = Arc::new(FrontierQueue::new());
        *self.queue.lock().unwrap() = queue.clone();

        self.enqueue(&queue, self.base_url.as_str().to_string(), 0);
        for url in backlog {
            // Depth is not recoverable across a pause boundary
            self.enqueue_if_admissible(&queue, url, 0);
        }

        let discovery = SitemapDiscovery::new(
            self.fetcher.direct_client(),
            self.agents.clone(),
            self.limiter.clone(),
            self.base_url.clone(),
        );
        for url in discovery.discover().await {
            self.enqueue_if_admissible(&queue, url, 0);
        }

        let mut workers = JoinSet::new();
        for worker_id in 0..self.options.concurrency {
            let crawler = Arc::clone(self);
            let queue = queue.clone();
            workers.spawn(async move { crawler.worker(queue, worker_id).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        Ok(())
    }

    async fn worker(self: Arc<Self>, queue: Arc<FrontierQueue>, worker_id: usize) {
        tracing::debug!("Worker {} started", worker_id);

        while self.running.load(Ordering::SeqCst) {
            let Some((url, depth)) = queue.pop().await else {
                break;
            };

            if let Some(max_depth) = self.options.max_depth {
                if depth > max_depth {
                    queue.task_done();
                    continue;
                }
            }

            if let Some(max_pages) = self.options.max_pages {
                if self.pages_crawled.load(Ordering::SeqCst) >= max_pages {
                    tracing::info!("Reached max pages limit: {}", max_pages);
                    self.running.store(false, Ordering::SeqCst);
                    queue.close();
                    queue.task_done();
                    break;
                }
            }

            // Another worker may have just claimed the same URL
            if !self.frontier.admissible(&url) {
                queue.task_done();
                continue;
            }

            // The admission gate bounds simultaneous in-flight fetches; the
            // permit is dropped on every path out of this iteration
            let permit = match self.gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    queue.task_done();
                    break;
                }
            };

            self.limiter.acquire(&url).await;
            self.process(&url, depth, &queue).await;

            drop(permit);
            queue.task_done();
        }

        tracing::debug!("Worker {} stopped", worker_id);
    }

    /// Fetches one URL and feeds the results onward
    ///
    /// Visited marking happens before the fetch so concurrent duplicates
    /// racing through the queue fail the admissibility re-check.
    async fn process(&self, raw_url: &str, depth: u32, queue: &FrontierQueue) {
        self.frontier.mark_visited(raw_url);

        let url = match Url::parse(raw_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unparseable URL {}: {}", raw_url, e);
                self.stats.record_failure(None);
                return;
            }
        };

        tracing::debug!("Processing {} (depth {})", raw_url, depth);
        let _timer = ScopedTimer::new(format!("Fetch {}", raw_url));

        match self.fetcher.fetch(&url).await {
            FetchResult::Success {
                status_code,
                content_type,
                elapsed,
                document,
            } => {
                self.pages_crawled.fetch_add(1, Ordering::SeqCst);
                self.stats.record_success(status_code, &content_type, elapsed);
                self.limiter.report_outcome(raw_url, elapsed, status_code);
                self.persist_page(raw_url, depth, status_code, &content_type, elapsed, &document);
                self.enqueue_links(&document, depth, queue);
            }

            FetchResult::Redirected { target } => {
                // The redirect itself produced no page; its target re-enters
                // the frontier at the same depth
                self.stats.record_failure(None);
                let target = target.to_string();
                if self.frontier.admissible(&target) {
                    self.enqueue(queue, target, depth);
                }
            }

            FetchResult::Failed {
                status_code,
                error,
                elapsed,
            } => {
                self.stats.record_failure(status_code);
                if let Some(code) = status_code {
                    self.limiter.report_outcome(raw_url, elapsed, code);
                }
                self.persist_error_page(raw_url, depth, status_code, elapsed, error);
            }

            FetchResult::Abandoned => {
                self.stats.record_failure(None);
            }
        }
    }

    /// Saves a fetched page and marks any link rows pointing at it crawled
    fn persist_page(
        &self,
        raw_url: &str,
        depth: u32,
        status_code: u16,
        content_type: &str,
        elapsed: Duration,
        document: &Document,
    ) {
        let normalized = self.frontier.normalize(raw_url);
        let hash = url_hash(&normalized);

        let record = PageRecord {
            url: normalized,
            url_hash: hash.clone(),
            title: document.title.clone(),
            content_type: Some(content_type.to_string()),
            full_text: document.full_text.clone(),
            main_content: document.main_content.clone(),
            secondary_content: document.secondary_content.clone(),
            status_code: Some(status_code),
            depth,
            response_time: Some(elapsed.as_secs_f64()),
            error: document.error.clone(),
        };

        let page_id = {
            let mut store = self.store.lock().unwrap();
            match store.save_page(&record) {
                Ok(id) => {
                    if let Err(e) = store.mark_link_crawled(&hash) {
                        tracing::warn!("Failed to mark link crawled: {}", e);
                    }
                    id
                }
                Err(e) => {
                    // A failed page save aborts this URL's link step only
                    tracing::error!("Failed to save page {}: {}", raw_url, e);
                    return;
                }
            }
        };

        if document.links.is_empty() {
            return;
        }

        let link_records: Vec<LinkRecord> = document
            .links
            .iter()
            .map(|link| LinkRecord {
                url: link.url.clone(),
                url_hash: url_hash(&self.frontier.normalize(&link.url)),
                is_internal: link.is_internal,
                is_crawled: false,
            })
            .collect();

        if let Err(e) = self.store.lock().unwrap().save_links(page_id, &link_records) {
            tracing::error!("Failed to save links for {}: {}", raw_url, e);
        }
    }

    /// Saves a terminal-error page so the URL is not refetched on resume
    fn persist_error_page(
        &self,
        raw_url: &str,
        depth: u32,
        status_code: Option<u16>,
        elapsed: Duration,
        error: String,
    ) {
        let normalized = self.frontier.normalize(raw_url);
        let record = PageRecord {
            url_hash: url_hash(&normalized),
            url: normalized,
            status_code,
            depth,
            response_time: Some(elapsed.as_secs_f64()),
            error: Some(error),
            ..PageRecord::default()
        };

        let mut store = self.store.lock().unwrap();
        match store.save_page(&record) {
            Ok(_) => {
                if let Err(e) = store.mark_link_crawled(&record.url_hash) {
                    tracing::warn!("Failed to mark link crawled: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to save error page {}: {}", raw_url, e),
        }
    }

    /// Enqueues internal admissible links one level deeper
    fn enqueue_links(&self, document: &Document, depth: u32, queue: &FrontierQueue) {
        for link in &document.links {
            if link.is_internal && self.frontier.admissible(&link.url) {
                self.enqueue(queue, link.url.clone(), depth + 1);
            }
        }
    }

    fn enqueue(&self, queue: &FrontierQueue, url: String, depth: u32) {
        if queue.push(url, depth) {
            self.stats.record_enqueued();
        }
    }

    fn enqueue_if_admissible(&self, queue: &FrontierQueue, url: String, depth: u32) {
        if self.frontier.admissible(&url) {
            self.enqueue(queue, url, depth);
        }
    }

    fn log_stats(&self, snapshot: &StatsSnapshot) {
        let duration = {
            let started = self.started_at.lock().unwrap();
            let ended = self.ended_at.lock().unwrap();
            match (*started, *ended) {
                (Some(start), Some(end)) if end > start => end - start,
                _ => Duration::ZERO,
            }
        };
        let minutes = (duration.as_secs_f64() / 60.0).max(f64::EPSILON);
        let crawled = self.pages_crawled.load(Ordering::SeqCst);

        tracing::info!("Crawl finished:");
        tracing::info!("  Duration: {:.2} minutes", duration.as_secs_f64() / 60.0);
        tracing::info!("  Rate: {:.2} pages/minute", crawled as f64 / minutes);
        tracing::info!("  Enqueued: {}", snapshot.total_enqueued);
        tracing::info!("  Successful: {}", snapshot.successful);
        tracing::info!("  Failed: {}", snapshot.failed);
        tracing::info!("  Avg response time: {:.2}s", snapshot.avg_response_time);
        tracing::info!("  Content types: {:?}", snapshot.content_types);
        tracing::info!("  Status codes: {:?}", snapshot.status_codes);
    }
}
