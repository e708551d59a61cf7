//! Adaptive per-domain rate limiting
//!
//! A closed-loop controller: each domain starts at a configured default
//! request rate and adjusts it from observed responses. Server-signaled
//! backpressure (HTTP 429, slow responses) halves the rate; fast successes
//! nudge it back up, capped at an absolute ceiling. Different hosts tolerate
//! vastly different request rates, so limits are fully independent per
//! domain.

use crate::url::host_of;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Absolute ceiling on any domain's request rate, in requests per second
const MAX_LIMIT: f64 = 1.0;

/// Responses slower than this halve the domain's rate
const SLOW_RESPONSE: Duration = Duration::from_secs(5);

/// Successful responses faster than this raise the domain's rate
const FAST_RESPONSE: Duration = Duration::from_secs(1);

/// Pacing state for one domain
struct DomainPace {
    /// Serializes admission: at most one `acquire` per domain is in
    /// progress; the fetch itself runs outside this lock
    gate: tokio::sync::Mutex<()>,

    state: Mutex<PaceState>,
}

struct PaceState {
    /// Current limit in requests per second
    limit: f64,

    /// When this domain's last request was granted
    last_grant: Option<Instant>,
}

impl DomainPace {
    fn new(limit: f64) -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(PaceState {
                limit,
                last_grant: None,
            }),
        }
    }
}

/// Per-domain rate limiter with feedback-driven adjustment
pub struct AdaptiveRateLimiter {
    default_limit: f64,
    domains: Mutex<HashMap<String, Arc<DomainPace>>>,
}

impl AdaptiveRateLimiter {
    /// Creates a limiter where every new domain starts at `default_limit`
    /// requests per second
    pub fn new(default_limit: f64) -> Self {
        Self {
            default_limit,
            domains: Mutex::new(HashMap::new()),
        }
    }

    fn pace_for(&self, domain: &str) -> Arc<DomainPace> {
        let mut domains = self.domains.lock().unwrap();
        domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainPace::new(self.default_limit)))
            .clone()
    }

    /// Blocks until the domain's pacing interval has elapsed, then records
    /// the grant
    ///
    /// Admission is serialized per domain: concurrent callers for the same
    /// domain queue behind the domain's mutex, so grants are strictly
    /// ordered relative to each other. Other domains are unaffected. URLs
    /// without a parseable host are granted immediately.
    pub async fn acquire(&self, url: &str) {
        let Some(domain) = host_of(url) else {
            return;
        };
        let pace = self.pace_for(&domain);

        let _admission = pace.gate.lock().await;

        let wait = {
            let state = pace.state.lock().unwrap();
            let min_interval = if state.limit > 0.0 {
                Duration::from_secs_f64(1.0 / state.limit)
            } else {
                Duration::ZERO
            };
            match state.last_grant {
                Some(last) => min_interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };

        if !wait.is_zero() {
            tracing::debug!("Pacing {} for {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }

        pace.state.lock().unwrap().last_grant = Some(Instant::now());
    }

    /// Adapts the domain's limit from an observed response
    ///
    /// HTTP 429 or a response slower than 5s halves the limit; a 200 faster
    /// than 1s raises it by 10%, capped at 1 request/second. Anything else
    /// leaves the limit unchanged.
    pub fn report_outcome(&self, url: &str, response_time: Duration, status_code: u16) {
        let Some(domain) = host_of(url) else {
            return;
        };
        let pace = self.pace_for(&domain);
        let mut state = pace.state.lock().unwrap();

        if status_code == 429 || response_time > SLOW_RESPONSE {
            let new_limit = state.limit * 0.5;
            tracing::warn!(
                "Lowering request limit for {}: {:.2} -> {:.2}/s",
                domain,
                state.limit,
                new_limit
            );
            state.limit = new_limit;
        } else if status_code == 200 && response_time < FAST_RESPONSE {
            let new_limit = (state.limit * 1.1).min(MAX_LIMIT);
            if new_limit > state.limit {
                tracing::debug!(
                    "Raising request limit for {}: {:.2} -> {:.2}/s",
                    domain,
                    state.limit,
                    new_limit
                );
                state.limit = new_limit;
            }
        }
    }

    /// Current limit for a domain, or the default if never seen
    pub fn current_limit(&self, domain: &str) -> f64 {
        let domains = self.domains.lock().unwrap();
        domains
            .get(domain)
            .map(|p| p.state.lock().unwrap().limit)
            .unwrap_or(self.default_limit)
    }
}
