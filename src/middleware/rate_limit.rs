use super::{Flow, Middleware, Outcome};
use crate::config::RateLimitSettings;
use crate::error::FennecError;
use crate::http::{HeaderName, HeaderValue, Request};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Quota snapshot stored in request extensions by [`RateLimitMiddleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp at which the current window ends.
    pub reset: i64,
}

/// Sliding-window rate limiter keyed by client address.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    max_requests: u32,
    window: Duration,
    enabled: bool,
    hits: Arc<DashMap<String, VecDeque<Instant>>>,
    started: Instant,
    /// Milliseconds after `started` of the last sweep of idle clients.
    last_sweep: Arc<AtomicU64>,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            enabled: true,
            hits: Arc::new(DashMap::new()),
            started: Instant::now(),
            last_sweep: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.requests, settings.window()).enabled(settings.enabled)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// First `x-forwarded-for` hop, else the peer address.
    pub fn client_key(request: &Request) -> String {
        if let Some(forwarded) = request.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
        request
            .remote_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Number of clients currently holding hits in the window.
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }

    /// Forget clients whose every hit has left the window, at most once
    /// per window.
    fn sweep(&self, now: Instant) {
        let elapsed = now.duration_since(self.started).as_millis() as u64;
        let last = self.last_sweep.load(Ordering::Relaxed);
        if elapsed.saturating_sub(last) < self.window.as_millis() as u64 {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, elapsed, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let before = self.hits.len();
        self.hits
            .retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < self.window));
        tracing::trace!(
            "Rate limiter forgot {} idle clients",
            before.saturating_sub(self.hits.len())
        );
    }

    fn acquire(&self, key: String) -> Result<RateLimitState, FennecError> {
        let now = Instant::now();
        self.sweep(now);
        let mut hits = self.hits.entry(key).or_default();
        while hits
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests as usize {
            return Err(FennecError::RateLimited(format!(
                "Max {} requests per {} seconds",
                self.max_requests,
                self.window.as_secs()
            )));
        }
        hits.push_back(now);

        let reset = chrono::Utc::now().timestamp() + self.window.as_secs() as i64;
        Ok(RateLimitState {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(hits.len() as u32),
            reset,
        })
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "rate_limit"
    }

    async fn before(&self, request: &mut Request) -> Result<Flow, FennecError> {
        if !self.enabled {
            return Ok(Flow::Continue);
        }
        let key = Self::client_key(request);
        let state = self.acquire(key.clone()).inspect_err(|_| {
            tracing::warn!("Rate limit exceeded for {}", key);
        })?;
        request.extensions_mut().insert(state);
        Ok(Flow::Continue)
    }

    async fn after(&self, request: &Request, outcome: Outcome) -> Outcome {
        let mut response = outcome?;
        if let Some(state) = request.extensions().get::<RateLimitState>() {
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(state.limit),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(state.remaining),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(state.reset),
            );
        }
        Ok(response)
    }
}
