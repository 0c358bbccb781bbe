//! Rate limiting middleware
//!
//! Implements sliding window rate limiting on top of the key-value store.
//! Every accepted request is a sorted-set member scored by the moment it
//! leaves the window; a check prunes members whose score has passed, counts
//! what is left and, if under budget, records the new request together with a
//! TTL refresh in one atomic batch.
//!
//! The prune, count and record steps are separate store round trips, so two
//! concurrent requests for the same key can both observe `max_requests - 1`
//! and both be admitted. Limits are therefore approximate under contention.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    cache::keys,
    clock::Clock,
    config::Config,
    error::{error_body, AppError, AppResult, ErrorDetails, FieldError},
    routes::metrics::record_rate_limit_decision,
    store::KeyValueStore,
};

/// Longest accepted window (one year)
///
/// Keeps `now + window_millis()` well inside `i64` milliseconds.
pub const MAX_WINDOW_MINUTES: f64 = 525_600.0;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Window size in minutes
    pub window_minutes: f64,
    /// Key prefix for the store
    pub key_prefix: String,
}

impl RateLimitConfig {
    /// Create a new rate limit config
    pub fn new(max_requests: u32, window_minutes: f64, key_prefix: &str) -> Self {
        Self {
            max_requests,
            window_minutes,
            key_prefix: key_prefix.to_string(),
        }
    }

    /// Defaults taken from application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_requests: config.rate_limit_max_requests,
            window_minutes: config.rate_limit_window_minutes,
            ..Self::default()
        }
    }

    /// Replace the budget and/or the window, keeping the rest
    pub fn with_overrides(&self, max_requests: Option<u32>, window_minutes: Option<f64>) -> Self {
        Self {
            max_requests: max_requests.unwrap_or(self.max_requests),
            window_minutes: window_minutes.unwrap_or(self.window_minutes),
            key_prefix: self.key_prefix.clone(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut errors = Vec::new();
        if self.max_requests == 0 {
            errors.push(FieldError::new("max_requests", "must be at least 1"));
        }
        if !self.window_minutes.is_finite() || self.window_minutes <= 0.0 {
            errors.push(FieldError::new("window_minutes", "must be a positive number"));
        } else if self.window_minutes > MAX_WINDOW_MINUTES {
            errors.push(FieldError::new(
                "window_minutes",
                format!("must not exceed {} minutes", MAX_WINDOW_MINUTES),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Window length in milliseconds
    pub fn window_millis(&self) -> i64 {
        (self.window_minutes * 60_000.0).round() as i64
    }

    /// TTL applied to the whole window key on every admit
    pub fn ttl_seconds(&self) -> u64 {
        ((self.window_minutes * 60.0).ceil() as u64).max(1)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_minutes: 15.0,
            key_prefix: "ratelimit".to_string(),
        }
    }
}

/// Budget state reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in window
    pub limit: i64,
    /// Remaining requests in current window, never negative
    pub remaining: i64,
    /// End of the current window, epoch milliseconds
    pub reset_at: i64,
    /// Seconds until a slot frees up (only meaningful on rejection)
    pub retry_after_secs: i64,
}

impl RateLimitInfo {
    /// Create rate limit headers for the response
    pub fn headers(&self, rejected: bool) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(self.limit),
            ),
            (
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from(self.remaining.max(0)),
            ),
            (
                HeaderName::from_static("x-ratelimit-reset"),
                HeaderValue::from(self.reset_at),
            ),
        ];

        if rejected {
            headers.push((header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs.max(1))));
        }

        headers
    }

    fn apply(&self, headers: &mut HeaderMap, rejected: bool) {
        for (name, value) in self.headers(rejected) {
            headers.insert(name, value);
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request recorded and allowed through
    Admit(RateLimitInfo),
    /// Budget exhausted; nothing was recorded
    Reject(RateLimitInfo),
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admit(_))
    }

    pub fn info(&self) -> &RateLimitInfo {
        match self {
            RateLimitDecision::Admit(info) | RateLimitDecision::Reject(info) => info,
        }
    }
}

/// Sliding window rate limiter over a shared key-value store
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    defaults: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        defaults: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            defaults,
        }
    }

    pub fn defaults(&self) -> &RateLimitConfig {
        &self.defaults
    }

    /// Check and record one request, falling back to the configured defaults
    pub async fn check_and_record(
        &self,
        client_id: &str,
        endpoint_id: &str,
        max_requests: Option<u32>,
        window_minutes: Option<f64>,
    ) -> AppResult<RateLimitDecision> {
        let config = self.defaults.with_overrides(max_requests, window_minutes);
        self.check(client_id, endpoint_id, &config).await
    }

    /// Check and record one request against an explicit configuration
    ///
    /// Store failures are returned as errors; the request is neither admitted
    /// nor rejected.
    #[instrument(skip(self, config), fields(max_requests = config.max_requests))]
    pub async fn check(
        &self,
        client_id: &str,
        endpoint_id: &str,
        config: &RateLimitConfig,
    ) -> AppResult<RateLimitDecision> {
        config.validate()?;

        let key = keys::rate_limit(&config.key_prefix, client_id, endpoint_id);
        let now = self.clock.now_millis();
        let window_end = now
            .checked_add(config.window_millis())
            .ok_or_else(|| AppError::invalid("window_minutes", "window end is out of range"))?;
        let limit = i64::from(config.max_requests);

        // Members are scored by their own expiry, so anything at or before
        // `now` has left the window.
        self.store
            .zrem_range_by_score(&key, f64::NEG_INFINITY, now as f64)
            .await?;

        let active = self
            .store
            .zrange_by_score(&key, now as f64, window_end as f64)
            .await?;
        let count = active.len() as i64;

        if count >= limit {
            let retry_after_ms = active
                .first()
                .and_then(|member| member_expiry(member))
                .map(|expiry| expiry - now)
                .unwrap_or_else(|| config.window_millis());

            debug!(count, "Rate limit budget exhausted");
            return Ok(RateLimitDecision::Reject(RateLimitInfo {
                limit,
                remaining: (limit - count).max(0),
                reset_at: window_end,
                retry_after_secs: (retry_after_ms + 999) / 1000,
            }));
        }

        let member = format!("{}:{}", window_end, Uuid::new_v4());
        self.store
            .zadd_with_expire(&key, window_end as f64, &member, config.ttl_seconds())
            .await?;

        Ok(RateLimitDecision::Admit(RateLimitInfo {
            limit,
            remaining: (limit - count - 1).max(0),
            reset_at: window_end,
            retry_after_secs: 0,
        }))
    }
}

/// Expiry encoded in a window member (`{expiry}:{uuid}`)
fn member_expiry(member: &str) -> Option<i64> {
    member.split_once(':').and_then(|(expiry, _)| expiry.parse().ok())
}

/// Build a 429 Too Many Requests response with rate limit headers
pub fn rate_limit_exceeded_response(info: &RateLimitInfo) -> Response {
    let reset_at = chrono::DateTime::from_timestamp_millis(info.reset_at)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| info.reset_at.to_string());

    let mut response = error_body(
        StatusCode::TOO_MANY_REQUESTS,
        "RATE_LIMIT_EXCEEDED",
        "Too many requests. Please slow down.".to_string(),
        Some(ErrorDetails {
            limit: Some(info.limit),
            remaining: Some(info.remaining.max(0)),
            reset_at: Some(reset_at),
            fields: None,
        }),
    );

    info.apply(response.headers_mut(), true);
    response
}

/// Identify the caller by network address
///
/// With `trust_proxy_headers` set, prefers the first `X-Forwarded-For` hop,
/// then `X-Real-IP`. Otherwise those headers are ignored, since any client
/// can set them. Falls back to the socket peer address, then `"unknown"`.
pub fn client_id(request: &Request, trust_proxy_headers: bool) -> String {
    let forwarded = if trust_proxy_headers {
        forwarded_client(request.headers())
    } else {
        None
    };

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()));
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };
    forwarded.or_else(real_ip).map(str::to_string)
}

/// Identify the protected operation as `METHOD route`
pub fn endpoint_id(request: &Request) -> String {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    format!("{} {}", request.method(), route)
}

/// Rate limit guard bound to one configuration
///
/// Used as middleware state so route groups can carry different budgets.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    config: RateLimitConfig,
    trust_proxy_headers: bool,
}

impl RateLimitGuard {
    /// Guard using the limiter defaults, optionally overridden
    pub fn new(
        limiter: Arc<RateLimiter>,
        max_requests: Option<u32>,
        window_minutes: Option<f64>,
    ) -> Self {
        let config = limiter.defaults().with_overrides(max_requests, window_minutes);
        Self {
            limiter,
            config,
            trust_proxy_headers: false,
        }
    }

    /// Identify clients by forwarding headers instead of the socket peer
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

/// Rate limiting middleware
///
/// Checks rate limits before processing requests. Returns 429 if exceeded.
/// Adds rate limit headers to admitted responses. Store failures are
/// reported as 500 rather than letting the request through.
pub async fn rate_limit_middleware(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_id(&request, guard.trust_proxy_headers);
    let endpoint = endpoint_id(&request);

    match guard.limiter.check(&client, &endpoint, &guard.config).await {
        Ok(RateLimitDecision::Admit(info)) => {
            record_rate_limit_decision("admit");

            let mut response = next.run(request).await;
            info.apply(response.headers_mut(), false);
            response
        }
        Ok(RateLimitDecision::Reject(info)) => {
            record_rate_limit_decision("reject");
            warn!(
                client_id = %client,
                endpoint = %endpoint,
                limit = info.limit,
                "Rate limit exceeded"
            );
            AppError::RateLimitExceeded(info).into_response()
        }
        Err(e) => {
            record_rate_limit_decision("error");
            e.into_response()
        }
    }
}
