//! Configuration management for the recipe service
//!
//! Configuration is loaded from environment variables.

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

use crate::middleware::rate_limiter::MAX_WINDOW_MINUTES;

/// Which key-value store backs the rate limiter and the recipe cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvBackend {
    Redis,
    /// Process-local store, only suitable for a single instance
    Memory,
}

impl FromStr for KvBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(KvBackend::Redis),
            "memory" => Ok(KvBackend::Memory),
            other => bail!("Unknown KV_BACKEND '{}', expected 'redis' or 'memory'", other),
        }
    }
}

/// What a successful recipe update does to the cached copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWritePolicy {
    /// Delete the cached entry; the next read repopulates it
    Invalidate,
    /// Overwrite the cached entry with the updated row
    Refresh,
}

impl FromStr for CacheWritePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "invalidate" => Ok(CacheWritePolicy::Invalidate),
            "refresh" => Ok(CacheWritePolicy::Refresh),
            other => bail!(
                "Unknown RECIPE_CACHE_WRITE_POLICY '{}', expected 'invalidate' or 'refresh'",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Postgres connection URL
    pub database_url: String,
    /// Upper bound on pooled Postgres connections
    pub database_max_connections: u32,

    /// Redis connection URL
    pub redis_url: String,
    /// Key-value store backend
    pub kv_backend: KvBackend,

    /// Default request budget per client and endpoint
    pub rate_limit_max_requests: u32,
    /// Default sliding window length (in minutes)
    pub rate_limit_window_minutes: f64,
    /// Request budget for recipe writes
    pub rate_limit_write_max_requests: u32,
    /// Identify clients by `X-Forwarded-For` / `X-Real-IP`; only safe behind a proxy that sets them
    pub trust_proxy_headers: bool,

    /// TTL of cached recipes (in seconds)
    pub recipe_cache_ttl_seconds: u64,
    pub recipe_cache_write_policy: CacheWritePolicy,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            host: var_or("SERVICE_HOST", "0.0.0.0"),
            port: var_or("SERVICE_PORT", "8080")
                .parse()
                .context("Invalid SERVICE_PORT")?,

            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            redis_url: var_or("REDIS_URL", "redis://localhost:6379"),
            kv_backend: var_or("KV_BACKEND", "redis").parse()?,

            rate_limit_max_requests: var_or("RATE_LIMIT_MAX_REQUESTS", "100")
                .parse()
                .context("Invalid RATE_LIMIT_MAX_REQUESTS")?,
            rate_limit_window_minutes: var_or("RATE_LIMIT_WINDOW_MINUTES", "15")
                .parse()
                .context("Invalid RATE_LIMIT_WINDOW_MINUTES")?,
            rate_limit_write_max_requests: var_or("RATE_LIMIT_WRITE_MAX_REQUESTS", "20")
                .parse()
                .context("Invalid RATE_LIMIT_WRITE_MAX_REQUESTS")?,
            trust_proxy_headers: var_or("TRUST_PROXY_HEADERS", "false")
                .parse()
                .context("Invalid TRUST_PROXY_HEADERS")?,

            recipe_cache_ttl_seconds: var_or("RECIPE_CACHE_TTL_SECONDS", "3600")
                .parse()
                .context("Invalid RECIPE_CACHE_TTL_SECONDS")?,
            recipe_cache_write_policy: var_or("RECIPE_CACHE_WRITE_POLICY", "invalidate")
                .parse()?,

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the limiter and cache cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_max_requests == 0 || self.rate_limit_write_max_requests == 0 {
            bail!("Rate limit request budgets must be at least 1");
        }
        if !self.rate_limit_window_minutes.is_finite() || self.rate_limit_window_minutes <= 0.0 {
            bail!("RATE_LIMIT_WINDOW_MINUTES must be a positive number");
        }
        if self.rate_limit_window_minutes > MAX_WINDOW_MINUTES {
            bail!(
                "RATE_LIMIT_WINDOW_MINUTES must be at most {}",
                MAX_WINDOW_MINUTES
            );
        }
        if self.recipe_cache_ttl_seconds == 0 {
            bail!("RECIPE_CACHE_TTL_SECONDS must be at least 1");
        }
        if self.database_max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }
        Ok(())
    }

    /// Configuration for tests and local tooling that never touch the environment
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "postgres://localhost/recipes_test".to_string(),
            database_max_connections: 2,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            kv_backend: KvBackend::Memory,
            rate_limit_max_requests: 100,
            rate_limit_window_minutes: 15.0,
            rate_limit_write_max_requests: 20,
            trust_proxy_headers: false,
            recipe_cache_ttl_seconds: 3600,
            recipe_cache_write_policy: CacheWritePolicy::Invalidate,
            log_json: false,
        }
    }
}
