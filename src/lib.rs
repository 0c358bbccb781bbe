//! Recipe service - rate limiting and recipe caching for the recipe backend
//!
//! This library provides the core of the recipe service: a sliding-window
//! rate limiter and a cache-aside recipe cache, both built on a shared
//! key-value store, plus the HTTP surface that exposes them.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod recipes;
pub mod routes;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

pub use crate::cache::RecipeCache;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::Config;
pub use crate::middleware::rate_limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use crate::recipes::{PgRecipeRepository, RecipeRepository};
pub use crate::store::{InMemoryStore, KeyValueStore, RedisStore};

use crate::config::KvBackend;

/// Application state shared across all request handlers
///
/// This is the composition root: it owns the store and the pool and hands
/// them to the rate limiter and the recipe cache.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KeyValueStore>,
    pub repository: Arc<dyn RecipeRepository>,
    pub rate_limiter: Arc<RateLimiter>,
    pub recipe_cache: Arc<RecipeCache>,
    pub start_time: Instant,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match config.kv_backend {
            KvBackend::Redis => Arc::new(
                RedisStore::connect(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?,
            ),
            KvBackend::Memory => {
                info!("Using in-memory key-value store; limits are per instance");
                Arc::new(InMemoryStore::new())
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'recipe_service';")
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await
            .context("Failed to connect to Postgres")?;

        recipes::repository::MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations applied");

        let repository: Arc<dyn RecipeRepository> =
            Arc::new(PgRecipeRepository::new(pool.clone()));

        let mut state = Self::from_parts(config, store, repository, Arc::new(SystemClock));
        state.pool = Some(pool);
        Ok(state)
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        repository: Arc<dyn RecipeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            store.clone(),
            clock,
            RateLimitConfig::from_config(&config),
        ));

        let recipe_cache = Arc::new(RecipeCache::new(
            store.clone(),
            repository.clone(),
            config.recipe_cache_ttl_seconds,
            config.recipe_cache_write_policy,
        ));

        Self {
            config,
            store,
            repository,
            rate_limiter,
            recipe_cache,
            start_time: Instant::now(),
            pool: None,
        }
    }

    /// Release pooled database connections
    ///
    /// Waits for checked-out connections to come back before closing them.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            info!("Database pool closed");
        }
    }
}
