//! Common test utilities
//!
//! Builds the real router over an in-memory store, a manual clock and the
//! mock recipe repository, so integration tests drive the full HTTP stack
//! without Redis or Postgres.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{TimeZone, Utc};
use recipe_service::clock::ManualClock;
use recipe_service::config::{CacheWritePolicy, Config};
use recipe_service::recipes::Recipe;
use recipe_service::routes::create_router;
use recipe_service::store::InMemoryStore;
use recipe_service::AppState;

use crate::mocks::recipes::MockRecipeRepository;

/// Test configuration constants
pub mod constants {
    /// Fixed start time for the manual clock (2023-11-14T22:13:20Z)
    pub const T0: i64 = 1_700_000_000_000;
    /// Caller identity used unless a test says otherwise
    pub const CLIENT_IP: &str = "203.0.113.7";
}

/// Running test application and handles to its collaborators
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub store: Arc<InMemoryStore>,
    pub repository: Arc<MockRecipeRepository>,
    pub clock: Arc<ManualClock>,
}

/// Builder for test applications
pub struct TestAppBuilder {
    config: Config,
}

impl TestAppBuilder {
    /// Forwarding headers are trusted so tests can pick a client per request
    pub fn new() -> Self {
        let mut config = Config::for_testing();
        config.trust_proxy_headers = true;
        Self { config }
    }

    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.config.trust_proxy_headers = trust;
        self
    }

    pub fn rate_limit(mut self, max_requests: u32, window_minutes: f64) -> Self {
        self.config.rate_limit_max_requests = max_requests;
        self.config.rate_limit_window_minutes = window_minutes;
        self
    }

    pub fn write_rate_limit(mut self, max_requests: u32) -> Self {
        self.config.rate_limit_write_max_requests = max_requests;
        self
    }

    pub fn write_policy(mut self, policy: CacheWritePolicy) -> Self {
        self.config.recipe_cache_write_policy = policy;
        self
    }

    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.config.recipe_cache_ttl_seconds = seconds;
        self
    }

    pub fn build(self) -> TestApp {
        let clock = ManualClock::new(constants::T0);
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let repository = Arc::new(MockRecipeRepository::new());

        let state = Arc::new(AppState::from_parts(
            self.config,
            store.clone(),
            repository.clone(),
            clock.clone(),
        ));

        let server = TestServer::new(create_router(state.clone()))
            .expect("Failed to create test server");

        TestApp {
            server,
            state,
            store,
            repository,
            clock,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Test application with default configuration
pub fn test_app() -> TestApp {
    TestAppBuilder::new().build()
}

/// A stored recipe row with deterministic timestamps
pub fn sample_recipe(recipe_id: i64) -> Recipe {
    let created = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    Recipe {
        recipe_id,
        recipe_description: "Shakshuka".to_string(),
        recipe_ingredients: vec![
            "6 eggs".to_string(),
            "1 can tomatoes".to_string(),
            "1 onion".to_string(),
        ],
        recipe_equipment: vec!["skillet".to_string()],
        recipe_steps: vec![
            "Soften the onion".to_string(),
            "Add tomatoes and simmer".to_string(),
            "Crack in the eggs and cover".to_string(),
        ],
        preparation_time: 30,
        serving_size: 4,
        created_at: created,
        updated_at: created,
    }
}

/// JSON body for `POST /recipes`
pub fn new_recipe_json() -> serde_json::Value {
    serde_json::json!({
        "recipe_description": "Pancakes",
        "recipe_ingredients": ["flour", "milk", "eggs"],
        "recipe_equipment": ["pan", "whisk"],
        "recipe_steps": ["Mix", "Rest", "Fry"],
        "preparation_time": 20,
        "serving_size": 2
    })
}
