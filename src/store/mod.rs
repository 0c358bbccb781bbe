//! Key-value store abstraction
//!
//! The rate limiter and the recipe cache talk to the store only through
//! [`KeyValueStore`]. Production uses Redis; a process-local implementation
//! backs single-instance deployments and tests.

pub mod in_memory;
pub mod redis;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

pub use self::in_memory::InMemoryStore;
pub use self::redis::RedisStore;

/// Failure talking to the key-value store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Key-value store unavailable during {operation} on '{key}': {message}")]
    Unavailable {
        operation: &'static str,
        key: String,
        message: String,
    },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, key: &str, message: impl ToString) -> Self {
        StoreError::Unavailable {
            operation,
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sorted-set, hash and string operations with per-key expiry
///
/// Scores are epoch milliseconds. Range bounds are inclusive on both ends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Remove sorted-set members with `min <= score <= max`; returns how many were removed
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64>;

    /// Members with `min <= score <= max`, ordered by score
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>>;

    /// Add a member and reset the key's TTL as one atomic batch
    async fn zadd_with_expire(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl_seconds: u64,
    ) -> StoreResult<()>;

    /// All fields of a hash; empty when the key is absent
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Replace the whole hash and set its TTL as one atomic batch
    async fn hset_with_expire(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl_seconds: u64,
    ) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()>;

    /// Delete a key of any type; returns whether it existed
    async fn del(&self, key: &str) -> StoreResult<bool>;

    /// Round-trip check used by health probes
    async fn ping(&self) -> StoreResult<()>;
}
