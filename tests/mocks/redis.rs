//! Redis test helpers
//!
//! Runs the Redis-backed store against a real server when one is reachable
//! and skips otherwise. Keys are namespaced per test run and removed on
//! `cleanup`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use recipe_service::store::RedisStore;

/// Default Redis URL for testing
pub const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Test key prefix to avoid collisions with production data
pub const TEST_KEY_PREFIX: &str = "recipe_service:test:";

/// Counter for generating unique test namespaces
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Real Redis connection with a private key namespace
pub struct TestRedis {
    conn: redis::aio::ConnectionManager,
    namespace: String,
    tracked_keys: std::sync::Mutex<Vec<String>>,
}

impl TestRedis {
    /// Try to connect to Redis for testing
    ///
    /// Returns `None` if Redis is unavailable so tests can skip.
    pub async fn connect() -> Option<Self> {
        let client = redis::Client::open(TEST_REDIS_URL).ok()?;
        let conn = client.get_connection_manager().await.ok()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let namespace = format!("{}{}_{}", TEST_KEY_PREFIX, timestamp, counter);

        Some(Self {
            conn,
            namespace,
            tracked_keys: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// Store sharing this connection
    pub fn store(&self) -> Arc<RedisStore> {
        Arc::new(RedisStore::new(self.conn.clone()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Create a namespaced key and track it for cleanup
    pub fn key(&self, suffix: &str) -> String {
        let key = format!("{}:{}", self.namespace, suffix);
        self.tracked_keys.lock().unwrap().push(key.clone());
        key
    }

    /// Remaining TTL of a key in seconds, as reported by Redis
    pub async fn ttl(&self, key: &str) -> redis::RedisResult<i64> {
        let mut conn = self.conn.clone();
        conn.ttl(key).await
    }

    /// Clean up all tracked keys created during this test
    pub async fn cleanup(&self) -> redis::RedisResult<()> {
        let keys: Vec<String> = self.tracked_keys.lock().unwrap().clone();
        let mut conn = self.conn.clone();
        for key in keys {
            let _: redis::RedisResult<()> = conn.del(&key).await;
        }
        Ok(())
    }
}

/// Check if Redis is available at the default URL
pub async fn is_redis_available() -> bool {
    TestRedis::connect().await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_service::clock::ManualClock;
    use recipe_service::middleware::rate_limiter::{RateLimitConfig, RateLimiter};
    use recipe_service::store::KeyValueStore;

    macro_rules! redis_or_skip {
        () => {
            match TestRedis::connect().await {
                Some(r) => r,
                None => {
                    eprintln!("Skipping test: Redis not available at {}", TEST_REDIS_URL);
                    return;
                }
            }
        };
    }

    #[tokio::test]
    async fn test_redis_connection_check() {
        if is_redis_available().await {
            println!("Redis is available for testing");
        } else {
            println!("Redis is not available - dependent tests will be skipped");
        }
    }

    #[tokio::test]
    async fn test_string_roundtrip_and_delete() {
        let redis = redis_or_skip!();
        let store = redis.store();
        let key = redis.key("plain");

        store.set_ex(&key, "value", 60).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some("value".to_string()));
        assert!(store.del(&key).await.unwrap());
        assert!(!store.del(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);

        redis.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_hash_write_replaces_previous_fields() {
        let redis = redis_or_skip!();
        let store = redis.store();
        let key = redis.key("hash");

        let first = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        store.hset_with_expire(&key, &first, 120).await.unwrap();

        let second = vec![("a".to_string(), "3".to_string())];
        store.hset_with_expire(&key, &second, 120).await.unwrap();

        let fields = store.hgetall(&key).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("a").map(String::as_str), Some("3"));

        let ttl = redis.ttl(&key).await.unwrap();
        assert!(ttl > 0 && ttl <= 120);

        redis.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_hash_is_empty() {
        let redis = redis_or_skip!();
        let store = redis.store();
        let key = redis.key("absent");

        assert!(store.hgetall(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sorted_set_prune_and_range() {
        let redis = redis_or_skip!();
        let store = redis.store();
        let key = redis.key("window");

        for score in [10.0, 20.0, 30.0] {
            store
                .zadd_with_expire(&key, score, &format!("{}:m", score), 60)
                .await
                .unwrap();
        }

        let removed = store
            .zrem_range_by_score(&key, f64::NEG_INFINITY, 20.0)
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let remaining = store.zrange_by_score(&key, 0.0, 100.0).await.unwrap();
        assert_eq!(remaining, vec!["30:m".to_string()]);

        redis.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limiter_against_redis() {
        let redis = redis_or_skip!();
        let clock = ManualClock::starting_now();
        let prefix = redis.namespace().to_string();
        let limiter = RateLimiter::new(
            redis.store(),
            clock.clone(),
            RateLimitConfig::new(2, 1.0, &prefix),
        );
        redis.key("10.0.0.1:GET /recipes/:id");

        let first = limiter
            .check_and_record("10.0.0.1", "GET /recipes/:id", None, None)
            .await
            .unwrap();
        let second = limiter
            .check_and_record("10.0.0.1", "GET /recipes/:id", None, None)
            .await
            .unwrap();
        let third = limiter
            .check_and_record("10.0.0.1", "GET /recipes/:id", None, None)
            .await
            .unwrap();

        assert!(first.is_admitted());
        assert!(second.is_admitted());
        assert!(!third.is_admitted());
        assert_eq!(third.info().remaining, 0);

        redis.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping() {
        let redis = redis_or_skip!();
        tokio_test::assert_ok!(redis.store().ping().await);
    }
}
