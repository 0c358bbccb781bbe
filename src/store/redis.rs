//! Redis-backed key-value store
//!
//! Every call clones the shared `ConnectionManager`, which multiplexes over a
//! single reconnecting connection.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;

use super::{KeyValueStore, StoreError, StoreResult};

/// Redis store wrapper
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a new Redis store over an established connection manager
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a client and connect
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::unavailable("CONNECT", url, e))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::unavailable("CONNECT", url, e))?;
        Ok(Self::new(conn))
    }
}

fn wrap<'a>(
    operation: &'static str,
    key: &'a str,
) -> impl FnOnce(redis::RedisError) -> StoreError + 'a {
    move |e| StoreError::unavailable(operation, key, e)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .zrembyscore(key, min, max)
            .await
            .map_err(wrap("ZREMRANGEBYSCORE", key))?;
        Ok(removed)
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(key, min, max)
            .await
            .map_err(wrap("ZRANGEBYSCORE", key))?;
        Ok(members)
    }

    async fn zadd_with_expire(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .zadd(key, member, score)
            .ignore()
            .expire(key, ttl_seconds as i64)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(wrap("ZADD+EXPIRE", key))
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(key).await.map_err(wrap("HGETALL", key))?;
        Ok(fields)
    }

    async fn hset_with_expire(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        if fields.is_empty() {
            return self.del(key).await.map(|_| ());
        }

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(key)
            .ignore()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl_seconds as i64)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(wrap("DEL+HSET+EXPIRE", key))
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(wrap("GET", key))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(wrap("SETEX", key))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(wrap("DEL", key))?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(wrap("PING", ""))?;
        Ok(())
    }
}
