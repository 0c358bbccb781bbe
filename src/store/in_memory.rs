//! In-memory key-value store
//!
//! Process-local stand-in for Redis, used for single-instance deployments
//! (`KV_BACKEND=memory`) and in tests. Expiry is evaluated lazily against the
//! injected [`Clock`], so tests can move time forward without sleeping.
//! Keys nobody touches again are dropped by a full sweep that runs once every
//! [`SWEEP_EVERY`] writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{KeyValueStore, StoreError, StoreResult};
use crate::clock::{Clock, SystemClock};

/// Writes between two sweeps of expired keys
pub const SWEEP_EVERY: u64 = 128;

enum Value {
    String(String),
    Hash(HashMap<String, String>),
    SortedSet(HashMap<String, f64>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "zset",
        }
    }
}

/// Entry in the in-memory store with expiration
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// In-memory store
///
/// # Thread Safety
///
/// Uses RwLock for interior mutability. Each trait call holds the lock for
/// its whole duration, so batched writes are atomic with respect to readers.
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            clock,
            unavailable: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Make every subsequent call fail as if the store were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.data
            .read()
            .map(|data| data.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining TTL of a key in milliseconds, `None` if absent or persistent
    pub fn ttl_millis(&self, key: &str) -> Option<i64> {
        let now = self.clock.now_millis();
        let data = self.data.read().ok()?;
        data.get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|exp| exp - now)
    }

    /// Number of stored keys, expired ones included
    pub fn stored_keys(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    /// Drop every expired key, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        self.data
            .write()
            .map(|mut data| Self::sweep(&mut data, now))
            .unwrap_or(0)
    }

    fn sweep(data: &mut HashMap<String, Entry>, now: i64) -> usize {
        let before = data.len();
        data.retain(|_, e| !e.is_expired(now));
        before - data.len()
    }

    /// Clear all entries (useful for test isolation)
    pub fn clear(&self) {
        if let Ok(mut data) = self.data.write() {
            data.clear();
        }
    }

    fn check_available(&self, operation: &'static str, key: &str) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(operation, key, "connection refused"));
        }
        Ok(())
    }

    fn read(
        &self,
        operation: &'static str,
        key: &str,
    ) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.check_available(operation, key)?;
        self.data
            .read()
            .map_err(|_| StoreError::unavailable(operation, key, "store lock poisoned"))
    }

    fn write(
        &self,
        operation: &'static str,
        key: &str,
    ) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.check_available(operation, key)?;
        let mut data = self
            .data
            .write()
            .map_err(|_| StoreError::unavailable(operation, key, "store lock poisoned"))?;

        let now = self.clock.now_millis();
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            Self::sweep(&mut data, now);
        } else if data.get(key).map(|e| e.is_expired(now)).unwrap_or(false) {
            // Writers always start from an empty key.
            data.remove(key);
        }
        Ok(data)
    }

    fn live<'a>(data: &'a HashMap<String, Entry>, key: &str, now: i64) -> Option<&'a Entry> {
        data.get(key).filter(|e| !e.is_expired(now))
    }

    fn wrong_type(operation: &'static str, key: &str, found: &Value) -> StoreError {
        StoreError::unavailable(
            operation,
            key,
            format!("WRONGTYPE key holds a {}", found.type_name()),
        )
    }

    fn expiry(&self, ttl_seconds: u64) -> i64 {
        self.clock.now_millis() + (ttl_seconds as i64) * 1000
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        let mut data = self.write("ZREMRANGEBYSCORE", key)?;

        let Some(entry) = data.get_mut(key) else {
            return Ok(0);
        };
        let removed = match &mut entry.value {
            Value::SortedSet(members) => {
                let before = members.len();
                members.retain(|_, score| *score < min || *score > max);
                (before - members.len()) as u64
            }
            other => return Err(Self::wrong_type("ZREMRANGEBYSCORE", key, other)),
        };

        if matches!(&entry.value, Value::SortedSet(m) if m.is_empty()) {
            data.remove(key);
        }
        Ok(removed)
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>> {
        let data = self.read("ZRANGEBYSCORE", key)?;
        let now = self.clock.now_millis();

        match Self::live(&data, key, now).map(|e| &e.value) {
            None => Ok(Vec::new()),
            Some(Value::SortedSet(members)) => {
                let mut in_range: Vec<(&String, f64)> = members
                    .iter()
                    .filter(|(_, score)| **score >= min && **score <= max)
                    .map(|(member, score)| (member, *score))
                    .collect();
                in_range.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
                Ok(in_range.into_iter().map(|(m, _)| m.clone()).collect())
            }
            Some(other) => Err(Self::wrong_type("ZRANGEBYSCORE", key, other)),
        }
    }

    async fn zadd_with_expire(
        &self,
        key: &str,
        score: f64,
        member: &str,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        let expires_at = self.expiry(ttl_seconds);
        let mut data = self.write("ZADD+EXPIRE", key)?;

        let entry = data.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::SortedSet(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::SortedSet(members) => {
                members.insert(member.to_string(), score);
            }
            other => return Err(Self::wrong_type("ZADD+EXPIRE", key, other)),
        }
        entry.expires_at = Some(expires_at);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let data = self.read("HGETALL", key)?;
        let now = self.clock.now_millis();

        match Self::live(&data, key, now).map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(fields)) => Ok(fields.clone()),
            Some(other) => Err(Self::wrong_type("HGETALL", key, other)),
        }
    }

    async fn hset_with_expire(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        let expires_at = self.expiry(ttl_seconds);
        let mut data = self.write("DEL+HSET+EXPIRE", key)?;

        if fields.is_empty() {
            data.remove(key);
            return Ok(());
        }

        data.insert(
            key.to_string(),
            Entry {
                value: Value::Hash(fields.iter().cloned().collect()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let data = self.read("GET", key)?;
        let now = self.clock.now_millis();

        match Self::live(&data, key, now).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Self::wrong_type("GET", key, other)),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> StoreResult<()> {
        let expires_at = self.expiry(ttl_seconds);
        let mut data = self.write("SETEX", key)?;
        data.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let mut data = self.write("DEL", key)?;
        Ok(data.remove(key).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available("PING", "")
    }
}
