//! Small in-memory cache with per-entry expiry.
//!
//! Provider URLs for lyrics and media are usually signed and stop working
//! after a while, so entries carry an optional absolute `expired_at`. An
//! expired entry behaves exactly like a missing one.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expired_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    fn is_alive(&self, now: DateTime<Utc>) -> bool {
        self.expired_at.map(|at| now < at).unwrap_or(true)
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value unless it is missing or expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_alive(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`. `ttl` of `None` never expires.
    pub fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let expired_at = ttl.map(|ttl| Utc::now() + ttl);
        self.insert_until(key, value, expired_at);
    }

    pub fn insert_until(&self, key: K, value: V, expired_at: Option<DateTime<Utc>>) {
        self.entries
            .lock()
            .insert(key, CacheEntry { value, expired_at });
    }

    /// Returns the live value for `key`, computing and storing it first when
    /// absent. The lookup and the store happen under one lock.
    pub fn get_or_insert_with<F>(&self, key: K, ttl: Option<Duration>, make: F) -> V
    where
        F: FnOnce() -> V,
    {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            if entry.is_alive(now) {
                return entry.value.clone();
            }
        }
        let value = make();
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expired_at: ttl.map(|ttl| now + ttl),
            },
        );
        value
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_alive(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
