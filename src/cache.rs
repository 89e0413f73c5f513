// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cache port (C9): a best-effort, interface-only external collaborator.
//!
//! Projection and query handlers consume this trait for read-through caching
//! and invalidation. Every implementation must treat failures as non-fatal:
//! a cache fault logs and returns `None`/`false`, never propagates.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::warn;

/// Keyed read-through cache with glob pattern invalidation.
///
/// This is never a source of truth (see [`crate::projection`] for that);
/// removing a `CachePort` implementation entirely must not change any
/// functional outcome of commands or queries.
#[async_trait]
pub trait CachePort: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>);
    async fn del(&self, key: &str);
    /// Delete every key matching a `*`-glob pattern.
    async fn del_pattern(&self, glob: &str);
    async fn exists(&self, key: &str) -> bool;
    async fn get_ttl(&self, key: &str) -> Option<Duration>;
    async fn update_ttl(&self, key: &str, ttl: Duration);
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// In-memory reference implementation, used by default and by tests.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry) -> bool {
        match entry.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }

    fn matches_glob(key: &str, glob: &str) -> bool {
        match glob.split_once('*') {
            None => key == glob,
            Some((prefix, suffix)) => key.starts_with(prefix) && key.ends_with(suffix),
        }
    }
}

#[async_trait]
impl CachePort for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).filter(|e| Self::is_live(e)).map(|e| e.value.clone()),
            Err(_) => {
                warn!(key, "cache lock poisoned on get");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|d| Instant::now() + d);
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), Entry { value, expires_at });
            }
            Err(_) => warn!(key, "cache lock poisoned on set"),
        }
    }

    async fn del(&self, key: &str) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.remove(key);
            }
            Err(_) => warn!(key, "cache lock poisoned on del"),
        }
    }

    async fn del_pattern(&self, glob: &str) {
        match self.entries.write() {
            Ok(mut entries) => entries.retain(|key, _| !Self::matches_glob(key, glob)),
            Err(_) => warn!(glob, "cache lock poisoned on del_pattern"),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn get_ttl(&self, key: &str) -> Option<Duration> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).filter(|e| Self::is_live(e)).and_then(|e| e.expires_at).map(|at| at.saturating_duration_since(Instant::now())),
            Err(_) => None,
        }
    }

    async fn update_ttl(&self, key: &str, ttl: Duration) {
        match self.entries.write() {
            Ok(mut entries) => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = Some(Instant::now() + ttl);
                }
            }
            Err(_) => warn!(key, "cache lock poisoned on update_ttl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = InMemoryCache::new();
        cache.set("book:get:1", "payload".to_string(), None).await;
        assert_eq!(cache.get("book:get:1").await, Some("payload".to_string()));
    }

    #[tokio::test]
    async fn del_pattern_removes_matching_keys_only() {
        let cache = InMemoryCache::new();
        cache.set("book:get:1", "a".to_string(), None).await;
        cache.set("catalog:list:all", "b".to_string(), None).await;
        cache.del_pattern("catalog:list:*").await;
        assert!(cache.exists("book:get:1").await);
        assert!(!cache.exists("catalog:list:all").await);
    }

    #[tokio::test]
    async fn ttl_expiry_makes_entry_invisible() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".to_string(), Some(Duration::from_millis(1))).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn missing_key_never_errors() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("nope").await, None);
        assert!(!cache.exists("nope").await);
        assert_eq!(cache.get_ttl("nope").await, None);
        cache.del("nope").await; // must not panic
    }
}
