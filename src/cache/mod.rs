//! File-backed result cache with per-entry TTL and a bounded entry count.
//!
//! The backing store is a single JSON file mapping key -> {created_at,
//! payload}. Reads expire stale entries in place; writes evict the oldest
//! entries by insertion timestamp once the cap is exceeded. This is
//! deliberately not an LRU: read recency never changes eviction order.
//!
//! Writes go through a temp file and an atomic rename, so a crashed writer
//! never leaves a half-written store behind. Concurrent writer processes are
//! still outside the deployment model.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    created_at: i64,
    payload: Value,
}

type Store = BTreeMap<String, CacheEntry>;

#[derive(Debug)]
pub struct ResultCache {
    path: PathBuf,
    ttl_secs: i64,
    max_entries: usize,
}

/// Derive a deterministic cache key from normalized parameters.
///
/// Parameters are lowercased, whitespace-collapsed, and joined under a
/// namespace so different lookup kinds never collide.
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut material = String::from(namespace);
    for part in parts {
        material.push('|');
        material.push_str(&normalize(part));
    }
    format!("{:x}", md5::compute(material.as_bytes()))
}

fn normalize(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            ttl_secs: ttl_secs as i64,
            max_entries,
        }
    }

    /// Fetch a payload if present and fresh. Expired entries are removed from
    /// the store as a side effect.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now().timestamp())
    }

    /// Insert or overwrite a payload, evicting the oldest entries past the cap.
    pub fn put(&self, key: &str, payload: Value) {
        self.put_at(key, payload, Utc::now().timestamp());
    }

    fn get_at(&self, key: &str, now: i64) -> Option<Value> {
        let mut store = self.load();
        let entry = store.get(key)?;

        if entry.created_at + self.ttl_secs <= now {
            debug!(key, "cache entry expired, removing");
            store.remove(key);
            self.persist(&store);
            return None;
        }

        Some(entry.payload.clone())
    }

    fn put_at(&self, key: &str, payload: Value, now: i64) {
        let mut store = self.load();
        store.insert(
            key.to_string(),
            CacheEntry {
                created_at: now,
                payload,
            },
        );

        if store.len() > self.max_entries {
            // The entry just written must survive eviction even when other
            // entries share its timestamp, so it is set aside and only the
            // rest compete for the remaining slots.
            let kept = store.remove(key);
            let mut entries: Vec<(String, CacheEntry)> = store.into_iter().collect();
            entries.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
            entries.truncate(self.max_entries.saturating_sub(1));
            store = entries.into_iter().collect();
            if let Some(entry) = kept {
                store.insert(key.to_string(), entry);
            }
        }

        self.persist(&store);
    }

    /// Load the whole store. A missing or corrupt file counts as empty.
    fn load(&self) -> Store {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Store::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(store) => store,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache file unreadable, starting empty");
                Store::new()
            }
        }
    }

    /// Persist via temp file + rename so readers never see partial writes.
    fn persist(&self, store: &Store) {
        let serialized = match serde_json::to_string(store) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "failed to serialize cache store");
                return;
            }
        };
        let tmp = self.path.with_extension("tmp");
        if let Err(err) = std::fs::write(&tmp, serialized) {
            warn!(path = %tmp.display(), error = %err, "failed to write cache file");
            return;
        }
        if let Err(err) = std::fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to replace cache file");
        }
    }

    #[cfg(test)]
    fn dump_keys(&self) -> Vec<String> {
        self.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn cache_in(dir: &tempfile::TempDir, ttl: u64, cap: usize) -> ResultCache {
        ResultCache::new(dir.path().join("cache.json"), ttl, cap)
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 3600, 10);

        cache.put("k1", json!({"answer": 42}));
        assert_eq!(cache.get("k1"), Some(json!({"answer": 42})));
    }

    #[test]
    fn expired_entries_are_removed_on_read() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 60, 10);

        cache.put_at("k1", json!("stale"), 1000);
        // Fresh just before the TTL boundary.
        assert_eq!(cache.get_at("k1", 1059), Some(json!("stale")));
        // Expired at the boundary, and gone from subsequent dumps.
        assert_eq!(cache.get_at("k1", 1060), None);
        assert!(cache.dump_keys().is_empty());
    }

    #[test]
    fn eviction_keeps_newest_entries_by_insertion() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 3600, 3);

        for i in 0..5 {
            cache.put_at(&format!("k{i}"), json!(i), 1000 + i);
        }

        let mut keys = cache.dump_keys();
        keys.sort();
        assert_eq!(keys, vec!["k2", "k3", "k4"]);
    }

    #[test]
    fn put_then_get_holds_at_the_cap_with_tied_timestamps() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 3600, 3);

        // Four inserts in the same second; key order must not decide who
        // survives: the last write always does.
        for key in ["a", "b", "c", "z"] {
            cache.put_at(key, json!(key), 1000);
        }

        assert_eq!(
            cache.get_at("z", 1000),
            Some(json!("z")),
            "entry inserted last must survive eviction"
        );
        assert_eq!(cache.dump_keys().len(), 3);
    }

    #[test]
    fn overwrite_refreshes_timestamp() {
        let dir = tempdir().unwrap();
        let cache = cache_in(&dir, 60, 10);

        cache.put_at("k1", json!("old"), 1000);
        cache.put_at("k1", json!("new"), 2000);
        assert_eq!(cache.get_at("k1", 2030), Some(json!("new")));
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{{{ not json").unwrap();

        let cache = ResultCache::new(&path, 3600, 10);
        assert_eq!(cache.get("anything"), None);

        // Writes still work after the corrupt read.
        cache.put("k1", json!(true));
        assert_eq!(cache.get("k1"), Some(json!(true)));
    }

    #[test]
    fn cache_key_is_deterministic_and_normalized() {
        let a = cache_key("semantic", &["  Brake   PADS  ", "2000"]);
        let b = cache_key("semantic", &["brake pads", "2000"]);
        assert_eq!(a, b);

        let c = cache_key("parts", &["brake pads", "2000"]);
        assert_ne!(a, c, "namespaces must not collide");
    }
}
