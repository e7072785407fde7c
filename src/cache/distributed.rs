//! Distributed cache backend
//!
//! Multiple machines running the same workloads can share decisions
//! through an external key-value store. The store itself stays behind the
//! [`KvStore`] capability: the core only ever calls save/load/delete/ping/
//! keys/stats, so swapping Redis for anything else is a configuration
//! change, not a code change. No transport ships with this crate; an
//! in-memory reference backend exists for tests and embedding.
//!
//! Saves write through to the backend (local files remain the backup);
//! loads try the backend first and fall back to local files. The
//! "is the backend alive" predicate is itself cached for one second so a
//! burst of optimize calls does not pay one ping each.

use super::CacheEntry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// TTL for the cached backend-enabled predicate
pub const ENABLED_CACHE_TTL: Duration = Duration::from_secs(1);

/// Default key prefix in the shared store
pub const DEFAULT_KEY_PREFIX: &str = "amorsize:";

/// Capability interface to an external key-value store
///
/// Errors are plain strings: the cache layer never inspects them beyond
/// logging a miss reason, and transports differ too much for a shared
/// error taxonomy to pay its way.
pub trait KvStore: Send + Sync {
    /// Store a value under a key with a time-to-live
    fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), String>;
    /// Fetch a value; Ok(None) is a clean miss
    fn load(&self, key: &str) -> Result<Option<String>, String>;
    /// Delete a key; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool, String>;
    /// Liveness check
    fn ping(&self) -> Result<(), String>;
    /// Keys matching a glob-ish pattern (`*` wildcard)
    fn keys(&self, pattern: &str) -> Result<Vec<String>, String>;
    /// Backend statistics as name/value pairs
    fn stats(&self) -> Result<HashMap<String, String>, String>;
}

/// Settings applied to the configured backend
#[derive(Debug, Clone)]
pub struct DistributedCacheConfig {
    /// Prefix prepended to every cache key
    pub key_prefix: String,
    /// TTL handed to the backend on save
    pub ttl: Duration,
}

impl Default for DistributedCacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: super::DEFAULT_TTL,
        }
    }
}

struct Backend {
    store: Arc<dyn KvStore>,
    config: DistributedCacheConfig,
}

static BACKEND: Mutex<Option<Backend>> = Mutex::new(None);
static ENABLED_CACHE: Mutex<Option<(bool, Instant)>> = Mutex::new(None);

/// Configure distributed caching with a backend implementation
///
/// Pings the backend once; on failure the backend is not installed and
/// false is returned. Returns true when distributed caching is active.
pub fn configure_distributed_cache(
    store: Arc<dyn KvStore>,
    config: DistributedCacheConfig,
) -> bool {
    if let Err(e) = store.ping() {
        eprintln!("warning: distributed cache backend unreachable: {e}; falling back to local cache");
        return false;
    }
    *BACKEND.lock().unwrap() = Some(Backend { store, config });
    clear_enabled_cache();
    true
}

/// Drop the configured backend and fall back to local files only
pub fn disable_distributed_cache() {
    *BACKEND.lock().unwrap() = None;
    clear_enabled_cache();
}

/// Whether a configured backend is currently responding
///
/// The answer is cached for [`ENABLED_CACHE_TTL`]: this predicate runs
/// twice per optimize call (load and save), and a ping per call would put
/// a network round trip on the hot path.
pub fn is_distributed_cache_enabled() -> bool {
    {
        let cached = ENABLED_CACHE.lock().unwrap();
        if let Some((enabled, stamped)) = *cached {
            if stamped.elapsed() < ENABLED_CACHE_TTL {
                return enabled;
            }
        }
    }

    let enabled = {
        let backend = BACKEND.lock().unwrap();
        match backend.as_ref() {
            Some(backend) => backend.store.ping().is_ok(),
            None => false,
        }
    };
    *ENABLED_CACHE.lock().unwrap() = Some((enabled, Instant::now()));
    enabled
}

/// Forget the cached enabled predicate. Test-only entry point.
pub fn clear_enabled_cache() {
    *ENABLED_CACHE.lock().unwrap() = None;
}

/// Write an entry through to the backend; false on any failure
pub fn save_to_distributed(cache_key: &str, entry: &CacheEntry) -> bool {
    let json = match serde_json::to_string(entry) {
        Ok(json) => json,
        Err(_) => return false,
    };
    let backend = BACKEND.lock().unwrap();
    let Some(backend) = backend.as_ref() else {
        return false;
    };
    let key = format!("{}{}", backend.config.key_prefix, cache_key);
    backend.store.save(&key, &json, backend.config.ttl).is_ok()
}

/// Load an entry from the backend
///
/// Validates schema version and system compatibility like the local path;
/// expiry is the backend's job via the TTL handed to `save`.
pub fn load_from_distributed(cache_key: &str) -> (Option<CacheEntry>, String) {
    let json = {
        let backend = BACKEND.lock().unwrap();
        let Some(backend) = backend.as_ref() else {
            return (None, "distributed cache not configured".to_string());
        };
        let key = format!("{}{}", backend.config.key_prefix, cache_key);
        match backend.store.load(&key) {
            Ok(Some(json)) => json,
            Ok(None) => return (None, "no entry in distributed cache".to_string()),
            Err(e) => return (None, format!("distributed cache load failed: {e}")),
        }
    };

    let entry: CacheEntry = match serde_json::from_str(&json) {
        Ok(entry) => entry,
        Err(e) => return (None, format!("malformed distributed entry: {e}")),
    };
    if entry.schema_version != super::SCHEMA_VERSION {
        return (
            None,
            format!(
                "cache format version mismatch (cached: v{}, current: v{})",
                entry.schema_version,
                super::SCHEMA_VERSION
            ),
        );
    }
    if let Err(reason) = entry.is_system_compatible() {
        return (None, reason);
    }
    (Some(entry), String::new())
}

/// Delete keys matching a pattern from the backend; returns count removed
pub fn clear_distributed_cache(pattern: &str) -> usize {
    let backend = BACKEND.lock().unwrap();
    let Some(backend) = backend.as_ref() else {
        return 0;
    };
    let full_pattern = format!("{}{}", backend.config.key_prefix, pattern);
    let keys = match backend.store.keys(&full_pattern) {
        Ok(keys) => keys,
        Err(_) => return 0,
    };
    let mut removed = 0;
    for key in keys {
        if let Ok(true) = backend.store.delete(&key) {
            removed += 1;
        }
    }
    removed
}

/// Backend statistics, or an `enabled: false` marker when unconfigured
pub fn distributed_cache_stats() -> HashMap<String, String> {
    let backend = BACKEND.lock().unwrap();
    match backend.as_ref() {
        Some(backend) => {
            let mut stats = backend.store.stats().unwrap_or_default();
            stats.insert("enabled".to_string(), "true".to_string());
            stats.insert("key_prefix".to_string(), backend.config.key_prefix.clone());
            stats
        }
        None => {
            let mut stats = HashMap::new();
            stats.insert("enabled".to_string(), "false".to_string());
            stats
        }
    }
}

/// In-memory reference backend
///
/// Honors TTLs and `*` wildcards; useful in tests and single-process
/// embeddings that want the distributed code path without a network.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), String> {
        let expiry = Instant::now().checked_add(ttl);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), expiry));
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expiry)) => {
                if expiry.is_some_and(|at| Instant::now() >= at) {
                    entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(value.clone()))
                }
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<bool, String> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    fn ping(&self) -> Result<(), String> {
        Ok(())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, String> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    fn stats(&self) -> Result<HashMap<String, String>, String> {
        let entries = self.entries.lock().unwrap();
        let mut stats = HashMap::new();
        stats.insert("backend".to_string(), "in-memory".to_string());
        stats.insert("keys".to_string(), entries.len().to_string());
        Ok(stats)
    }
}

/// Minimal `*`-wildcard matcher, enough for key patterns
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut position = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match text[position..].find(part) {
            Some(found) => {
                // An anchored first segment must match at the start.
                if i == 0 && found != 0 {
                    return false;
                }
                position += found + part.len();
            }
            None => return false,
        }
    }
    // An anchored last segment must reach the end.
    if !pattern.ends_with('*') && !text.ends_with(parts[parts.len() - 1]) {
        return false;
    }
    true
}
