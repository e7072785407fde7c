//! Task fingerprinting and cache key derivation
//!
//! A decision is worth caching only if we can recognize the same workload
//! later. Recognition has three parts: a deterministic hash of the task's
//! stable identity, a coarse bucket for the input size, and a coarse bucket
//! for the per-item execution time. Bucketing keeps keys from being
//! over-specific: a run over 950 items at 2.1 ms and one over 800 items at
//! 2.4 ms should hit the same entry.
//!
//! Hashes are cached process-wide, keyed by the task's address, with a
//! read-fast/write-slow double-checked locking pattern. The cache carries
//! the same caveat as any identity-address scheme: addresses can be reused
//! after a task is dropped, so tests that churn through tasks should call
//! [`clear_function_hash_cache`] between cases.

use crate::cache::SCHEMA_VERSION;
use crate::task::Task;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

static HASH_CACHE: RwLock<Option<HashMap<usize, String>>> = RwLock::new(None);

/// First 16 hex characters of SHA-256 over the task's stable identity
pub fn function_hash<W: Task + ?Sized>(task: &W) -> String {
    let key = task as *const W as *const () as usize;

    // Fast path: shared read, no exclusive lock.
    if let Some(cache) = HASH_CACHE.read().unwrap().as_ref() {
        if let Some(hash) = cache.get(&key) {
            return hash.clone();
        }
    }

    let mut guard = HASH_CACHE.write().unwrap();
    let cache = guard.get_or_insert_with(HashMap::new);
    // Re-check: another thread may have filled the slot while we waited.
    if let Some(hash) = cache.get(&key) {
        return hash.clone();
    }

    let hash = compute_hash(&task.stable_identity());
    cache.insert(key, hash.clone());
    hash
}

fn compute_hash(identity: &[u8]) -> String {
    let digest = Sha256::digest(identity);
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Clear the function hash cache. Test-only entry point.
pub fn clear_function_hash_cache() {
    let mut guard = HASH_CACHE.write().unwrap();
    if let Some(cache) = guard.as_mut() {
        cache.clear();
    }
}

/// Task complexity metric: length of the stable identity in bytes
///
/// Persisted alongside cache entries as a training feature; plays no part
/// in the decision itself.
pub fn function_complexity<W: Task + ?Sized>(task: &W) -> u64 {
    task.stable_identity().len() as u64
}

/// Bucket an input size into a coarse class
pub fn size_bucket(data_size: usize) -> &'static str {
    if data_size < 10 {
        "tiny"
    } else if data_size < 100 {
        "small"
    } else if data_size < 1000 {
        "medium"
    } else if data_size < 10000 {
        "large"
    } else {
        "xlarge"
    }
}

/// Bucket a per-item execution time into a coarse class (log scale)
pub fn time_bucket(avg_time_s: f64) -> &'static str {
    if avg_time_s < 0.0001 {
        "instant"
    } else if avg_time_s < 0.001 {
        "fast"
    } else if avg_time_s < 0.01 {
        "moderate"
    } else if avg_time_s < 0.1 {
        "slow"
    } else {
        "very_slow"
    }
}

/// Cache key for an optimization decision
///
/// Format: `func:{hex16}_size:{bucket}_time:{bucket}_v:{version}`.
pub fn cache_key<W: Task + ?Sized>(task: &W, data_size: usize, avg_time_s: f64) -> String {
    format!(
        "func:{}_size:{}_time:{}_v:{}",
        function_hash(task),
        size_bucket(data_size),
        time_bucket(avg_time_s),
        SCHEMA_VERSION
    )
}

/// Cache key for an empirical benchmark measurement
///
/// Benchmarks are repeatable only at the exact workload size, so the size
/// is embedded unbucketed.
pub fn benchmark_cache_key<W: Task + ?Sized>(task: &W, data_size: usize) -> String {
    format!(
        "benchmark_{}_{}_v{}",
        function_hash(task),
        data_size,
        SCHEMA_VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;

    #[test]
    fn test_hash_is_deterministic() {
        let task = FnTask::new("stable", |x: &u64| x + 1);
        let first = function_hash(&task);
        let second = function_hash(&task);
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_follows_identity() {
        let a = FnTask::new("task-a", |x: &u64| x + 1);
        let b = FnTask::new("task-b", |x: &u64| x + 1);
        clear_function_hash_cache();
        assert_ne!(function_hash(&a), function_hash(&b));
    }

    #[test]
    fn test_hash_survives_cache_clear() {
        let task = FnTask::new("clear-me", |x: &u64| x * 3);
        let before = function_hash(&task);
        clear_function_hash_cache();
        let after = function_hash(&task);
        assert_eq!(before, after);
    }

    #[test]
    fn test_size_buckets() {
        assert_eq!(size_bucket(0), "tiny");
        assert_eq!(size_bucket(9), "tiny");
        assert_eq!(size_bucket(10), "small");
        assert_eq!(size_bucket(99), "small");
        assert_eq!(size_bucket(100), "medium");
        assert_eq!(size_bucket(999), "medium");
        assert_eq!(size_bucket(1000), "large");
        assert_eq!(size_bucket(9999), "large");
        assert_eq!(size_bucket(10000), "xlarge");
    }

    #[test]
    fn test_time_buckets() {
        assert_eq!(time_bucket(0.00005), "instant");
        assert_eq!(time_bucket(0.0005), "fast");
        assert_eq!(time_bucket(0.005), "moderate");
        assert_eq!(time_bucket(0.05), "slow");
        assert_eq!(time_bucket(0.5), "very_slow");
    }

    #[test]
    fn test_cache_key_format() {
        let task = FnTask::new("keyed", |x: &u64| x + 1);
        let key = cache_key(&task, 500, 0.003);
        assert!(key.starts_with("func:"));
        assert!(key.contains("_size:medium_"));
        assert!(key.contains("_time:moderate_"));
        assert!(key.ends_with(&format!("_v:{SCHEMA_VERSION}")));
    }

    #[test]
    fn test_benchmark_key_uses_exact_size() {
        let task = FnTask::new("bench", |x: &u64| x + 1);
        let k1 = benchmark_cache_key(&task, 500);
        let k2 = benchmark_cache_key(&task, 501);
        assert_ne!(k1, k2);
    }
}
