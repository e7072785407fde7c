//! Decision cache
//!
//! Optimization decisions are cheap to store and expensive to recompute: a
//! dry run executes the task several times. This module persists decisions
//! as one JSON file per entry under a per-user cache directory, keyed by
//! the bucketed fingerprint from [`crate::fingerprint`], so repeated
//! analyses of the same workload return instantly and survive process
//! restarts.
//!
//! The cache is strictly advisory. Every failure path (missing files,
//! malformed JSON, permission errors, version or system mismatches, remote
//! backend timeouts) degrades to a cache miss with a reason string; no
//! user-visible operation is allowed to fail because of the cache.
//!
//! Writes are atomic: serialize to `{key}.tmp`, then rename onto
//! `{key}.json` in the same directory. Concurrent writers race safely;
//! last writer wins, which is acceptable for advisory entries.
//!
//! Every load additionally runs a probabilistic pruner: with a small fixed
//! probability it sweeps the directory and deletes expired or corrupt
//! entries, amortizing cleanup without a background task.

pub mod distributed;
pub mod maintenance;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bump when the persisted entry format changes; mismatched entries miss
pub const SCHEMA_VERSION: u32 = 1;

/// Default entry time-to-live: 7 days
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Probability that one load triggers a cleanup sweep
pub const AUTO_PRUNE_PROBABILITY: f64 = 0.05;

/// Memory drift tolerance for optimization entries (fractional)
pub const OPTIMIZATION_MEMORY_TOLERANCE: f64 = 0.2;

/// Memory drift tolerance for benchmark entries (stricter)
pub const BENCHMARK_MEMORY_TOLERANCE: f64 = 0.1;

/// Environment variable overriding the cache root (test isolation)
pub const CACHE_DIR_ENV: &str = "AMORSIZE_CACHE_DIR";

/// Which pool dispatch primitive a cached decision targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    /// Batch map: all results collected at once
    Map,
    /// Ordered streaming
    Imap,
    /// Unordered streaming
    ImapUnordered,
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherKind::Map => write!(f, "map"),
            DispatcherKind::Imap => write!(f, "imap"),
            DispatcherKind::ImapUnordered => write!(f, "imap_unordered"),
        }
    }
}

/// System configuration recorded alongside every entry
///
/// Decisions are only portable between sufficiently similar machines; the
/// snapshot is what "similar" is judged against on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    pub physical_cores: usize,
    pub available_memory: u64,
    pub spawn_model: String,
    pub platform: String,
    pub runtime: String,
}

impl PlatformSnapshot {
    /// Snapshot of the current system
    pub fn current() -> Self {
        Self {
            physical_cores: crate::platform::physical_cores(),
            available_memory: crate::platform::available_memory_bytes(),
            spawn_model: crate::platform::spawn_model().to_string(),
            platform: std::env::consts::OS.to_string(),
            runtime: format!("amorsize-{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Check whether the current system matches this snapshot
    ///
    /// Cores and spawn model must match exactly; available memory may
    /// drift within the given fractional tolerance.
    pub fn check_compatible(&self, memory_tolerance: f64) -> Result<(), String> {
        let current_cores = crate::platform::physical_cores();
        if self.physical_cores != current_cores {
            return Err(format!(
                "physical core count changed (cached: {}, current: {})",
                self.physical_cores, current_cores
            ));
        }
        let current_model = crate::platform::spawn_model().to_string();
        if self.spawn_model != current_model {
            return Err(format!(
                "spawn model changed (cached: {}, current: {})",
                self.spawn_model, current_model
            ));
        }
        if self.available_memory > 0 {
            let current_memory = crate::platform::available_memory_bytes();
            let ratio = current_memory as f64 / self.available_memory as f64;
            if ratio < 1.0 - memory_tolerance || ratio > 1.0 + memory_tolerance {
                return Err(format!(
                    "available memory changed significantly (cached: {}, current: {})",
                    crate::profile::format_bytes(self.available_memory),
                    crate::profile::format_bytes(current_memory)
                ));
            }
        }
        Ok(())
    }
}

/// Persisted optimization decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub n_jobs: usize,
    pub chunksize: usize,
    pub dispatcher_kind: DispatcherKind,
    pub estimated_speedup: f64,
    pub reason: String,
    pub warnings: Vec<String>,
    pub created_at_epoch_s: f64,
    pub platform_snapshot: PlatformSnapshot,
    pub schema_version: u32,
    // Training features, optional for forward compatibility
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coefficient_of_variation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_complexity: Option<u64>,
}

impl CacheEntry {
    /// Build an entry stamped with the current time and system snapshot
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_jobs: usize,
        chunksize: usize,
        dispatcher_kind: DispatcherKind,
        estimated_speedup: f64,
        reason: String,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            n_jobs,
            chunksize,
            dispatcher_kind,
            estimated_speedup,
            reason,
            warnings,
            created_at_epoch_s: now_epoch_s(),
            platform_snapshot: PlatformSnapshot::current(),
            schema_version: SCHEMA_VERSION,
            result_size_bytes: None,
            coefficient_of_variation: None,
            function_complexity: None,
        }
    }

    /// Age in seconds (zero-floored against clock changes)
    pub fn age_s(&self) -> f64 {
        (now_epoch_s() - self.created_at_epoch_s).max(0.0)
    }

    /// An entry exactly at the TTL boundary counts as expired
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age_s() >= ttl.as_secs_f64()
    }

    /// System compatibility with the ±20% memory tolerance
    pub fn is_system_compatible(&self) -> Result<(), String> {
        self.platform_snapshot
            .check_compatible(OPTIMIZATION_MEMORY_TOLERANCE)
    }
}

/// Persisted empirical speedup measurement
///
/// Written by the benchmarking collaborator (and the CLI execute mode);
/// keyed by exact data size and gated by the stricter ±10% memory
/// tolerance because measured times are highly system-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkCacheEntry {
    pub serial_time_s: f64,
    pub parallel_time_s: f64,
    pub actual_speedup: f64,
    pub n_jobs: usize,
    pub chunksize: usize,
    pub created_at_epoch_s: f64,
    pub platform_snapshot: PlatformSnapshot,
    pub schema_version: u32,
}

impl BenchmarkCacheEntry {
    pub fn new(
        serial_time_s: f64,
        parallel_time_s: f64,
        actual_speedup: f64,
        n_jobs: usize,
        chunksize: usize,
    ) -> Self {
        Self {
            serial_time_s,
            parallel_time_s,
            actual_speedup,
            n_jobs,
            chunksize,
            created_at_epoch_s: now_epoch_s(),
            platform_snapshot: PlatformSnapshot::current(),
            schema_version: SCHEMA_VERSION,
        }
    }

    pub fn age_s(&self) -> f64 {
        (now_epoch_s() - self.created_at_epoch_s).max(0.0)
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age_s() >= ttl.as_secs_f64()
    }

    pub fn is_system_compatible(&self) -> Result<(), String> {
        self.platform_snapshot
            .check_compatible(BENCHMARK_MEMORY_TOLERANCE)
    }
}

/// Current wall-clock time as fractional epoch seconds
pub fn now_epoch_s() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Root cache directory (`…/amorsize`), honoring the env override
pub fn cache_root() -> PathBuf {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir).join("amorsize");
        }
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("amorsize")
}

/// Directory holding optimization decision entries (created on demand)
pub fn optimization_cache_dir() -> PathBuf {
    let dir = cache_root().join("optimization_cache");
    let _ = fs::create_dir_all(&dir);
    dir
}

/// Directory holding benchmark measurement entries (created on demand)
pub fn benchmark_cache_dir() -> PathBuf {
    let dir = cache_root().join("benchmark_cache");
    let _ = fs::create_dir_all(&dir);
    dir
}

/// Persist an optimization decision, best-effort
///
/// Writes through to the distributed backend when one is enabled, then to
/// the local file cache as backup or primary. Failures are swallowed:
/// caching never breaks the main functionality.
pub fn save_entry(cache_key: &str, entry: &CacheEntry) {
    if distributed::is_distributed_cache_enabled() {
        let _ = distributed::save_to_distributed(cache_key, entry);
    }
    if let Ok(json) = serde_json::to_string_pretty(entry) {
        let _ = write_atomic(&optimization_cache_dir(), cache_key, &json);
    }
}

/// Load an optimization decision
///
/// Tries the distributed backend first when enabled, then the local file
/// cache. Returns the entry or a human-readable miss reason. Validation
/// order: parse, schema version, TTL, system compatibility.
pub fn load_entry(cache_key: &str, ttl: Duration) -> (Option<CacheEntry>, String) {
    if distributed::is_distributed_cache_enabled() {
        let (entry, _reason) = distributed::load_from_distributed(cache_key);
        if let Some(entry) = entry {
            return (Some(entry), String::new());
        }
        // Remote miss falls through to the local cache.
    }

    let dir = optimization_cache_dir();
    let path = dir.join(format!("{cache_key}.json"));

    if !path.exists() {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (None, "no cached entry found for this workload".to_string());
    }

    let parsed: Result<CacheEntry, String> = fs::read_to_string(&path)
        .map_err(|e| format!("failed to read cache entry: {e}"))
        .and_then(|json| {
            serde_json::from_str(&json).map_err(|e| format!("malformed cache entry: {e}"))
        });

    let entry = match parsed {
        Ok(entry) => entry,
        Err(reason) => {
            maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
            return (None, reason);
        }
    };

    if entry.schema_version != SCHEMA_VERSION {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (
            None,
            format!(
                "cache format version mismatch (cached: v{}, current: v{})",
                entry.schema_version, SCHEMA_VERSION
            ),
        );
    }

    if entry.is_expired(ttl) {
        let age_days = entry.age_s() / 86_400.0;
        let ttl_days = ttl.as_secs_f64() / 86_400.0;
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (
            None,
            format!("cache entry expired (age: {age_days:.1} days, TTL: {ttl_days:.1} days)"),
        );
    }

    if let Err(reason) = entry.is_system_compatible() {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (None, reason);
    }

    maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
    (Some(entry), String::new())
}

/// Persist a benchmark measurement, best-effort
pub fn save_benchmark_entry(cache_key: &str, entry: &BenchmarkCacheEntry) {
    if let Ok(json) = serde_json::to_string_pretty(entry) {
        let _ = write_atomic(&benchmark_cache_dir(), cache_key, &json);
    }
}

/// Load a benchmark measurement; same validation ladder as [`load_entry`]
pub fn load_benchmark_entry(
    cache_key: &str,
    ttl: Duration,
) -> (Option<BenchmarkCacheEntry>, String) {
    let dir = benchmark_cache_dir();
    let path = dir.join(format!("{cache_key}.json"));

    if !path.exists() {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (
            None,
            "no cached benchmark result found for this workload".to_string(),
        );
    }

    let parsed: Result<BenchmarkCacheEntry, String> = fs::read_to_string(&path)
        .map_err(|e| format!("failed to read benchmark entry: {e}"))
        .and_then(|json| {
            serde_json::from_str(&json).map_err(|e| format!("malformed benchmark entry: {e}"))
        });

    let entry = match parsed {
        Ok(entry) => entry,
        Err(reason) => {
            maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
            return (None, reason);
        }
    };

    if entry.schema_version != SCHEMA_VERSION {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (
            None,
            format!(
                "cache format version mismatch (cached: v{}, current: v{})",
                entry.schema_version, SCHEMA_VERSION
            ),
        );
    }

    if entry.is_expired(ttl) {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (None, "benchmark entry expired".to_string());
    }

    if let Err(reason) = entry.is_system_compatible() {
        maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
        return (None, reason);
    }

    maybe_auto_prune(&dir, AUTO_PRUNE_PROBABILITY, ttl);
    (Some(entry), String::new())
}

/// Delete all optimization entries; returns how many were removed
pub fn clear_cache() -> usize {
    remove_json_files(&optimization_cache_dir())
}

/// Delete all benchmark entries; returns how many were removed
pub fn clear_benchmark_cache() -> usize {
    remove_json_files(&benchmark_cache_dir())
}

/// Remove optimization entries that are expired or system-incompatible
pub fn prune_expired(ttl: Duration) -> usize {
    let dir = optimization_cache_dir();
    let mut removed = 0;
    for path in json_files(&dir) {
        let delete = match fs::read_to_string(&path)
            .ok()
            .and_then(|json| serde_json::from_str::<CacheEntry>(&json).ok())
        {
            Some(entry) => entry.is_expired(ttl) || entry.is_system_compatible().is_err(),
            // Unreadable entries are dead weight.
            None => true,
        };
        if delete && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Probabilistic cleanup sweep run from load paths
///
/// With probability `probability`, scans `dir` and deletes entries whose
/// timestamp exceeds the TTL or whose JSON is unreadable. All I/O errors
/// are swallowed; pruning is a best-effort amortized maintenance pass.
pub fn maybe_auto_prune(dir: &Path, probability: f64, ttl: Duration) {
    if rand::random::<f64>() > probability {
        return;
    }
    prune_directory(dir, ttl);
}

/// Unconditional cleanup sweep of one cache directory
pub(crate) fn prune_directory(dir: &Path, ttl: Duration) {
    for path in json_files(dir) {
        let expired = match fs::read_to_string(&path)
            .ok()
            .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
        {
            Some(value) => match value.get("created_at_epoch_s").and_then(|v| v.as_f64()) {
                Some(created) => now_epoch_s() - created >= ttl.as_secs_f64(),
                // Missing timestamp means a corrupt entry.
                None => true,
            },
            None => true,
        };
        if expired {
            let _ = fs::remove_file(&path);
        }
    }
}

/// Atomic write: `{key}.tmp` in the target directory, then rename
///
/// Rename is atomic only within one filesystem, which holds because the
/// temp file shares the entry's directory.
fn write_atomic(dir: &Path, cache_key: &str, json: &str) -> std::io::Result<()> {
    let tmp = dir.join(format!("{cache_key}.tmp"));
    let target = dir.join(format!("{cache_key}.json"));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, &target)
}

pub(crate) fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
    }
    files
}

fn remove_json_files(dir: &Path) -> usize {
    let mut removed = 0;
    for path in json_files(dir) {
        if fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testenv::EnvGuard;

    fn sample_entry() -> CacheEntry {
        CacheEntry::new(
            4,
            64,
            DispatcherKind::Map,
            2.8,
            "4 workers with chunks of 64".to_string(),
            vec!["example warning".to_string()],
        )
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let entry = sample_entry();
        save_entry("func:abc_size:medium_time:moderate_v:1", &entry);
        let (loaded, reason) = load_entry("func:abc_size:medium_time:moderate_v:1", DEFAULT_TTL);
        let loaded = loaded.unwrap_or_else(|| panic!("expected hit, got miss: {reason}"));

        assert_eq!(loaded.n_jobs, entry.n_jobs);
        assert_eq!(loaded.chunksize, entry.chunksize);
        assert_eq!(loaded.dispatcher_kind, entry.dispatcher_kind);
        assert_eq!(loaded.reason, entry.reason);
        assert_eq!(loaded.warnings, entry.warnings);
    }

    #[test]
    fn test_missing_entry_misses_with_reason() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let (loaded, reason) = load_entry("func:nothere_size:tiny_time:fast_v:1", DEFAULT_TTL);
        assert!(loaded.is_none());
        assert!(reason.contains("no cached entry"));
    }

    #[test]
    fn test_expired_entry_misses() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let mut entry = sample_entry();
        entry.created_at_epoch_s = now_epoch_s() - 10.0;
        let json = serde_json::to_string(&entry).unwrap();
        fs::write(optimization_cache_dir().join("stale.json"), json).unwrap();

        let (loaded, reason) = load_entry("stale", Duration::from_secs(10));
        assert!(loaded.is_none());
        assert!(reason.contains("expired"));
    }

    #[test]
    fn test_ttl_boundary_is_expired() {
        let entry = CacheEntry {
            created_at_epoch_s: now_epoch_s() - 100.0,
            ..sample_entry()
        };
        // Age equals TTL: expired.
        assert!(entry.is_expired(Duration::from_secs(100)));
        assert!(!entry.is_expired(Duration::from_secs(1000)));
    }

    #[test]
    fn test_version_mismatch_misses() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let mut entry = sample_entry();
        entry.schema_version = SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&entry).unwrap();
        fs::write(optimization_cache_dir().join("oldver.json"), json).unwrap();

        let (loaded, reason) = load_entry("oldver", DEFAULT_TTL);
        assert!(loaded.is_none());
        assert!(reason.contains("version mismatch"));
    }

    #[test]
    fn test_incompatible_system_misses() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let mut entry = sample_entry();
        entry.platform_snapshot.physical_cores += 1;
        let json = serde_json::to_string(&entry).unwrap();
        fs::write(optimization_cache_dir().join("othercores.json"), json).unwrap();

        let (loaded, reason) = load_entry("othercores", DEFAULT_TTL);
        assert!(loaded.is_none());
        assert!(reason.contains("core count"));
    }

    #[test]
    fn test_malformed_json_misses() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        fs::write(optimization_cache_dir().join("garbage.json"), "{ not json").unwrap();
        let (loaded, reason) = load_entry("garbage", DEFAULT_TTL);
        assert!(loaded.is_none());
        assert!(reason.contains("malformed"));
    }

    #[test]
    fn test_clear_cache_counts() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("one", &sample_entry());
        save_entry("two", &sample_entry());
        assert_eq!(clear_cache(), 2);
        assert_eq!(clear_cache(), 0);
    }

    #[test]
    fn test_prune_expired_removes_stale_and_corrupt() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("fresh", &sample_entry());
        let mut stale = sample_entry();
        stale.created_at_epoch_s = now_epoch_s() - 1e6;
        fs::write(
            optimization_cache_dir().join("stale.json"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();
        fs::write(optimization_cache_dir().join("corrupt.json"), "nope").unwrap();

        let removed = prune_expired(DEFAULT_TTL);
        assert_eq!(removed, 2);
        let (loaded, _) = load_entry("fresh", DEFAULT_TTL);
        assert!(loaded.is_some());
    }

    #[test]
    fn test_prune_directory_respects_timestamps() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("keepme", &sample_entry());
        fs::write(optimization_cache_dir().join("broken.json"), "[1,2").unwrap();
        prune_directory(&optimization_cache_dir(), DEFAULT_TTL);

        assert!(optimization_cache_dir().join("keepme.json").exists());
        assert!(!optimization_cache_dir().join("broken.json").exists());
    }

    #[test]
    fn test_benchmark_entry_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let entry = BenchmarkCacheEntry::new(10.0, 3.2, 3.125, 4, 32);
        save_benchmark_entry("benchmark_abc_500_v1", &entry);
        let (loaded, reason) = load_benchmark_entry("benchmark_abc_500_v1", DEFAULT_TTL);
        let loaded = loaded.unwrap_or_else(|| panic!("expected hit: {reason}"));
        assert_eq!(loaded.n_jobs, 4);
        assert!((loaded.actual_speedup - 3.125).abs() < 1e-12);
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("tmpcheck", &sample_entry());
        assert!(optimization_cache_dir().join("tmpcheck.json").exists());
        assert!(!optimization_cache_dir().join("tmpcheck.tmp").exists());
    }

    #[test]
    fn test_dispatcher_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&DispatcherKind::ImapUnordered).unwrap(),
            "\"imap_unordered\""
        );
        assert_eq!(DispatcherKind::Map.to_string(), "map");
    }
}
