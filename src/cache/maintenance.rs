//! Cache maintenance operations
//!
//! Everything an operator does to a cache besides hitting it: inspect it
//! (`cache_stats`), audit it (`validate_cache`), clean it (`repair_cache`),
//! move it between machines (`export_cache` / `import_cache`), and seed it
//! before first use (`prewarm_cache`).
//!
//! Export and import are the only cache operations that surface errors:
//! the caller explicitly asked for an I/O operation on a path they chose.

use super::{
    benchmark_cache_dir, json_files, load_entry, now_epoch_s, optimization_cache_dir, save_entry,
    CacheEntry, DispatcherKind, PlatformSnapshot, BENCHMARK_MEMORY_TOLERANCE, DEFAULT_TTL,
    OPTIMIZATION_MEMORY_TOLERANCE, SCHEMA_VERSION,
};
use crate::error::{AmorsizeError, Result};
use crate::task::Task;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which of the two stores an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Optimization,
    Benchmark,
}

impl CacheKind {
    /// Directory backing this store
    pub fn dir(self) -> PathBuf {
        match self {
            CacheKind::Optimization => optimization_cache_dir(),
            CacheKind::Benchmark => benchmark_cache_dir(),
        }
    }

    fn memory_tolerance(self) -> f64 {
        match self {
            CacheKind::Optimization => OPTIMIZATION_MEMORY_TOLERANCE,
            CacheKind::Benchmark => BENCHMARK_MEMORY_TOLERANCE,
        }
    }

    fn required_numeric_fields(self) -> &'static [&'static str] {
        match self {
            CacheKind::Optimization => &["n_jobs", "chunksize", "estimated_speedup"],
            CacheKind::Benchmark => &[
                "n_jobs",
                "chunksize",
                "serial_time_s",
                "parallel_time_s",
                "actual_speedup",
            ],
        }
    }
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimization" => Ok(CacheKind::Optimization),
            "benchmark" => Ok(CacheKind::Benchmark),
            other => Err(format!("unknown cache kind: {other}")),
        }
    }
}

/// Aggregate statistics over one cache directory
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub incompatible_entries: usize,
    pub total_size_bytes: u64,
    pub oldest_entry_age_s: Option<f64>,
    pub newest_entry_age_s: Option<f64>,
    pub cache_dir: PathBuf,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cache Statistics ===")?;
        writeln!(f, "Cache directory: {}", self.cache_dir.display())?;
        writeln!(f, "Total entries: {}", self.total_entries)?;
        writeln!(f, "  Valid entries: {}", self.valid_entries)?;
        writeln!(f, "  Expired entries: {}", self.expired_entries)?;
        writeln!(f, "  Incompatible entries: {}", self.incompatible_entries)?;
        write!(
            f,
            "Total cache size: {}",
            crate::profile::format_bytes(self.total_size_bytes)
        )?;
        if let Some(age) = self.oldest_entry_age_s {
            write!(f, "\nOldest entry age: {}", format_age(age))?;
        }
        if let Some(age) = self.newest_entry_age_s {
            write!(f, "\nNewest entry age: {}", format_age(age))?;
        }
        Ok(())
    }
}

fn format_age(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1} seconds")
    } else if seconds < 3600.0 {
        format!("{:.1} minutes", seconds / 60.0)
    } else if seconds < 86400.0 {
        format!("{:.1} hours", seconds / 3600.0)
    } else {
        format!("{:.1} days", seconds / 86400.0)
    }
}

/// Scan one cache directory and categorize every entry
pub fn cache_stats(ttl: Duration, kind: CacheKind) -> CacheStats {
    let dir = kind.dir();
    let mut stats = CacheStats {
        cache_dir: dir.clone(),
        ..Default::default()
    };
    let now = now_epoch_s();
    let mut oldest: Option<f64> = None;
    let mut newest: Option<f64> = None;

    for path in json_files(&dir) {
        stats.total_entries += 1;
        if let Ok(meta) = fs::metadata(&path) {
            stats.total_size_bytes += meta.len();
        }

        let value: Option<Value> = fs::read_to_string(&path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok());
        let Some(value) = value else {
            stats.incompatible_entries += 1;
            continue;
        };

        if let Some(created) = value.get("created_at_epoch_s").and_then(Value::as_f64) {
            oldest = Some(oldest.map_or(created, |o: f64| o.min(created)));
            newest = Some(newest.map_or(created, |n: f64| n.max(created)));
        }

        match categorize_entry(&value, ttl, kind) {
            EntryState::Valid => stats.valid_entries += 1,
            EntryState::Expired => stats.expired_entries += 1,
            EntryState::Incompatible => stats.incompatible_entries += 1,
        }
    }

    stats.oldest_entry_age_s = oldest.map(|ts| (now - ts).max(0.0));
    stats.newest_entry_age_s = newest.map(|ts| (now - ts).max(0.0));
    stats
}

enum EntryState {
    Valid,
    Expired,
    Incompatible,
}

fn categorize_entry(value: &Value, ttl: Duration, kind: CacheKind) -> EntryState {
    let version = value.get("schema_version").and_then(Value::as_u64);
    if version != Some(SCHEMA_VERSION as u64) {
        return EntryState::Incompatible;
    }
    let created = value.get("created_at_epoch_s").and_then(Value::as_f64);
    match created {
        Some(created) if now_epoch_s() - created >= ttl.as_secs_f64() => {
            return EntryState::Expired;
        }
        Some(_) => {}
        None => return EntryState::Incompatible,
    }
    match snapshot_compatible(value, kind) {
        Ok(()) => EntryState::Valid,
        Err(_) => EntryState::Incompatible,
    }
}

fn snapshot_compatible(value: &Value, kind: CacheKind) -> std::result::Result<(), String> {
    let snapshot = value
        .get("platform_snapshot")
        .cloned()
        .ok_or_else(|| "missing platform snapshot".to_string())?;
    let snapshot: PlatformSnapshot = serde_json::from_value(snapshot)
        .map_err(|e| format!("malformed platform snapshot: {e}"))?;
    snapshot.check_compatible(kind.memory_tolerance())
}

/// Result of a full cache validation pass
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub total_entries: usize,
    pub valid_entries: usize,
    pub invalid_entries: usize,
    pub issues: Vec<String>,
    /// Overall cache health, 0–100
    pub health_score: f64,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cache Validation Report ===")?;
        writeln!(f, "Total entries examined: {}", self.total_entries)?;
        writeln!(f, "Valid entries: {}", self.valid_entries)?;
        writeln!(f, "Invalid entries: {}", self.invalid_entries)?;
        writeln!(f, "Health score: {:.1}/100", self.health_score)?;
        write!(
            f,
            "Status: {}",
            if self.is_valid { "HEALTHY" } else { "ISSUES FOUND" }
        )?;
        if !self.issues.is_empty() {
            write!(f, "\n\nIssues found:")?;
            for issue in &self.issues {
                write!(f, "\n  - {issue}")?;
            }
        }
        Ok(())
    }
}

/// Validate a single entry file, returning every issue found
pub fn validate_cache_entry(
    path: &Path,
    ttl: Duration,
    kind: CacheKind,
) -> (bool, Vec<String>) {
    let mut issues = Vec::new();

    if !path.exists() {
        issues.push(format!("file does not exist: {}", path.display()));
        return (false, issues);
    }

    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            issues.push(format!("cannot read file: {e}"));
            return (false, issues);
        }
    };

    let value: Value = match serde_json::from_str(&json) {
        Ok(value) => value,
        Err(e) => {
            issues.push(format!("invalid JSON: {e}"));
            return (false, issues);
        }
    };

    // Structural checks: required fields with the right shapes.
    for field in kind.required_numeric_fields() {
        match value.get(*field) {
            None => issues.push(format!("missing required field: {field}")),
            Some(v) if !v.is_number() => {
                issues.push(format!("invalid type for {field}: expected number"))
            }
            Some(_) => {}
        }
    }
    if kind == CacheKind::Optimization {
        match value.get("dispatcher_kind") {
            None => issues.push("missing required field: dispatcher_kind".to_string()),
            Some(v) if !v.is_string() => {
                issues.push("invalid type for dispatcher_kind: expected string".to_string())
            }
            Some(_) => {}
        }
        match value.get("warnings") {
            None => issues.push("missing required field: warnings".to_string()),
            Some(v) if !v.is_array() => {
                issues.push("invalid type for warnings: expected list".to_string())
            }
            Some(_) => {}
        }
        match value.get("reason") {
            None => issues.push("missing required field: reason".to_string()),
            Some(v) if !v.is_string() => {
                issues.push("invalid type for reason: expected string".to_string())
            }
            Some(_) => {}
        }
    }
    for field in ["created_at_epoch_s", "schema_version"] {
        match value.get(field) {
            None => issues.push(format!("missing required field: {field}")),
            Some(v) if !v.is_number() => {
                issues.push(format!("invalid type for {field}: expected number"))
            }
            Some(_) => {}
        }
    }
    if value.get("platform_snapshot").map(Value::is_object) != Some(true) {
        issues.push("missing or invalid platform_snapshot".to_string());
    }

    if !issues.is_empty() {
        return (false, issues);
    }

    // Semantic checks: ranges and freshness.
    if value["n_jobs"].as_u64() == Some(0) {
        issues.push("invalid n_jobs: must be >= 1".to_string());
    }
    if value["chunksize"].as_u64() == Some(0) {
        issues.push("invalid chunksize: must be >= 1".to_string());
    }
    if kind == CacheKind::Optimization && value["estimated_speedup"].as_f64().unwrap_or(0.0) < 0.0 {
        issues.push("invalid estimated_speedup: must be >= 0".to_string());
    }
    if value["schema_version"].as_u64() != Some(SCHEMA_VERSION as u64) {
        issues.push(format!(
            "cache version mismatch: {} (current: {SCHEMA_VERSION})",
            value["schema_version"]
        ));
    }
    if let Some(created) = value["created_at_epoch_s"].as_f64() {
        let age = now_epoch_s() - created;
        if age >= ttl.as_secs_f64() {
            issues.push(format!("entry expired: age={:.1} days", age / 86_400.0));
        }
    }
    if let Err(reason) = snapshot_compatible(&value, kind) {
        issues.push(format!("system incompatible: {reason}"));
    }

    (issues.is_empty(), issues)
}

/// Validate every entry in one cache directory
pub fn validate_cache(ttl: Duration, kind: CacheKind) -> ValidationReport {
    let dir = kind.dir();
    let files = json_files(&dir);
    let total_entries = files.len();
    let mut valid_entries = 0;
    let mut invalid_entries = 0;
    let mut all_issues = Vec::new();

    for path in files {
        let (is_valid, issues) = validate_cache_entry(&path, ttl, kind);
        if is_valid {
            valid_entries += 1;
        } else {
            invalid_entries += 1;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for issue in issues {
                all_issues.push(format!("{name}: {issue}"));
            }
        }
    }

    let health_score = if total_entries == 0 {
        100.0
    } else {
        let base = valid_entries as f64 / total_entries as f64 * 100.0;
        let critical = all_issues
            .iter()
            .filter(|issue| {
                let lower = issue.to_lowercase();
                lower.contains("invalid json")
                    || lower.contains("missing required")
                    || lower.contains("cannot read")
            })
            .count();
        (base - (critical as f64 * 5.0).min(20.0)).max(0.0)
    };

    ValidationReport {
        is_valid: health_score >= 90.0,
        total_entries,
        valid_entries,
        invalid_entries,
        issues: all_issues,
        health_score,
    }
}

/// Counts from a repair pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairSummary {
    pub examined: usize,
    pub deleted: usize,
    pub kept: usize,
}

/// Remove entries that fail validation
///
/// With `dry_run` the summary reports what would be deleted without
/// touching anything.
pub fn repair_cache(dry_run: bool, kind: CacheKind) -> RepairSummary {
    let mut summary = RepairSummary {
        examined: 0,
        deleted: 0,
        kept: 0,
    };
    for path in json_files(&kind.dir()) {
        summary.examined += 1;
        let (is_valid, _) = validate_cache_entry(&path, DEFAULT_TTL, kind);
        if is_valid {
            summary.kept += 1;
        } else {
            if !dry_run {
                let _ = fs::remove_file(&path);
            }
            summary.deleted += 1;
        }
    }
    summary
}

/// Merge behavior when an imported key already exists locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep the existing entry
    Skip,
    /// Replace the existing entry
    Overwrite,
    /// Replace only when the imported entry is newer
    Update,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(MergeStrategy::Skip),
            "overwrite" => Ok(MergeStrategy::Overwrite),
            "update" => Ok(MergeStrategy::Update),
            other => Err(format!("invalid merge strategy: {other}")),
        }
    }
}

/// Export optimization entries to a portable JSON document
///
/// The envelope carries the schema version, the export time, and a
/// snapshot of the exporting system so importers can judge compatibility.
/// Returns how many entries were written.
pub fn export_cache(
    output: &Path,
    include_expired: bool,
    include_incompatible: bool,
    ttl: Duration,
) -> Result<usize> {
    let dir = optimization_cache_dir();
    let mut entries = Vec::new();

    for path in json_files(&dir) {
        let Some(mut value) = fs::read_to_string(&path)
            .ok()
            .and_then(|json| serde_json::from_str::<Value>(&json).ok())
        else {
            continue;
        };
        let Ok(entry) = serde_json::from_value::<CacheEntry>(value.clone()) else {
            continue;
        };

        if !include_expired && entry.is_expired(ttl) {
            continue;
        }
        if !include_incompatible && entry.is_system_compatible().is_err() {
            continue;
        }

        let cache_key = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(object) = value.as_object_mut() {
            object.insert("cache_key".to_string(), Value::String(cache_key));
        }
        entries.push(value);
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let document = serde_json::json!({
        "version": SCHEMA_VERSION,
        "export_timestamp": now_epoch_s(),
        "export_system": {
            "hostname": host,
            "platform": std::env::consts::OS,
            "physical_cores": crate::platform::physical_cores(),
            "available_memory": crate::platform::available_memory_bytes(),
            "spawn_model": crate::platform::spawn_model().to_string(),
        },
        "entries": entries,
    });

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| AmorsizeError::CacheExport {
                path: output.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }
    let json = serde_json::to_string_pretty(&document).map_err(|e| AmorsizeError::CacheExport {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(output, json).map_err(|e| AmorsizeError::CacheExport {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(document["entries"].as_array().map_or(0, Vec::len))
}

/// Counts from an import pass: (imported, skipped, incompatible)
pub type ImportCounts = (usize, usize, usize);

/// Import entries from an exported document
pub fn import_cache(
    input: &Path,
    merge_strategy: MergeStrategy,
    validate_compatibility: bool,
    update_timestamps: bool,
) -> Result<ImportCounts> {
    let import_error = |message: String| AmorsizeError::CacheImport {
        path: input.to_path_buf(),
        message,
    };

    let json = fs::read_to_string(input).map_err(|e| import_error(e.to_string()))?;
    let document: Value =
        serde_json::from_str(&json).map_err(|e| import_error(format!("invalid JSON: {e}")))?;

    let version = document
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| import_error("missing required field: version".to_string()))?;
    if version != SCHEMA_VERSION as u64 {
        return Err(import_error(format!(
            "incompatible cache version: export={version}, current={SCHEMA_VERSION}"
        )));
    }
    let entries = document
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| import_error("missing required field: entries".to_string()))?;

    let dir = optimization_cache_dir();
    let mut imported = 0;
    let mut skipped = 0;
    let mut incompatible = 0;

    for entry_value in entries {
        let Some(cache_key) = entry_value.get("cache_key").and_then(Value::as_str) else {
            skipped += 1;
            continue;
        };
        let mut save_value = entry_value.clone();
        if let Some(object) = save_value.as_object_mut() {
            object.remove("cache_key");
        }
        let Ok(entry) = serde_json::from_value::<CacheEntry>(save_value.clone()) else {
            skipped += 1;
            continue;
        };

        if validate_compatibility && entry.is_system_compatible().is_err() {
            incompatible += 1;
            continue;
        }

        let target = dir.join(format!("{cache_key}.json"));
        let exists = target.exists();
        let should_import = match (exists, merge_strategy) {
            (false, _) => true,
            (true, MergeStrategy::Overwrite) => true,
            (true, MergeStrategy::Update) => {
                let existing_ts = fs::read_to_string(&target)
                    .ok()
                    .and_then(|json| serde_json::from_str::<Value>(&json).ok())
                    .and_then(|v| v.get("created_at_epoch_s").and_then(Value::as_f64))
                    .unwrap_or(0.0);
                entry.created_at_epoch_s > existing_ts
            }
            (true, MergeStrategy::Skip) => false,
        };

        if !should_import {
            skipped += 1;
            continue;
        }

        if update_timestamps {
            if let Some(object) = save_value.as_object_mut() {
                object.insert(
                    "created_at_epoch_s".to_string(),
                    serde_json::json!(now_epoch_s()),
                );
            }
        }
        match serde_json::to_string_pretty(&save_value)
            .ok()
            .and_then(|json| fs::write(&target, json).ok())
        {
            Some(()) => imported += 1,
            None => skipped += 1,
        }
    }

    Ok((imported, skipped, incompatible))
}

/// A synthetic workload shape used for prewarming
#[derive(Debug, Clone, Copy)]
pub struct WorkloadProfile {
    pub data_size: usize,
    pub avg_time_s: f64,
}

/// The default prewarm shapes, one per size/time bucket combination that
/// shows up in practice
pub fn default_workload_profiles() -> Vec<WorkloadProfile> {
    vec![
        WorkloadProfile { data_size: 5, avg_time_s: 0.00005 },
        WorkloadProfile { data_size: 50, avg_time_s: 0.0005 },
        WorkloadProfile { data_size: 500, avg_time_s: 0.003 },
        WorkloadProfile { data_size: 2000, avg_time_s: 0.007 },
        WorkloadProfile { data_size: 5000, avg_time_s: 0.03 },
        WorkloadProfile { data_size: 15000, avg_time_s: 0.07 },
        WorkloadProfile { data_size: 20000, avg_time_s: 0.15 },
    ]
}

/// A decision to seed the cache with
#[derive(Debug, Clone)]
pub struct PrewarmDecision {
    pub n_jobs: usize,
    pub chunksize: usize,
    pub dispatcher_kind: DispatcherKind,
    pub estimated_speedup: f64,
    pub reason: String,
    pub warnings: Vec<String>,
    pub data_size: usize,
    pub avg_time_s: f64,
}

/// What to seed the cache from
pub enum PrewarmSource<'a> {
    /// Synthetic shapes with heuristic parameters
    Profiles(&'a [WorkloadProfile]),
    /// A real decision from a previous optimize run
    Decision(&'a PrewarmDecision),
}

/// Pre-populate cache entries without running the task
///
/// Eliminates the first-run dry-run penalty for known workload shapes.
/// Prewarmed entries carry estimated parameters and say so in their
/// warnings; a real optimize run replaces them. Returns the number of
/// entries created (existing entries are kept unless `force` is set).
pub fn prewarm_cache<W: Task + ?Sized>(task: &W, source: PrewarmSource<'_>, force: bool) -> usize {
    match source {
        PrewarmSource::Decision(decision) => {
            let key = crate::fingerprint::cache_key(task, decision.data_size, decision.avg_time_s);
            if !force {
                let (existing, _) = load_entry(&key, DEFAULT_TTL);
                if existing.is_some() {
                    return 0;
                }
            }
            let mut entry = CacheEntry::new(
                decision.n_jobs,
                decision.chunksize,
                decision.dispatcher_kind,
                decision.estimated_speedup,
                decision.reason.clone(),
                decision.warnings.clone(),
            );
            entry.function_complexity = Some(crate::fingerprint::function_complexity(task));
            save_entry(&key, &entry);
            1
        }
        PrewarmSource::Profiles(profiles) => {
            let mut created = 0;
            for profile in profiles {
                if profile.data_size == 0 || profile.avg_time_s <= 0.0 {
                    continue;
                }
                let key =
                    crate::fingerprint::cache_key(task, profile.data_size, profile.avg_time_s);
                if !force {
                    let (existing, _) = load_entry(&key, DEFAULT_TTL);
                    if existing.is_some() {
                        continue;
                    }
                }
                let entry = estimate_prewarm_entry(profile);
                save_entry(&key, &entry);
                created += 1;
            }
            created
        }
    }
}

/// Heuristic parameters for a prewarmed entry
///
/// Deliberately simple: physical cores, the 0.2 s chunk target, and a
/// conservative efficiency discount. Accurate numbers come from a real
/// optimize run replacing the entry.
fn estimate_prewarm_entry(profile: &WorkloadProfile) -> CacheEntry {
    let physical_cores = crate::platform::physical_cores();
    let spawn_cost = crate::platform::spawn_cost_s(false);
    let total_time = profile.data_size as f64 * profile.avg_time_s;

    let prewarm_warnings = vec![
        "this is a prewarmed cache entry with estimated parameters".to_string(),
        "run optimize() once to replace it with measured values".to_string(),
    ];

    if total_time < spawn_cost {
        return CacheEntry::new(
            1,
            1,
            DispatcherKind::Map,
            1.0,
            "workload too fast for parallelism (prewarmed estimate)".to_string(),
            prewarm_warnings,
        );
    }

    let n_jobs = physical_cores.min(profile.data_size).max(1);
    let ideal_chunksize = ((0.2 / profile.avg_time_s) as usize).max(1);
    let chunksize = ideal_chunksize.min((profile.data_size / n_jobs).max(1));

    // Conservative Amdahl sketch: 95% parallel fraction, 10% overhead.
    let estimated_speedup = (n_jobs as f64 * 0.95 * 0.9).clamp(1.0, n_jobs as f64 * 0.8);

    CacheEntry::new(
        n_jobs,
        chunksize,
        DispatcherKind::Map,
        estimated_speedup,
        format!("prewarmed: {n_jobs} workers with chunks of {chunksize} (estimated parameters)"),
        prewarm_warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_DIR_ENV;
    use crate::task::FnTask;
    use crate::testenv::EnvGuard;

    fn entry() -> CacheEntry {
        CacheEntry::new(
            4,
            32,
            DispatcherKind::Map,
            3.0,
            "4 workers with chunks of 32".to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn test_stats_empty_cache() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let stats = cache_stats(DEFAULT_TTL, CacheKind::Optimization);
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.valid_entries, 0);
        assert!(stats.oldest_entry_age_s.is_none());
    }

    #[test]
    fn test_stats_categorizes_entries() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("valid", &entry());
        let mut expired = entry();
        expired.created_at_epoch_s = now_epoch_s() - 1e7;
        fs::write(
            optimization_cache_dir().join("expired.json"),
            serde_json::to_string(&expired).unwrap(),
        )
        .unwrap();
        fs::write(optimization_cache_dir().join("corrupt.json"), "junk").unwrap();

        let stats = cache_stats(DEFAULT_TTL, CacheKind::Optimization);
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.incompatible_entries, 1);
        assert!(stats.total_size_bytes > 0);
        assert!(stats.oldest_entry_age_s.unwrap() > stats.newest_entry_age_s.unwrap());
    }

    #[test]
    fn test_validate_healthy_cache() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("good-one", &entry());
        save_entry("good-two", &entry());
        let report = validate_cache(DEFAULT_TTL, CacheKind::Optimization);
        assert!(report.is_valid);
        assert_eq!(report.valid_entries, 2);
        assert_eq!(report.invalid_entries, 0);
        assert_eq!(report.health_score, 100.0);
    }

    #[test]
    fn test_validate_flags_structural_damage() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        fs::write(optimization_cache_dir().join("broken.json"), "{").unwrap();
        let mut missing = serde_json::to_value(entry()).unwrap();
        missing.as_object_mut().unwrap().remove("n_jobs");
        fs::write(
            optimization_cache_dir().join("missing.json"),
            serde_json::to_string(&missing).unwrap(),
        )
        .unwrap();

        let report = validate_cache(DEFAULT_TTL, CacheKind::Optimization);
        assert!(!report.is_valid);
        assert_eq!(report.invalid_entries, 2);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("missing required field: n_jobs")));
    }

    #[test]
    fn test_repair_dry_run_keeps_files() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("fine", &entry());
        fs::write(optimization_cache_dir().join("bad.json"), "bad").unwrap();

        let summary = repair_cache(true, CacheKind::Optimization);
        assert_eq!(
            summary,
            RepairSummary {
                examined: 2,
                deleted: 1,
                kept: 1
            }
        );
        assert!(optimization_cache_dir().join("bad.json").exists());

        let summary = repair_cache(false, CacheKind::Optimization);
        assert_eq!(summary.deleted, 1);
        assert!(!optimization_cache_dir().join("bad.json").exists());
    }

    #[test]
    fn test_export_import_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("exported-a", &entry());
        save_entry("exported-b", &entry());

        let export_path = temp.path().join("backup.json");
        let count = export_cache(&export_path, false, false, DEFAULT_TTL).unwrap();
        assert_eq!(count, 2);

        assert_eq!(super::super::clear_cache(), 2);
        let (imported, skipped, incompatible) =
            import_cache(&export_path, MergeStrategy::Skip, true, false).unwrap();
        assert_eq!((imported, skipped, incompatible), (2, 0, 0));

        let (loaded, _) = load_entry("exported-a", DEFAULT_TTL);
        let reloaded = loaded.unwrap();
        assert_eq!(reloaded.n_jobs, 4);
        assert_eq!(reloaded.chunksize, 32);
    }

    #[test]
    fn test_import_skip_strategy() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        save_entry("shared-key", &entry());
        let export_path = temp.path().join("dup.json");
        export_cache(&export_path, false, false, DEFAULT_TTL).unwrap();

        let (imported, skipped, _) =
            import_cache(&export_path, MergeStrategy::Skip, true, false).unwrap();
        assert_eq!(imported, 0);
        assert_eq!(skipped, 1);

        let (imported, _, _) =
            import_cache(&export_path, MergeStrategy::Overwrite, true, false).unwrap();
        assert_eq!(imported, 1);
    }

    #[test]
    fn test_import_rejects_bad_version() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let path = temp.path().join("future.json");
        fs::write(
            &path,
            serde_json::json!({"version": 999, "entries": []}).to_string(),
        )
        .unwrap();
        let err = import_cache(&path, MergeStrategy::Skip, true, false).unwrap_err();
        assert!(err.to_string().contains("incompatible cache version"));
    }

    #[test]
    fn test_import_missing_file_errors() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let missing = temp.path().join("not-there.json");
        assert!(import_cache(&missing, MergeStrategy::Skip, true, false).is_err());
    }

    #[test]
    fn test_prewarm_from_profiles() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let task = FnTask::new("prewarmed-task", |x: &u64| x + 1);
        let profiles = default_workload_profiles();
        let created = prewarm_cache(&task, PrewarmSource::Profiles(&profiles), false);
        assert_eq!(created, profiles.len());

        // Second pass without force creates nothing new.
        let created = prewarm_cache(&task, PrewarmSource::Profiles(&profiles), false);
        assert_eq!(created, 0);

        // Force refreshes every entry.
        let created = prewarm_cache(&task, PrewarmSource::Profiles(&profiles), true);
        assert_eq!(created, profiles.len());
    }

    #[test]
    fn test_prewarm_from_decision_hits_cache() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::set(&[(CACHE_DIR_ENV, temp.path().to_str().unwrap())]);

        let task = FnTask::new("decided-task", |x: &u64| x * 2);
        let decision = PrewarmDecision {
            n_jobs: 4,
            chunksize: 50,
            dispatcher_kind: DispatcherKind::Map,
            estimated_speedup: 3.1,
            reason: "4 workers with chunks of 50".to_string(),
            warnings: Vec::new(),
            data_size: 1000,
            avg_time_s: 0.004,
        };
        assert_eq!(
            prewarm_cache(&task, PrewarmSource::Decision(&decision), false),
            1
        );

        let key = crate::fingerprint::cache_key(&task, 1000, 0.004);
        let (loaded, _) = load_entry(&key, DEFAULT_TTL);
        assert_eq!(loaded.unwrap().n_jobs, 4);
    }

    #[test]
    fn test_merge_strategy_parse() {
        assert_eq!("skip".parse::<MergeStrategy>().unwrap(), MergeStrategy::Skip);
        assert_eq!(
            "OVERWRITE".parse::<MergeStrategy>().unwrap(),
            MergeStrategy::Overwrite
        );
        assert!("merge".parse::<MergeStrategy>().is_err());
    }
}
