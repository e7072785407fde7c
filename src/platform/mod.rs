//! Platform probing
//!
//! This module answers the system-side questions the decision engine asks:
//! how many physical cores exist, how much memory is actually available, how
//! the operating system creates worker processes, and what spawning a worker
//! or dispatching a chunk really costs on this machine.
//!
//! Core counts come from the `num_cpus` crate; memory comes from
//! `/proc/meminfo` on Linux with a conservative fallback elsewhere. Spawn
//! and dispatch costs are measured once per process by tiny micro-benchmarks
//! (see [`probe`]) and memoized; callers that want fast startup can skip the
//! benchmarks and take OS-keyed defaults instead.

pub mod probe;

use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Mutex;

/// Conservative fallback when available memory cannot be probed (8 GiB)
pub const FALLBACK_AVAILABLE_MEMORY: u64 = 8 * 1024 * 1024 * 1024;

/// Default spawn cost for fork-model platforms (seconds)
pub const DEFAULT_SPAWN_COST_FORK: f64 = 0.005;
/// Default spawn cost for forkserver-model platforms (seconds)
pub const DEFAULT_SPAWN_COST_FORKSERVER: f64 = 0.030;
/// Default spawn cost for spawn-model platforms (seconds)
pub const DEFAULT_SPAWN_COST_SPAWN: f64 = 0.150;
/// Default per-chunk dispatch cost (seconds)
pub const DEFAULT_DISPATCH_COST: f64 = 0.0002;

/// Environment variable overriding the spawn model (test hook)
pub const SPAWN_MODEL_ENV: &str = "AMORSIZE_SPAWN_MODEL";

/// How the runtime creates worker processes
///
/// The model dramatically affects startup cost: forking reuses the parent
/// address space while spawning boots a fresh process image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnModel {
    Fork,
    Spawn,
    Forkserver,
}

impl SpawnModel {
    /// Default spawn cost estimate for this model (seconds)
    pub fn default_spawn_cost(self) -> f64 {
        match self {
            SpawnModel::Fork => DEFAULT_SPAWN_COST_FORK,
            SpawnModel::Forkserver => DEFAULT_SPAWN_COST_FORKSERVER,
            SpawnModel::Spawn => DEFAULT_SPAWN_COST_SPAWN,
        }
    }
}

impl fmt::Display for SpawnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnModel::Fork => write!(f, "fork"),
            SpawnModel::Spawn => write!(f, "spawn"),
            SpawnModel::Forkserver => write!(f, "forkserver"),
        }
    }
}

impl FromStr for SpawnModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fork" => Ok(SpawnModel::Fork),
            "spawn" => Ok(SpawnModel::Spawn),
            "forkserver" => Ok(SpawnModel::Forkserver),
            other => Err(format!("unknown spawn model: {other}")),
        }
    }
}

/// Immutable snapshot of platform facts the engine decides against
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlatformFacts {
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub available_memory_bytes: u64,
    /// False when the memory probe failed and a fallback is in use
    pub memory_probed: bool,
    pub spawn_model: SpawnModel,
    pub spawn_cost_s: f64,
    pub chunk_dispatch_cost_s: f64,
}

/// Gather all platform facts, running micro-benchmarks where requested
pub fn facts(measure_spawn: bool, measure_dispatch: bool) -> PlatformFacts {
    let (available_memory_bytes, memory_probed) = match probe_available_memory() {
        Some(bytes) => (bytes, true),
        None => (FALLBACK_AVAILABLE_MEMORY, false),
    };
    PlatformFacts {
        physical_cores: physical_cores(),
        logical_cores: logical_cores(),
        available_memory_bytes,
        memory_probed,
        spawn_model: spawn_model(),
        spawn_cost_s: spawn_cost_s(measure_spawn),
        chunk_dispatch_cost_s: chunk_dispatch_cost_s(measure_dispatch),
    }
}

/// Number of physical CPU cores (hyperthreads excluded), at least 1
pub fn physical_cores() -> usize {
    num_cpus::get_physical().max(1)
}

/// Number of logical CPU cores, at least the physical count
pub fn logical_cores() -> usize {
    num_cpus::get().max(physical_cores())
}

/// Available memory in bytes, falling back to a conservative default
pub fn available_memory_bytes() -> u64 {
    probe_available_memory().unwrap_or(FALLBACK_AVAILABLE_MEMORY)
}

/// Read `MemAvailable` from /proc/meminfo
///
/// Returns None off Linux or when the field is missing; callers fall back
/// to [`FALLBACK_AVAILABLE_MEMORY`] and attach a warning.
pub fn probe_available_memory() -> Option<u64> {
    let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            // MemAvailable:    12345678 kB
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

/// The spawn model in effect for this process
///
/// Defaults to the platform convention (fork on Linux, spawn elsewhere);
/// `AMORSIZE_SPAWN_MODEL` overrides it, which tests use to exercise the
/// mismatch check without a second operating system.
pub fn spawn_model() -> SpawnModel {
    if let Ok(value) = std::env::var(SPAWN_MODEL_ENV) {
        if let Ok(model) = value.parse() {
            return model;
        }
    }
    platform_default_spawn_model()
}

/// The conventional spawn model for the current OS
pub fn platform_default_spawn_model() -> SpawnModel {
    if cfg!(target_os = "linux") {
        SpawnModel::Fork
    } else {
        SpawnModel::Spawn
    }
}

/// Flag configurations where the spawn model deviates from the platform default
///
/// A deviation (e.g. `spawn` on Linux) usually means much higher worker
/// startup cost than the platform baseline, so recommendations computed with
/// default cost estimates can be badly off.
pub fn check_spawn_model_mismatch() -> (bool, String) {
    let current = spawn_model();
    let default = platform_default_spawn_model();
    if current == default {
        (false, String::new())
    } else {
        (
            true,
            format!(
                "Spawn model '{current}' differs from the platform default '{default}'. \
                 Worker startup cost may be significantly higher than estimated."
            ),
        )
    }
}

// Memoized micro-benchmark results. A Mutex<Option<f64>> per value: the
// first measuring call pays the benchmark, everyone else reads the cache.
static MEASURED_SPAWN_COST: Mutex<Option<f64>> = Mutex::new(None);
static MEASURED_DISPATCH_COST: Mutex<Option<f64>> = Mutex::new(None);

/// Cost of spawning one worker process, in seconds
///
/// With `measure` set, the first call launches a single noop child process
/// and times it (tens of milliseconds, once per process). Otherwise an
/// OS-keyed default is returned.
pub fn spawn_cost_s(measure: bool) -> f64 {
    if !measure {
        return spawn_model().default_spawn_cost();
    }
    let mut cached = MEASURED_SPAWN_COST.lock().unwrap();
    if let Some(cost) = *cached {
        return cost;
    }
    let cost = probe::measure_spawn_cost().unwrap_or_else(|| spawn_model().default_spawn_cost());
    *cached = Some(cost);
    cost
}

/// Per-chunk dispatch overhead, in seconds
///
/// With `measure` set, the first call times round trips through a bounded
/// channel to a worker thread; otherwise a fixed default is returned.
pub fn chunk_dispatch_cost_s(measure: bool) -> f64 {
    if !measure {
        return DEFAULT_DISPATCH_COST;
    }
    let mut cached = MEASURED_DISPATCH_COST.lock().unwrap();
    if let Some(cost) = *cached {
        return cost;
    }
    let cost = probe::measure_dispatch_cost().unwrap_or(DEFAULT_DISPATCH_COST);
    *cached = Some(cost);
    cost
}

/// Forget memoized benchmark results. Test-only entry point.
pub fn clear_platform_caches() {
    *MEASURED_SPAWN_COST.lock().unwrap() = None;
    *MEASURED_DISPATCH_COST.lock().unwrap() = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_counts() {
        assert!(physical_cores() >= 1);
        assert!(logical_cores() >= physical_cores());
    }

    #[test]
    fn test_available_memory_positive() {
        assert!(available_memory_bytes() > 0);
    }

    #[test]
    fn test_spawn_model_defaults() {
        let model = platform_default_spawn_model();
        if cfg!(target_os = "linux") {
            assert_eq!(model, SpawnModel::Fork);
        } else {
            assert_eq!(model, SpawnModel::Spawn);
        }
    }

    #[test]
    fn test_spawn_model_parse() {
        assert_eq!("fork".parse::<SpawnModel>().unwrap(), SpawnModel::Fork);
        assert_eq!("SPAWN".parse::<SpawnModel>().unwrap(), SpawnModel::Spawn);
        assert!("threads".parse::<SpawnModel>().is_err());
    }

    #[test]
    fn test_default_costs_ordering() {
        // Forking must be cheaper than a fresh process image.
        assert!(DEFAULT_SPAWN_COST_FORK < DEFAULT_SPAWN_COST_FORKSERVER);
        assert!(DEFAULT_SPAWN_COST_FORKSERVER < DEFAULT_SPAWN_COST_SPAWN);
    }

    #[test]
    fn test_unmeasured_costs_use_defaults() {
        let cost = spawn_cost_s(false);
        assert_eq!(cost, spawn_model().default_spawn_cost());
        assert_eq!(chunk_dispatch_cost_s(false), DEFAULT_DISPATCH_COST);
    }

    #[test]
    fn test_facts_invariants() {
        let facts = facts(false, false);
        assert!(facts.physical_cores >= 1);
        assert!(facts.logical_cores >= facts.physical_cores);
        assert!(facts.available_memory_bytes > 0);
        assert!(facts.spawn_cost_s > 0.0);
        assert!(facts.chunk_dispatch_cost_s > 0.0);
    }
}
