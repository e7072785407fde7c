//! Nested parallelism detection
//!
//! A task that spins up its own threads (BLAS backends, OpenMP regions, TBB
//! pipelines) multiplies against process-level workers: N processes times T
//! internal threads oversubscribes the machine and every level runs slower.
//! This module spots the signals available without instrumenting the task:
//!
//! - parallel runtime libraries mapped into the process (/proc/self/maps)
//! - thread-count environment variables pinning those runtimes
//! - the process thread count rising while the task runs
//!
//! Library and environment scans are cached for the process lifetime and
//! clearable for tests. Setting `AMORSIZE_TESTING` suppresses detection
//! entirely, so test harnesses that themselves load parallel runtimes do
//! not trip false positives.

use super::resource::read_thread_count;
use crate::task::Task;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;

/// Environment variable that disables detection (test harness hatch)
pub const TESTING_ENV: &str = "AMORSIZE_TESTING";

/// Thread-count variables read (never set) to spot pinned runtimes
pub const THREAD_ENV_VARS: [&str; 6] = [
    "OMP_NUM_THREADS",
    "MKL_NUM_THREADS",
    "OPENBLAS_NUM_THREADS",
    "NUMEXPR_NUM_THREADS",
    "VECLIB_MAXIMUM_THREADS",
    "NUMBA_NUM_THREADS",
];

/// Shared-object name fragments that identify parallel runtimes
const PARALLEL_LIBRARY_PATTERNS: [(&str, &str); 7] = [
    ("libgomp", "OpenMP"),
    ("libomp", "OpenMP"),
    ("libiomp", "OpenMP"),
    ("libmkl", "Intel MKL"),
    ("libopenblas", "OpenBLAS"),
    ("libblis", "BLIS"),
    ("libtbb", "Intel TBB"),
];

/// Internal-thread estimate when libraries are present but nothing is
/// pinned and no thread activity was observed. Most BLAS builds default to
/// 4-8 threads on current hardware.
const LIBRARY_DEFAULT_THREADS: usize = 4;

#[derive(Debug, Clone, Default)]
struct DetectionCache {
    parallel_libraries: Vec<String>,
    env_vars: Vec<(String, String)>,
}

static DETECTION_CACHE: Mutex<Option<DetectionCache>> = Mutex::new(None);

/// Thread counts observed around one probe invocation of the task
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadActivity {
    pub before: u64,
    pub during: u64,
    pub after: u64,
    /// Peak increase over the baseline; > 0 means the task created threads
    pub delta: i64,
}

/// Whether the test-suite suppression hatch is active
pub fn testing_mode() -> bool {
    match std::env::var(TESTING_ENV) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => false,
    }
}

/// Parallel runtime libraries currently mapped into this process
///
/// Cached for the process lifetime; libraries stay mapped once loaded.
pub fn detect_parallel_libraries() -> Vec<String> {
    cached_detection().parallel_libraries
}

/// Thread-count environment variables that are set, with their values
pub fn parallel_environment_vars() -> Vec<(String, String)> {
    cached_detection().env_vars
}

fn cached_detection() -> DetectionCache {
    let mut guard = DETECTION_CACHE.lock().unwrap();
    if let Some(cache) = guard.as_ref() {
        return cache.clone();
    }
    let cache = DetectionCache {
        parallel_libraries: scan_loaded_libraries(),
        env_vars: scan_environment(),
    };
    *guard = Some(cache.clone());
    cache
}

/// Clear cached library and environment scans. Test-only entry point.
pub fn clear_detection_caches() {
    *DETECTION_CACHE.lock().unwrap() = None;
}

fn scan_loaded_libraries() -> Vec<String> {
    let maps = match fs::read_to_string("/proc/self/maps") {
        Ok(maps) => maps,
        Err(_) => return Vec::new(),
    };
    let mut detected = Vec::new();
    for (pattern, display_name) in PARALLEL_LIBRARY_PATTERNS {
        if maps.contains(pattern) && !detected.iter().any(|name| name == display_name) {
            detected.push(display_name.to_string());
        }
    }
    detected
}

fn scan_environment() -> Vec<(String, String)> {
    THREAD_ENV_VARS
        .iter()
        .filter_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// Observe thread activity while invoking the task on one element
///
/// Invokes the task once and compares the process thread count before,
/// immediately after, and after a brief pause for cleanup. Panics from the
/// task leave the baseline counts in place (delta 0); the sampling loop
/// reports the failure separately.
pub fn detect_thread_activity<W: Task + ?Sized>(task: &W, element: &W::Input) -> ThreadActivity {
    let before = read_thread_count().unwrap_or(0);

    let invoked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = task.invoke(element);
    }));
    if invoked.is_err() {
        return ThreadActivity {
            before,
            during: before,
            after: before,
            delta: 0,
        };
    }

    let during = read_thread_count().unwrap_or(before).max(before);
    std::thread::sleep(Duration::from_millis(1));
    let after = read_thread_count().unwrap_or(before);

    ThreadActivity {
        before,
        during,
        after,
        delta: during as i64 - before as i64,
    }
}

/// Decide whether nested parallelism is present
///
/// True when the thread count rose during execution, or when parallel
/// libraries are loaded and no thread-count variable pins them to 1.
pub fn nested_parallelism_detected(
    libraries: &[String],
    env_vars: &[(String, String)],
    activity: &ThreadActivity,
) -> bool {
    if activity.delta > 0 {
        return true;
    }
    if !libraries.is_empty() {
        let pinned_to_one = env_vars.iter().any(|(_, value)| value == "1");
        return !pinned_to_one;
    }
    false
}

/// Estimate the internal threads one task invocation uses
///
/// Priority: an explicitly pinned environment value, then the observed
/// thread delta plus one, then a library default, then 1.
pub fn estimate_internal_threads(
    libraries: &[String],
    env_vars: &[(String, String)],
    activity: &ThreadActivity,
) -> usize {
    for (_, value) in env_vars {
        if let Ok(threads) = value.parse::<usize>() {
            if threads > 0 {
                return threads;
            }
        }
    }
    if activity.delta > 0 {
        return activity.delta as usize + 1;
    }
    if !libraries.is_empty() {
        return LIBRARY_DEFAULT_THREADS;
    }
    1
}
