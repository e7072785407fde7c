//! Streaming decision engine
//!
//! `optimize_streaming` is the sibling of [`super::optimize`] for
//! incremental (pipelined) consumption, where results are handled as they
//! arrive instead of accumulated. That changes four things:
//!
//! - no result-memory pressure check (nothing accumulates)
//! - an ordered-vs-unordered dispatch choice, driven by how large the
//!   per-item overhead is relative to the computation
//! - an optional adaptive-chunking policy for heterogeneous workloads,
//!   applied at runtime by the pool, not by this engine
//! - a result buffer size, optionally capped by a memory budget when
//!   backpressure is enabled
//!
//! All other gates (serializability, the 1 ms floor, the 1.2x marginal
//! benefit threshold) apply unchanged.

use super::{
    probe_single_call, OptimizeOptions, HETEROGENEITY_CV_THRESHOLD, MIN_EXEC_TIME, MIN_SPEEDUP,
};
use crate::cache::{self, CacheEntry, DispatcherKind};
use crate::error::{AmorsizeError, Result};
use crate::fingerprint;
use crate::model::{cost_breakdown, estimate_speedup, CostInputs};
use crate::platform;
use crate::profile::{format_time, DiagnosticProfile};
use crate::sampling::{self, nested, Reconstructed, SampleOptions, SamplingResult};
use crate::task::Task;
use serde::Serialize;
use std::fmt;

/// Result buffer entries per worker when nothing else constrains it
pub const BUFFER_SIZE_MULTIPLIER: usize = 3;

/// Upper bound on adaptive chunk growth, as a multiple of the initial size
pub const MAX_CHUNKSIZE_GROWTH_FACTOR: usize = 4;

/// Fraction of available memory budgeted for buffered results
pub const RESULT_BUFFER_MEMORY_FRACTION: f64 = 0.1;

/// Overhead-to-compute ratio above which unordered dispatch pays off
pub const UNORDERED_OVERHEAD_THRESHOLD: f64 = 0.2;

/// CV above which adaptive chunking is worth enabling
pub const ADAPTIVE_CHUNKING_CV_THRESHOLD: f64 = 0.3;

/// Options accepted by [`optimize_streaming`]
#[derive(Debug, Clone)]
pub struct StreamingOptions {
    /// Everything shared with the batch engine
    pub common: OptimizeOptions,
    /// Force ordered (Some(true)) or unordered (Some(false)) dispatch;
    /// None lets the overhead analysis decide
    pub prefer_ordered: Option<bool>,
    /// Fixed result buffer size; None derives it from the worker count
    pub buffer_size: Option<usize>,
    /// Permit runtime chunk resizing for heterogeneous workloads
    pub enable_adaptive_chunking: bool,
    /// Aggressiveness of adaptive resizing (0..=1)
    pub adaptation_rate: f64,
    /// Cap the buffer by a memory budget and set a pause threshold
    pub enable_memory_backpressure: bool,
    /// Fraction of RAM above which the pool should pause consumption
    pub memory_threshold: f64,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            common: OptimizeOptions::default(),
            prefer_ordered: None,
            buffer_size: None,
            enable_adaptive_chunking: false,
            adaptation_rate: 0.3,
            enable_memory_backpressure: false,
            memory_threshold: 0.8,
        }
    }
}

impl StreamingOptions {
    /// Reject caller errors before any work happens
    pub fn validate(&self) -> Result<()> {
        self.common.validate()?;
        if let Some(buffer) = self.buffer_size {
            if buffer == 0 {
                return Err(AmorsizeError::validation("buffer_size must be >= 1"));
            }
        }
        if !(0.0..=1.0).contains(&self.adaptation_rate) || !self.adaptation_rate.is_finite() {
            return Err(AmorsizeError::validation(format!(
                "adaptation_rate must be within 0.0..=1.0, got {}",
                self.adaptation_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.memory_threshold) || !self.memory_threshold.is_finite() {
            return Err(AmorsizeError::validation(format!(
                "memory_threshold must be within 0.0..=1.0, got {}",
                self.memory_threshold
            )));
        }
        Ok(())
    }
}

/// Runtime chunk-resizing policy handed to the pool
///
/// The engine only recommends the policy; the pool applies it while the
/// stream runs.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveChunkingPolicy {
    pub initial_chunksize: usize,
    pub min_chunksize: usize,
    pub max_chunksize: usize,
    pub adaptation_rate: f64,
    pub target_chunk_duration_s: f64,
}

/// Recommendation produced by [`optimize_streaming`]
pub struct StreamingOptimizationResult<T, R> {
    pub n_jobs: usize,
    pub chunksize: usize,
    /// True: ordered dispatch preserves input order; false: results
    /// arrive as they complete
    pub use_ordered: bool,
    pub reason: String,
    pub estimated_speedup: f64,
    pub warnings: Vec<String>,
    pub data: Reconstructed<T, R>,
    pub profile: Option<DiagnosticProfile>,
    pub cache_hit: bool,
    /// Present when adaptive chunking was enabled and the workload is
    /// heterogeneous enough to benefit
    pub adaptive_chunking: Option<AdaptiveChunkingPolicy>,
    pub buffer_size: usize,
    pub memory_backpressure_enabled: bool,
    /// Fraction of RAM above which the pool should pause consumption
    pub memory_threshold: f64,
}

impl<T, R> StreamingOptimizationResult<T, R> {
    /// The dispatch primitive this recommendation targets
    pub fn dispatcher_kind(&self) -> DispatcherKind {
        if self.use_ordered {
            DispatcherKind::Imap
        } else {
            DispatcherKind::ImapUnordered
        }
    }

    /// Detailed diagnostic report, or a pointer at the profile option
    pub fn explain(&self) -> String {
        match &self.profile {
            Some(profile) => profile.explain(),
            None => "diagnostic profiling not enabled; set OptimizeOptions::profile for a detailed report"
                .to_string(),
        }
    }
}

impl<T, R> fmt::Display for StreamingOptimizationResult<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recommended: n_jobs={}, chunksize={}, dispatch={}\nReason: {}\nEstimated speedup: {:.2}x",
            self.n_jobs,
            self.chunksize,
            self.dispatcher_kind(),
            self.reason,
            self.estimated_speedup
        )?;
        if !self.warnings.is_empty() {
            write!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                write!(f, "\n  - {warning}")?;
            }
        }
        Ok(())
    }
}

/// Analyze a task for incremental execution and recommend pool parameters
///
/// # Errors
///
/// Only on invalid options; see [`super::optimize`] for the fail-safe
/// behavior shared by both engines.
pub fn optimize_streaming<W, I>(
    task: &W,
    data: I,
    opts: &StreamingOptions,
) -> Result<StreamingOptimizationResult<W::Input, I::IntoIter>>
where
    W: Task + ?Sized,
    I: IntoIterator<Item = W::Input>,
{
    opts.validate()?;
    let common = &opts.common;

    let mut diag = common.profile.then(DiagnosticProfile::new);
    let mut warnings: Vec<String> = Vec::new();

    let physical_cores = platform::physical_cores();
    let spawn_cost = platform::spawn_cost_s(common.use_spawn_benchmark);
    let dispatch_cost = platform::chunk_dispatch_cost_s(common.use_chunking_benchmark);
    let (available_memory, memory_probed) = match platform::probe_available_memory() {
        Some(bytes) => (bytes, true),
        None => (platform::FALLBACK_AVAILABLE_MEMORY, false),
    };
    if !memory_probed {
        warnings.push("available memory could not be probed; assuming a conservative default".to_string());
    }

    if let Some(diag) = diag.as_mut() {
        diag.physical_cores = physical_cores;
        diag.logical_cores = platform::logical_cores();
        diag.spawn_cost_s = spawn_cost;
        diag.chunk_dispatch_cost_s = dispatch_cost;
        diag.available_memory_bytes = available_memory;
        diag.spawn_model = platform::spawn_model().to_string();
        diag.target_chunk_duration_s = common.target_chunk_duration_s;
    }

    if common.verbose {
        println!("Streaming optimization: sampling {} items...", common.sample_size);
    }

    let split = sampling::split_input(data, common.sample_size);
    let total_known = split.total_items;

    // Preliminary cache lookup; only entries recorded by the streaming
    // engine count, so batch decisions never masquerade as dispatch
    // choices.
    if common.use_cache && split.error.is_none() && !split.prefix.is_empty() {
        if let Some(total) = total_known {
            if let Some(provisional) = probe_single_call(task, &split.prefix[0]) {
                let key = fingerprint::cache_key(task, total, provisional);
                let (entry, _) = cache::load_entry(&key, common.cache_ttl);
                if let Some(entry) = entry {
                    if entry.dispatcher_kind != DispatcherKind::Map {
                        let use_ordered = entry.dispatcher_kind == DispatcherKind::Imap;
                        let n_jobs = entry.n_jobs;
                        if let Some(diag) = diag.as_mut() {
                            diag.recommendations
                                .push(format!("decision served from cache ({key})"));
                        }
                        return Ok(StreamingOptimizationResult {
                            n_jobs,
                            chunksize: entry.chunksize,
                            use_ordered,
                            reason: entry.reason,
                            estimated_speedup: entry.estimated_speedup,
                            warnings: entry.warnings,
                            data: Reconstructed::new(split.prefix, split.rest),
                            profile: diag,
                            cache_hit: true,
                            adaptive_chunking: None,
                            buffer_size: opts
                                .buffer_size
                                .unwrap_or(n_jobs * BUFFER_SIZE_MULTIPLIER)
                                .max(1),
                            memory_backpressure_enabled: opts.enable_memory_backpressure,
                            memory_threshold: opts.memory_threshold,
                        });
                    }
                }
            }
        }
    }

    let sample_opts = SampleOptions {
        sample_size: common.sample_size,
        enable_memory_tracking: common.enable_memory_tracking,
        enable_function_profiling: common.enable_function_profiling,
    };
    let sampling = sampling::sample_split(task, split, &sample_opts);
    super::populate_sampling_profile(diag.as_mut(), &sampling);

    // Hard rejections shared with the batch engine.
    if let Some(error) = &sampling.error {
        let reason = format!("error during sampling: {error}");
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(format!("sampling failed: {error}"));
        }
        warnings.push(format!("sampling failed: {error}"));
        return Ok(serial_streaming(reason, 1, warnings, sampling, diag, opts));
    }

    if !sampling.function_is_encodable {
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(
                "task is not serializable; process pools require transferable tasks".to_string(),
            );
        }
        warnings.push("task cannot be serialized for worker transfer; use serial execution".to_string());
        return Ok(serial_streaming(
            "task is not serializable; cannot use a process pool".to_string(),
            1,
            warnings,
            sampling,
            diag,
            opts,
        ));
    }

    if !sampling.args_are_encodable {
        let index = sampling.first_unencodable_index.unwrap_or(0);
        let mut reason = format!("input element at index {index} is not serializable");
        if let Some(error) = &sampling.encode_error {
            reason.push_str(&format!(": {error}"));
        }
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons
                .push("input elements are not serializable".to_string());
        }
        warnings.push(format!("{reason}; use serial execution"));
        return Ok(serial_streaming(reason, 1, warnings, sampling, diag, opts));
    }

    // Nested parallelism feeds the worker clamp.
    let mut estimated_internal_threads = 1usize;
    if sampling.nested_parallelism_detected {
        let libraries = sampling.detected_parallel_libraries.join(", ");
        warnings.push(format!(
            "nested parallelism detected (libraries: {}); thread increase: +{}",
            if libraries.is_empty() { "unknown" } else { &libraries },
            sampling.thread_count_delta.max(0)
        ));
        let env_vars = nested::parallel_environment_vars();
        let activity = nested::ThreadActivity {
            delta: sampling.thread_count_delta,
            ..Default::default()
        };
        estimated_internal_threads = nested::estimate_internal_threads(
            &sampling.detected_parallel_libraries,
            &env_vars,
            &activity,
        );
    }

    let (mismatch, mismatch_warning) = platform::check_spawn_model_mismatch();
    if mismatch {
        warnings.push(mismatch_warning);
    }

    let avg_time = sampling.avg_exec_time_s;

    // The 1 ms floor applies to streaming unchanged.
    if avg_time < MIN_EXEC_TIME {
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(format!(
                "task execution time ({}) is below the 1ms threshold",
                format_time(avg_time)
            ));
        }
        return Ok(serial_streaming(
            format!(
                "task is too fast ({} < 1ms per item); parallelization overhead would dominate",
                format_time(avg_time)
            ),
            1,
            warnings,
            sampling,
            diag,
            opts,
        ));
    }

    // Chunk size, with the same heterogeneity scaling as batch mode.
    let mut chunksize = ((common.target_chunk_duration_s / avg_time) as usize).max(1);
    let cv = sampling.coef_var;
    if cv > HETEROGENEITY_CV_THRESHOLD {
        let scale = (1.0 - cv * 0.5).max(0.25);
        chunksize = ((chunksize as f64 * scale) as usize).max(1);
        if let Some(diag) = diag.as_mut() {
            diag.constraints.push(format!(
                "heterogeneous workload (CV={cv:.2}); smaller chunks improve load balance"
            ));
        }
    }
    if let Some(total) = total_known {
        chunksize = chunksize.min((total / 10).max(1));
    }
    if let Some(diag) = diag.as_mut() {
        diag.optimal_chunksize = chunksize;
    }

    // Worker count: physical cores, clamped by per-call memory and by
    // internal threading. No result-accumulation term here; streaming
    // consumes results as they arrive.
    let mut n_jobs = physical_cores;
    if common.enable_memory_tracking && sampling.peak_memory_bytes > 0 {
        let fit = (available_memory / sampling.peak_memory_bytes).max(1) as usize;
        if fit < n_jobs {
            warnings.push(format!(
                "memory constraints limit workers to {fit} (physical cores: {physical_cores})"
            ));
            n_jobs = fit;
        }
    }
    if common.auto_adjust_for_nested_parallelism && estimated_internal_threads > 1 {
        let adjusted = (physical_cores / estimated_internal_threads).max(1);
        if adjusted < n_jobs {
            warnings.push(format!(
                "reduced workers to {adjusted} to prevent thread oversubscription \
                 (~{estimated_internal_threads} internal threads per worker)"
            ));
            n_jobs = adjusted;
        }
    }
    if let Some(diag) = diag.as_mut() {
        diag.max_workers_cpu = physical_cores;
        diag.max_workers_memory = n_jobs;
    }

    // Predict speedup and apply the marginal gate.
    let estimated = match total_known {
        Some(total) if n_jobs > 1 && total > 0 => {
            let serial_time = total as f64 * avg_time;
            if let Some(diag) = diag.as_mut() {
                diag.estimated_serial_time_s = serial_time;
                diag.total_items = Some(total);
            }
            let inputs = CostInputs {
                total_compute_s: serial_time,
                per_item_result_encode_s: sampling.avg_result_encode_time_s,
                per_item_arg_encode_s: sampling.avg_arg_encode_time_s,
                spawn_s: spawn_cost,
                dispatch_per_chunk_s: dispatch_cost,
                n_jobs,
                chunksize,
                total_items: total,
            };
            let speedup = estimate_speedup(&inputs);
            if let Some(diag) = diag.as_mut() {
                let breakdown = cost_breakdown(&inputs);
                diag.theoretical_max_speedup = n_jobs as f64;
                diag.estimated_speedup = speedup;
                diag.speedup_efficiency = speedup / n_jobs as f64;
                diag.overhead_spawn_s = breakdown.spawn_total_s;
                diag.overhead_ipc_s = breakdown.ipc_total_s;
                diag.overhead_dispatch_s = breakdown.dispatch_total_s;
                diag.parallel_compute_time_s = breakdown.parallel_compute_s;
            }
            if speedup < MIN_SPEEDUP {
                if let Some(diag) = diag.as_mut() {
                    diag.rejection_reasons.push(format!(
                        "estimated speedup ({speedup:.2}x) is below the {MIN_SPEEDUP}x threshold"
                    ));
                }
                // Honor an explicit ordering preference even on rejection.
                let use_ordered = opts.prefer_ordered.unwrap_or(true);
                let mut result = serial_streaming(
                    format!("insufficient speedup: {speedup:.2}x (threshold: {MIN_SPEEDUP}x)"),
                    chunksize,
                    warnings,
                    sampling,
                    diag,
                    opts,
                );
                result.use_ordered = use_ordered;
                persist_streaming(task, common, total_known, avg_time, &result);
                return Ok(result);
            }
            speedup
        }
        _ => {
            // Unknown size: conservative efficiency heuristic.
            let speedup = n_jobs as f64 * 0.8;
            if let Some(diag) = diag.as_mut() {
                diag.theoretical_max_speedup = n_jobs as f64;
                diag.estimated_speedup = speedup;
                diag.speedup_efficiency = 0.8;
            }
            speedup
        }
    };

    if n_jobs == 1 {
        let use_ordered = opts.prefer_ordered.unwrap_or(true);
        let mut result = serial_streaming(
            "serial execution recommended based on resource constraints".to_string(),
            chunksize,
            warnings,
            sampling,
            diag,
            opts,
        );
        result.use_ordered = use_ordered;
        persist_streaming(task, common, total_known, avg_time, &result);
        return Ok(result);
    }

    // Ordered vs. unordered: caller preference wins; otherwise reorder
    // only when per-item overhead is a significant fraction of compute.
    let (use_ordered, order_reason) = match opts.prefer_ordered {
        Some(preference) => (preference, "caller preference".to_string()),
        None => {
            let overhead_fraction = (spawn_cost + sampling.avg_result_encode_time_s) / avg_time;
            if overhead_fraction > UNORDERED_OVERHEAD_THRESHOLD {
                (
                    false,
                    format!(
                        "unordered dispatch avoids reorder stalls (overhead is {:.0}% of execution time)",
                        overhead_fraction * 100.0
                    ),
                )
            } else {
                (
                    true,
                    "overhead is minimal; ordered results preferred for usability".to_string(),
                )
            }
        }
    };

    // Adaptive chunking only helps when per-item times actually vary.
    let adaptive_chunking = if opts.enable_adaptive_chunking && cv > ADAPTIVE_CHUNKING_CV_THRESHOLD
    {
        if let Some(diag) = diag.as_mut() {
            diag.recommendations.push(format!(
                "adaptive chunking enabled (CV={cv:.2}); chunks resize between 1 and {}",
                chunksize * MAX_CHUNKSIZE_GROWTH_FACTOR
            ));
        }
        Some(AdaptiveChunkingPolicy {
            initial_chunksize: chunksize,
            min_chunksize: 1,
            max_chunksize: chunksize * MAX_CHUNKSIZE_GROWTH_FACTOR,
            adaptation_rate: opts.adaptation_rate,
            target_chunk_duration_s: common.target_chunk_duration_s,
        })
    } else {
        None
    };

    // Buffer size: enough in flight for throughput, bounded by the memory
    // budget when backpressure is on, never below the worker count.
    let mut buffer_size = opts
        .buffer_size
        .unwrap_or(n_jobs * BUFFER_SIZE_MULTIPLIER)
        .max(1);
    if opts.enable_memory_backpressure && sampling.avg_result_size_bytes > 0 {
        let budget = (available_memory as f64 * RESULT_BUFFER_MEMORY_FRACTION) as u64;
        let fit = (budget / sampling.avg_result_size_bytes) as usize;
        buffer_size = buffer_size.min(fit.max(n_jobs));
        if let Some(diag) = diag.as_mut() {
            diag.recommendations.push(format!(
                "memory backpressure enabled (threshold: {:.0}%), buffer capped at {buffer_size} results",
                opts.memory_threshold * 100.0
            ));
        }
    }

    let dispatch_name = if use_ordered { "ordered" } else { "unordered" };
    let reason = format!(
        "streaming parallelization beneficial: {n_jobs} workers with chunks of {chunksize}, \
         {dispatch_name} dispatch ({order_reason})"
    );
    if let Some(diag) = diag.as_mut() {
        diag.recommendations.push(format!(
            "use {dispatch_name} dispatch with n_jobs={n_jobs}, chunksize={chunksize}"
        ));
    }

    let result = StreamingOptimizationResult {
        n_jobs,
        chunksize,
        use_ordered,
        reason,
        estimated_speedup: estimated,
        warnings,
        data: sampling.into_data(),
        profile: diag,
        cache_hit: false,
        adaptive_chunking,
        buffer_size,
        memory_backpressure_enabled: opts.enable_memory_backpressure,
        memory_threshold: opts.memory_threshold,
    };
    persist_streaming(task, common, total_known, avg_time, &result);
    Ok(result)
}

fn serial_streaming<T, R: Iterator<Item = T>>(
    reason: String,
    chunksize: usize,
    warnings: Vec<String>,
    sampling: SamplingResult<T, R>,
    profile: Option<DiagnosticProfile>,
    opts: &StreamingOptions,
) -> StreamingOptimizationResult<T, R> {
    StreamingOptimizationResult {
        n_jobs: 1,
        chunksize: chunksize.max(1),
        use_ordered: true,
        reason,
        estimated_speedup: 1.0,
        warnings,
        data: sampling.into_data(),
        profile,
        cache_hit: false,
        adaptive_chunking: None,
        buffer_size: opts.buffer_size.unwrap_or(1).max(1),
        memory_backpressure_enabled: opts.enable_memory_backpressure,
        memory_threshold: opts.memory_threshold,
    }
}

fn persist_streaming<W: Task + ?Sized, T, R>(
    task: &W,
    common: &OptimizeOptions,
    total_items: Option<usize>,
    avg_time_s: f64,
    result: &StreamingOptimizationResult<T, R>,
) {
    if !common.use_cache {
        return;
    }
    let Some(total) = total_items else {
        return;
    };
    let key = fingerprint::cache_key(task, total, avg_time_s);
    let mut entry = CacheEntry::new(
        result.n_jobs,
        result.chunksize,
        result.dispatcher_kind(),
        result.estimated_speedup,
        result.reason.clone(),
        result.warnings.clone(),
    );
    entry.function_complexity = Some(fingerprint::function_complexity(task));
    if let Some(profile) = &result.profile {
        entry.result_size_bytes = Some(profile.result_size_bytes);
        entry.coefficient_of_variation = Some(profile.coefficient_of_variation);
    }
    cache::save_entry(&key, &entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;
    use crate::testenv::EnvGuard;
    use std::time::{Duration, Instant};

    fn no_cache_opts() -> StreamingOptions {
        StreamingOptions {
            common: OptimizeOptions {
                use_cache: false,
                use_spawn_benchmark: false,
                use_chunking_benchmark: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn spin_for(duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }

    fn busy_task(label: &str, millis: u64) -> FnTask<impl Fn(&u64) -> u64, u64, u64> {
        FnTask::new(format!("busy-{millis}ms-{label}"), move |_: &u64| {
            spin_for(Duration::from_millis(millis));
            0u64
        })
    }

    #[test]
    fn test_invalid_rates_are_caller_errors() {
        let _env = EnvGuard::testing();
        let task = FnTask::new("noop", |x: &u64| *x);

        let opts = StreamingOptions {
            adaptation_rate: 1.5,
            ..no_cache_opts()
        };
        assert!(optimize_streaming(&task, vec![1u64], &opts).is_err());

        let opts = StreamingOptions {
            memory_threshold: -0.1,
            ..no_cache_opts()
        };
        assert!(optimize_streaming(&task, vec![1u64], &opts).is_err());

        let opts = StreamingOptions {
            buffer_size: Some(0),
            ..no_cache_opts()
        };
        assert!(optimize_streaming(&task, vec![1u64], &opts).is_err());
    }

    #[test]
    fn test_too_fast_goes_serial() {
        let _env = EnvGuard::testing();
        let task = FnTask::new("fast", |x: &u64| x + 1);
        let result =
            optimize_streaming(&task, (0..10_000u64).collect::<Vec<_>>(), &no_cache_opts())
                .unwrap();
        assert_eq!(result.n_jobs, 1);
        assert_eq!(result.estimated_speedup, 1.0);
        assert!(result.use_ordered);
        assert!(result.reason.contains("too fast"));
    }

    #[test]
    fn test_streaming_parallelizes_slow_workload() {
        let _env = EnvGuard::testing();
        let task = busy_task("stream", 3);
        let result =
            optimize_streaming(&task, (0..1000u64).collect::<Vec<_>>(), &no_cache_opts()).unwrap();

        let cores = crate::platform::physical_cores();
        if cores > 1 {
            assert_eq!(result.n_jobs, cores);
            assert!(result.estimated_speedup >= MIN_SPEEDUP);
            assert_eq!(result.buffer_size, cores * BUFFER_SIZE_MULTIPLIER);
        }
        assert_eq!(result.data.count(), 1000);
    }

    #[test]
    fn test_ordered_choice_for_low_overhead() {
        let _env = EnvGuard::testing();
        // 20ms compute vs ~5ms spawn cost: overhead fraction 0.25 > 0.2
        // would pick unordered; 50ms compute pushes it under the line.
        let task = busy_task("long", 50);
        let result =
            optimize_streaming(&task, (0..200u64).collect::<Vec<_>>(), &no_cache_opts()).unwrap();
        let fork_model = crate::platform::spawn_model() == crate::platform::SpawnModel::Fork;
        if result.n_jobs > 1 && fork_model {
            // 5ms default spawn cost against 50ms compute: 10% overhead.
            assert!(result.use_ordered, "low overhead should keep ordering: {}", result.reason);
        }
    }

    #[test]
    fn test_unordered_choice_for_high_overhead() {
        let _env = EnvGuard::testing();
        // ~2ms compute against a 5ms default spawn cost: overhead fraction
        // well above 0.2, so unordered wins.
        let task = busy_task("short", 2);
        let result =
            optimize_streaming(&task, (0..5000u64).collect::<Vec<_>>(), &no_cache_opts()).unwrap();
        if result.n_jobs > 1 {
            assert!(!result.use_ordered, "high overhead should drop ordering: {}", result.reason);
            assert!(result.reason.contains("unordered"));
        }
    }

    #[test]
    fn test_caller_preference_overrides_auto_choice() {
        let _env = EnvGuard::testing();
        let task = busy_task("forced", 2);
        let opts = StreamingOptions {
            prefer_ordered: Some(true),
            ..no_cache_opts()
        };
        let result =
            optimize_streaming(&task, (0..5000u64).collect::<Vec<_>>(), &opts).unwrap();
        assert!(result.use_ordered);
    }

    #[test]
    fn test_adaptive_chunking_requires_heterogeneity() {
        let _env = EnvGuard::testing();
        // Homogeneous: enabled but not attached.
        let task = busy_task("steady", 3);
        let opts = StreamingOptions {
            enable_adaptive_chunking: true,
            ..no_cache_opts()
        };
        let result =
            optimize_streaming(&task, (0..1000u64).collect::<Vec<_>>(), &opts).unwrap();
        if result.n_jobs > 1 {
            assert!(result.adaptive_chunking.is_none());
        }

        // Heterogeneous: policy attached with the 4x growth bound.
        let task = FnTask::new("spiky-stream", |x: &u64| {
            let ms = if x % 5 == 0 { 50 } else { 2 };
            std::thread::sleep(Duration::from_millis(ms));
            *x
        });
        let opts = StreamingOptions {
            enable_adaptive_chunking: true,
            adaptation_rate: 0.5,
            common: OptimizeOptions {
                sample_size: 10,
                ..no_cache_opts().common
            },
            ..no_cache_opts()
        };
        let result =
            optimize_streaming(&task, (0..200u64).collect::<Vec<_>>(), &opts).unwrap();
        if result.n_jobs > 1 {
            let policy = result.adaptive_chunking.expect("heterogeneous workload");
            assert_eq!(policy.initial_chunksize, result.chunksize);
            assert_eq!(policy.min_chunksize, 1);
            assert_eq!(policy.max_chunksize, result.chunksize * MAX_CHUNKSIZE_GROWTH_FACTOR);
            assert!((policy.adaptation_rate - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_backpressure_caps_buffer() {
        let _env = EnvGuard::testing();
        // ~8MB results: the 10% memory budget holds far fewer than
        // n_jobs * 3 of them on any realistic machine.
        let task = FnTask::new("huge-result", |_: &u64| {
            spin_for(Duration::from_millis(2));
            vec![0u8; 8_000_000]
        });
        let opts = StreamingOptions {
            enable_memory_backpressure: true,
            memory_threshold: 0.7,
            common: OptimizeOptions {
                sample_size: 3,
                ..no_cache_opts().common
            },
            ..no_cache_opts()
        };
        let result =
            optimize_streaming(&task, (0..100_000u64).collect::<Vec<_>>(), &opts).unwrap();
        if result.n_jobs > 1 {
            assert!(result.buffer_size >= result.n_jobs);
            let budget = (crate::platform::available_memory_bytes() as f64
                * RESULT_BUFFER_MEMORY_FRACTION) as u64;
            let fit = (budget / 8_000_000).max(result.n_jobs as u64) as usize;
            assert!(result.buffer_size <= fit.max(result.n_jobs * BUFFER_SIZE_MULTIPLIER));
            assert!(result.memory_backpressure_enabled);
            assert!((result.memory_threshold - 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn test_streaming_cache_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let _env = EnvGuard::testing_with_cache(temp.path());

        let task = busy_task("cached", 2);
        let opts = StreamingOptions {
            common: OptimizeOptions {
                use_spawn_benchmark: false,
                use_chunking_benchmark: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let first =
            optimize_streaming(&task, (0..1000u64).collect::<Vec<_>>(), &opts).unwrap();
        assert!(!first.cache_hit);
        let second =
            optimize_streaming(&task, (0..1000u64).collect::<Vec<_>>(), &opts).unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.n_jobs, first.n_jobs);
        assert_eq!(second.chunksize, first.chunksize);
        assert_eq!(second.use_ordered, first.use_ordered);
    }

    #[test]
    fn test_unserializable_task_streaming_serial() {
        let _env = EnvGuard::testing();
        let task = FnTask::anonymous(|_: &u64| {
            spin_for(Duration::from_millis(2));
            0u64
        });
        let result =
            optimize_streaming(&task, (0..100u64).collect::<Vec<_>>(), &no_cache_opts()).unwrap();
        assert_eq!(result.n_jobs, 1);
        assert!(result.use_ordered);
        assert!(result.reason.contains("serializable"));
    }
}
