//! Batch decision engine
//!
//! `optimize` analyzes a task and its input, then recommends how to run it
//! on a process pool: worker count, chunk size, and the speedup to expect.
//! The guiding failure mode is negative scaling, where spawn, IPC, and
//! dispatch overheads exceed the compute saved; a chain of rejection gates
//! maps every such workload to serial execution with a captured reason.
//!
//! Fail-safe protocol: once options validate, this function is total.
//! Sampling failures, unserializable values, cache corruption, and platform
//! probe failures all degrade into a serial recommendation; the only `Err`
//! is caller misuse.
//!
//! When the input is a single-shot iterator, the elements consumed by the
//! dry run are chained back in front of the tail. Always consume
//! `result.data` instead of the original input.

pub mod batching;
pub mod streaming;

use crate::cache::{self, CacheEntry, DispatcherKind};
use crate::error::{AmorsizeError, Result};
use crate::fingerprint;
use crate::model::{cost_breakdown, estimate_speedup, CostInputs};
use crate::platform;
use crate::profile::{format_bytes, format_time, DiagnosticProfile};
use crate::sampling::{
    self, nested, Reconstructed, SampleOptions, SamplingResult, DEFAULT_SAMPLE_SIZE,
};
use crate::task::Task;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Functions averaging under this are rejected outright (seconds)
pub const MIN_EXEC_TIME: f64 = 0.001;

/// Predicted speedups under this are not worth the complexity
pub const MIN_SPEEDUP: f64 = 1.2;

/// Default chunk duration target (seconds)
pub const DEFAULT_TARGET_CHUNK_DURATION: f64 = 0.2;

/// CV above which a workload counts as heterogeneous for chunk scaling
pub const HETEROGENEITY_CV_THRESHOLD: f64 = 0.5;

/// Conservative efficiency factor when the input length is unknown
const UNKNOWN_SIZE_EFFICIENCY: f64 = 0.7;

/// Options accepted by [`optimize`]
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Elements consumed by the dry run (1..=10000)
    pub sample_size: usize,
    /// Target duration of one chunk before heterogeneity scaling (seconds)
    pub target_chunk_duration_s: f64,
    /// Measure real spawn cost instead of the OS default
    pub use_spawn_benchmark: bool,
    /// Measure real dispatch cost instead of the default
    pub use_chunking_benchmark: bool,
    /// Track RSS growth during the dry run; disabling skips the
    /// memory-based worker clamp
    pub enable_memory_tracking: bool,
    /// Collect per-call timing detail in the sampling result
    pub enable_function_profiling: bool,
    /// Populate a [`DiagnosticProfile`] on the result
    pub profile: bool,
    /// Consult and populate the decision cache
    pub use_cache: bool,
    /// TTL applied to cache lookups
    pub cache_ttl: Duration,
    /// Lower the worker count when the task itself is internally threaded
    pub auto_adjust_for_nested_parallelism: bool,
    /// Print analysis progress to stdout
    pub verbose: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            target_chunk_duration_s: DEFAULT_TARGET_CHUNK_DURATION,
            use_spawn_benchmark: true,
            use_chunking_benchmark: true,
            enable_memory_tracking: true,
            enable_function_profiling: false,
            profile: false,
            use_cache: true,
            cache_ttl: cache::DEFAULT_TTL,
            auto_adjust_for_nested_parallelism: true,
            verbose: false,
        }
    }
}

impl OptimizeOptions {
    /// Reject caller errors before any work happens
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(AmorsizeError::validation("sample_size must be positive"));
        }
        if self.sample_size > 10_000 {
            return Err(AmorsizeError::validation(format!(
                "sample_size is unreasonably large ({}), maximum is 10000",
                self.sample_size
            )));
        }
        if !self.target_chunk_duration_s.is_finite() || self.target_chunk_duration_s <= 0.0 {
            return Err(AmorsizeError::validation(format!(
                "target_chunk_duration_s must be positive, got {}",
                self.target_chunk_duration_s
            )));
        }
        if self.target_chunk_duration_s > 3600.0 {
            return Err(AmorsizeError::validation(format!(
                "target_chunk_duration_s is unreasonably large ({}s), maximum is 3600s",
                self.target_chunk_duration_s
            )));
        }
        Ok(())
    }
}

/// Recommendation produced by [`optimize`]
///
/// The invariant `n_jobs == 1 ⇒ estimated_speedup == 1.0` holds on every
/// path. `data` replays the full input sequence; consume it instead of the
/// original input, which the dry run partially drained.
pub struct OptimizationResult<T, R> {
    pub n_jobs: usize,
    pub chunksize: usize,
    pub reason: String,
    pub estimated_speedup: f64,
    pub warnings: Vec<String>,
    pub data: Reconstructed<T, R>,
    pub profile: Option<DiagnosticProfile>,
    pub cache_hit: bool,
}

impl<T, R> OptimizationResult<T, R> {
    /// Detailed diagnostic report, or a pointer at the profile option
    pub fn explain(&self) -> String {
        match &self.profile {
            Some(profile) => profile.explain(),
            None => "diagnostic profiling not enabled; set OptimizeOptions::profile for a detailed report"
                .to_string(),
        }
    }
}

impl<T, R> fmt::Debug for OptimizationResult<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationResult")
            .field("n_jobs", &self.n_jobs)
            .field("chunksize", &self.chunksize)
            .field("estimated_speedup", &self.estimated_speedup)
            .field("cache_hit", &self.cache_hit)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T, R> fmt::Display for OptimizationResult<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recommended: n_jobs={}, chunksize={}\nReason: {}\nEstimated speedup: {:.2}x",
            self.n_jobs, self.chunksize, self.reason, self.estimated_speedup
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

/// Analyze a task over an input and recommend pool parameters
///
/// # Errors
///
/// Only on invalid options. Every runtime failure degrades to a serial
/// recommendation with the failure captured in `reason` and `warnings`.
pub fn optimize<W, I>(
    task: &W,
    data: I,
    opts: &OptimizeOptions,
) -> Result<OptimizationResult<W::Input, I::IntoIter>>
where
    W: Task + ?Sized,
    I: IntoIterator<Item = W::Input>,
{
    opts.validate()?;

    let mut diag = opts.profile.then(DiagnosticProfile::new);
    let mut warnings: Vec<String> = Vec::new();

    if opts.verbose {
        println!("Performing dry run sampling...");
    }

    // Split first so a cache hit can skip the full dry run while still
    // returning a faithful reconstructed iterator.
    let split = sampling::split_input(data, opts.sample_size);
    let total_known = split.total_items;

    // Preliminary cache lookup, keyed by a single probe timing. The full
    // dry run refines the key for the persist path; buckets are coarse
    // enough that both usually agree.
    if opts.use_cache && split.error.is_none() && !split.prefix.is_empty() {
        if let Some(total) = total_known {
            if let Some(provisional) = probe_single_call(task, &split.prefix[0]) {
                let key = fingerprint::cache_key(task, total, provisional);
                let (entry, miss_reason) = cache::load_entry(&key, opts.cache_ttl);
                match entry {
                    Some(entry) if entry.dispatcher_kind == DispatcherKind::Map => {
                        if opts.verbose {
                            println!("Cache hit: {key}");
                        }
                        if let Some(diag) = diag.as_mut() {
                            diag.recommendations
                                .push(format!("decision served from cache ({key})"));
                        }
                        return Ok(OptimizationResult {
                            n_jobs: entry.n_jobs,
                            chunksize: entry.chunksize,
                            reason: entry.reason,
                            estimated_speedup: entry.estimated_speedup,
                            warnings: entry.warnings,
                            data: Reconstructed::new(split.prefix, split.rest),
                            profile: diag,
                            cache_hit: true,
                        });
                    }
                    _ => {
                        if opts.verbose && !miss_reason.is_empty() {
                            println!("Cache miss: {miss_reason}");
                        }
                    }
                }
            }
        }
    }

    // Full dry run.
    let sample_opts = SampleOptions {
        sample_size: opts.sample_size,
        enable_memory_tracking: opts.enable_memory_tracking,
        enable_function_profiling: opts.enable_function_profiling,
    };
    let sampling = sampling::sample_split(task, split, &sample_opts);

    populate_sampling_profile(diag.as_mut(), &sampling);

    let physical_cores = platform::physical_cores();

    // Nested parallelism warnings and the internal-thread estimate feed
    // the worker count selection below.
    let mut estimated_internal_threads = 1usize;
    if sampling.nested_parallelism_detected {
        let mut nested_warning =
            "nested parallelism detected: task uses internal threading".to_string();
        if sampling.thread_count_delta > 0 {
            nested_warning.push_str(&format!(
                " (thread count increased by {})",
                sampling.thread_count_delta
            ));
        }
        if !sampling.detected_parallel_libraries.is_empty() {
            nested_warning.push_str(&format!(
                "; detected libraries: {}",
                sampling.detected_parallel_libraries.join(", ")
            ));
        }
        warnings.push(nested_warning.clone());

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

        if opts.auto_adjust_for_nested_parallelism && estimated_internal_threads > 1 {
            let adjusted = (physical_cores / estimated_internal_threads).max(1);
            let adjustment = format!(
                "auto-adjusting n_jobs for {estimated_internal_threads} estimated internal threads per worker"
            );
            warnings.push(adjustment.clone());
            if let Some(diag) = diag.as_mut() {
                diag.constraints.push(adjustment);
                diag.recommendations.push(format!(
                    "n_jobs will be reduced to physical_cores/{estimated_internal_threads} = {adjusted} to prevent thread oversubscription"
                ));
            }
        } else {
            warnings.push(
                "consider pinning thread counts (OMP_NUM_THREADS=1, MKL_NUM_THREADS=1) to avoid oversubscription"
                    .to_string(),
            );
            if let Some(diag) = diag.as_mut() {
                diag.recommendations.push(
                    "set OMP_NUM_THREADS=1, MKL_NUM_THREADS=1, OPENBLAS_NUM_THREADS=1 to limit internal threading"
                        .to_string(),
                );
            }
        }
        if let Some(diag) = diag.as_mut() {
            diag.constraints.push(nested_warning);
        }
    }

    // Hard rejection: sampling failure.
    if let Some(error) = &sampling.error {
        let reason = format!("error during sampling: {error}");
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(format!("sampling failed: {error}"));
        }
        warnings.push(format!("sampling failed: {error}"));
        return Ok(serial_result(reason, 1, warnings, sampling, diag));
    }

    // Hard rejection: the task cannot reach workers.
    if !sampling.function_is_encodable {
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(
                "task is not serializable; process pools require transferable tasks".to_string(),
            );
            diag.recommendations
                .push("register the task under a stable tag so workers can resolve it".to_string());
        }
        warnings.push("task cannot be serialized for worker transfer; use serial execution".to_string());
        return Ok(serial_result(
            "task is not serializable; cannot use a process pool".to_string(),
            1,
            warnings,
            sampling,
            diag,
        ));
    }

    // Hard rejection: some element cannot reach workers.
    if !sampling.args_are_encodable {
        let index = sampling.first_unencodable_index.unwrap_or(0);
        let mut reason = format!("input element at index {index} is not serializable");
        if let Some(error) = &sampling.encode_error {
            reason.push_str(&format!(": {error}"));
        }
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons
                .push("input elements are not serializable; process pools require transferable arguments".to_string());
            diag.recommendations.push(
                "ensure elements carry no locks, file handles, or other process-local resources"
                    .to_string(),
            );
        }
        warnings.push(format!("{reason}; use serial execution"));
        return Ok(serial_result(reason, 1, warnings, sampling, diag));
    }

    let avg_time = sampling.avg_exec_time_s;
    let result_size = sampling.avg_result_size_bytes;
    let peak_memory = sampling.peak_memory_bytes;

    if opts.verbose {
        println!("Average execution time: {}", format_time(avg_time));
        println!("Average result size: {result_size} bytes");
        println!("Peak memory: {peak_memory} bytes");
        if sampling.coef_var > 0.0 {
            println!(
                "Workload variability: CV={:.2} ({})",
                sampling.coef_var,
                if sampling.coef_var > HETEROGENEITY_CV_THRESHOLD {
                    "heterogeneous"
                } else {
                    "homogeneous"
                }
            );
        }
    }

    // Workload sizing and the result-memory safety check. This runs before
    // the too-fast gate: memory explosion matters regardless of speed, and
    // the warning must ride along on serial recommendations too.
    let (available_memory, memory_probed) = match platform::probe_available_memory() {
        Some(bytes) => (bytes, true),
        None => (platform::FALLBACK_AVAILABLE_MEMORY, false),
    };
    if !memory_probed {
        warnings.push(format!(
            "available memory could not be probed; assuming {}",
            format_bytes(available_memory)
        ));
    }

    let estimated_serial_time = total_known.map(|total| total as f64 * avg_time);
    if let Some(total) = total_known {
        let estimated_result_memory = result_size.saturating_mul(total as u64);
        if let Some(diag) = diag.as_mut() {
            diag.total_items = Some(total);
            diag.estimated_serial_time_s = estimated_serial_time.unwrap_or(0.0);
            diag.estimated_result_memory_bytes = estimated_result_memory;
        }
        if estimated_result_memory > available_memory / 2 {
            let warning = format!(
                "large result accumulation: results will consume ~{} (available: {}); \
                 consider streaming (optimize_streaming) or batch processing",
                format_bytes(estimated_result_memory),
                format_bytes(available_memory)
            );
            warnings.push(warning);
            if let Some(diag) = diag.as_mut() {
                diag.constraints.push(format!(
                    "result memory ({}) exceeds the safety threshold ({})",
                    format_bytes(estimated_result_memory),
                    format_bytes(available_memory / 2)
                ));
                diag.recommendations
                    .push("use optimize_streaming() for memory-efficient incremental results".to_string());
                diag.recommendations
                    .push("or process the input in batches to bound memory".to_string());
            }
        }
    } else {
        warnings.push("cannot determine input size; using conservative heuristics".to_string());
        if let Some(diag) = diag.as_mut() {
            diag.constraints
                .push("input size unknown; conservative estimates in effect".to_string());
        }
    }

    // Hard rejection: the task is too fast for any pool to pay off.
    if avg_time < MIN_EXEC_TIME {
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons.push(format!(
                "task execution time ({}) is below the 1ms threshold",
                format_time(avg_time)
            ));
            diag.rejection_reasons
                .push("parallelization overhead would exceed the computation itself".to_string());
        }
        return Ok(serial_result(
            format!(
                "task is too fast ({} < 1ms per item); parallelization overhead would dominate",
                format_time(avg_time)
            ),
            1,
            warnings,
            sampling,
            diag,
        ));
    }

    // Platform facts.
    let logical_cores = platform::logical_cores();
    let spawn_cost = platform::spawn_cost_s(opts.use_spawn_benchmark);
    let dispatch_cost = platform::chunk_dispatch_cost_s(opts.use_chunking_benchmark);

    if let Some(diag) = diag.as_mut() {
        diag.physical_cores = physical_cores;
        diag.logical_cores = logical_cores;
        diag.spawn_cost_s = spawn_cost;
        diag.chunk_dispatch_cost_s = dispatch_cost;
        diag.available_memory_bytes = available_memory;
        diag.spawn_model = platform::spawn_model().to_string();
        diag.target_chunk_duration_s = opts.target_chunk_duration_s;
    }

    let (mismatch, mismatch_warning) = platform::check_spawn_model_mismatch();
    if mismatch {
        warnings.push(mismatch_warning.clone());
        if let Some(diag) = diag.as_mut() {
            diag.constraints.push(mismatch_warning);
        }
    }

    if opts.verbose {
        println!("Physical cores: {physical_cores}");
        println!("Spawn model: {}", platform::spawn_model());
        println!("Spawn cost: {}", format_time(spawn_cost));
        println!("Dispatch cost: {} per chunk", format_time(dispatch_cost));
    }

    // Rejection: the whole workload is smaller than two worker spawns.
    if let Some(serial_time) = estimated_serial_time {
        if serial_time < spawn_cost * 2.0 {
            if let Some(diag) = diag.as_mut() {
                diag.rejection_reasons.push(format!(
                    "total execution time ({}) is under twice the spawn cost ({})",
                    format_time(serial_time),
                    format_time(spawn_cost * 2.0)
                ));
                diag.rejection_reasons
                    .push("workload too small to amortize pool startup".to_string());
            }
            return Ok(serial_result(
                format!(
                    "total execution time ({}) too short to amortize parallelization overhead",
                    format_time(serial_time)
                ),
                1,
                warnings,
                sampling,
                diag,
            ));
        }
    }

    // Chunk size: amortize dispatch to the target duration, shrink for
    // heterogeneous workloads so stragglers can be balanced, and never
    // exceed a tenth of the input.
    let mut chunksize = ((opts.target_chunk_duration_s / avg_time) as usize).max(1);
    let cv = sampling.coef_var;
    if cv > HETEROGENEITY_CV_THRESHOLD {
        let scale = (1.0 - cv * 0.5).max(0.25);
        chunksize = ((chunksize as f64 * scale) as usize).max(1);
        if opts.verbose {
            println!("Heterogeneous workload (CV={cv:.2}); scaling chunksize down to {chunksize}");
        }
        if let Some(diag) = diag.as_mut() {
            diag.constraints.push(format!(
                "heterogeneous workload (CV={cv:.2}); smaller chunks improve load balance"
            ));
            diag.recommendations.push(format!(
                "chunksize reduced to {chunksize} for better distribution across workers"
            ));
        }
    }
    if let Some(total) = total_known {
        chunksize = chunksize.min((total / 10).max(1));
    }
    if let Some(diag) = diag.as_mut() {
        diag.optimal_chunksize = chunksize;
    }

    // Worker count: physical cores, clamped by per-worker memory, then by
    // internal threading.
    let mut max_workers = physical_cores;
    let mut memory_limited = false;
    if opts.enable_memory_tracking && peak_memory > 0 {
        let fit = (available_memory / peak_memory).max(1) as usize;
        if fit < max_workers {
            max_workers = fit;
            memory_limited = true;
        }
    }
    if memory_limited {
        let constraint = format!(
            "memory constraints limit workers to {max_workers} (physical cores: {physical_cores})"
        );
        warnings.push(constraint.clone());
        if let Some(diag) = diag.as_mut() {
            diag.constraints.push(constraint);
            diag.recommendations
                .push("reduce per-item memory footprint or add RAM to use more workers".to_string());
        }
    }

    if opts.auto_adjust_for_nested_parallelism && estimated_internal_threads > 1 {
        if estimated_internal_threads > physical_cores {
            let warning = format!(
                "internal thread count ({estimated_internal_threads}) exceeds physical cores ({physical_cores})"
            );
            warnings.push(warning.clone());
            if let Some(diag) = diag.as_mut() {
                diag.constraints.push(warning);
            }
        }
        let adjusted = (physical_cores / estimated_internal_threads).max(1);
        if adjusted < max_workers {
            let info = format!(
                "reducing workers from {max_workers} to {adjusted} for {estimated_internal_threads} internal threads per worker"
            );
            warnings.push(info.clone());
            if let Some(diag) = diag.as_mut() {
                diag.constraints.push(info);
            }
            max_workers = adjusted;
        }
    }

    if let Some(diag) = diag.as_mut() {
        diag.max_workers_cpu = physical_cores;
        diag.max_workers_memory = max_workers;
    }

    let n_jobs = max_workers;
    if opts.verbose {
        println!("Optimal n_jobs: {n_jobs}");
        println!("Optimal chunksize: {chunksize}");
    }

    // Predict speedup; unknown-size inputs fall back to a conservative
    // efficiency heuristic because the model needs a total.
    let estimated = match (estimated_serial_time, total_known) {
        (Some(serial_time), Some(total)) if n_jobs > 1 && total > 0 => {
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
            if opts.verbose {
                println!("Estimated speedup: {speedup:.2}x");
            }

            // Marginal-benefit gate.
            if speedup < MIN_SPEEDUP {
                if let Some(diag) = diag.as_mut() {
                    diag.rejection_reasons.push(format!(
                        "estimated speedup ({speedup:.2}x) is below the {MIN_SPEEDUP}x threshold"
                    ));
                    diag.rejection_reasons
                        .push("overhead exceeds the performance gained".to_string());
                }
                warnings.push(
                    "overhead costs make parallelization inefficient for this workload".to_string(),
                );
                let result = serial_result(
                    format!("parallelization provides minimal benefit (estimated speedup: {speedup:.2}x)"),
                    1,
                    warnings,
                    sampling,
                    diag,
                );
                persist_decision(task, opts, total_known, avg_time, &result, DispatcherKind::Map);
                return Ok(result);
            }
            speedup
        }
        _ => {
            let speedup = n_jobs as f64 * UNKNOWN_SIZE_EFFICIENCY;
            if let Some(diag) = diag.as_mut() {
                diag.theoretical_max_speedup = n_jobs as f64;
                diag.estimated_speedup = speedup;
                diag.speedup_efficiency = UNKNOWN_SIZE_EFFICIENCY;
            }
            speedup
        }
    };

    if n_jobs == 1 {
        if let Some(diag) = diag.as_mut() {
            diag.rejection_reasons
                .push("only one worker available under the active constraints".to_string());
        }
        let result = serial_result(
            "serial execution recommended based on resource constraints".to_string(),
            chunksize,
            warnings,
            sampling,
            diag,
        );
        persist_decision(task, opts, total_known, avg_time, &result, DispatcherKind::Map);
        return Ok(result);
    }

    if let Some(diag) = diag.as_mut() {
        diag.recommendations.push(format!(
            "use {n_jobs} workers with chunksize {chunksize} for ~{estimated:.2}x speedup"
        ));
        if diag.speedup_efficiency < 0.5 {
            diag.recommendations
                .push("efficiency is low; weigh whether the pool overhead is acceptable".to_string());
        }
    }

    let result = OptimizationResult {
        n_jobs,
        chunksize,
        reason: format!("parallelization beneficial: {n_jobs} workers with chunks of {chunksize}"),
        estimated_speedup: estimated,
        warnings,
        data: sampling_into_data(sampling),
        profile: diag,
        cache_hit: false,
    };
    persist_decision(task, opts, total_known, avg_time, &result, DispatcherKind::Map);
    Ok(result)
}

/// Time one probe invocation, used only to pick a provisional cache bucket
pub(crate) fn probe_single_call<W: Task + ?Sized>(task: &W, element: &W::Input) -> Option<f64> {
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _ = task.invoke(element);
    }));
    match outcome {
        Ok(()) => Some(start.elapsed().as_secs_f64()),
        // Leave panic reporting to the sampler.
        Err(_) => None,
    }
}

pub(crate) fn populate_sampling_profile<T, R>(
    diag: Option<&mut DiagnosticProfile>,
    sampling: &SamplingResult<T, R>,
) {
    if let Some(diag) = diag {
        diag.avg_exec_time_s = sampling.avg_exec_time_s;
        diag.avg_result_encode_time_s = sampling.avg_result_encode_time_s;
        diag.avg_arg_encode_time_s = sampling.avg_arg_encode_time_s;
        diag.result_size_bytes = sampling.avg_result_size_bytes;
        diag.peak_memory_bytes = sampling.peak_memory_bytes;
        diag.sample_count = sampling.sample_count;
        diag.function_is_encodable = sampling.function_is_encodable;
        diag.coefficient_of_variation = sampling.coef_var;
        diag.is_heterogeneous = sampling.coef_var > HETEROGENEITY_CV_THRESHOLD;
    }
}

fn sampling_into_data<T, R: Iterator<Item = T>>(sampling: SamplingResult<T, R>) -> Reconstructed<T, R> {
    sampling.into_data()
}

fn serial_result<T, R: Iterator<Item = T>>(
    reason: String,
    chunksize: usize,
    warnings: Vec<String>,
    sampling: SamplingResult<T, R>,
    profile: Option<DiagnosticProfile>,
) -> OptimizationResult<T, R> {
    OptimizationResult {
        n_jobs: 1,
        chunksize: chunksize.max(1),
        reason,
        estimated_speedup: 1.0,
        warnings,
        data: sampling.into_data(),
        profile,
        cache_hit: false,
    }
}

/// Store a finished decision under its refined cache key, best-effort
fn persist_decision<W: Task + ?Sized, T, R>(
    task: &W,
    opts: &OptimizeOptions,
    total_items: Option<usize>,
    avg_time_s: f64,
    result: &OptimizationResult<T, R>,
    dispatcher_kind: DispatcherKind,
) {
    if !opts.use_cache {
        return;
    }
    let Some(total) = total_items else {
        // Unknown sizes have no size bucket to key under.
        return;
    };
    let key = fingerprint::cache_key(task, total, avg_time_s);
    let mut entry = CacheEntry::new(
        result.n_jobs,
        result.chunksize,
        dispatcher_kind,
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
