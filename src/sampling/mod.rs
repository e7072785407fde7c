//! Dry-run sampling
//!
//! The sampler executes the task on a small prefix of the input, in the
//! caller's thread, and measures everything the cost model and decision
//! engine need: per-call wall time and its variance, serialization time and
//! size in both directions, memory growth, CPU-to-wall ratio, and whether
//! the task and its elements can cross a process boundary at all.
//!
//! Sampling is deliberately unparallelized so the measured per-item cost is
//! the true serial baseline. Consumed elements are never lost: the returned
//! result carries the prefix and the unconsumed tail, and
//! [`SamplingResult::into_data`] chains them back together. Callers handed
//! a reconstructed iterator must consume it instead of their original
//! input.
//!
//! The sampler never fails visibly. Panics from the task, unserializable
//! values, and platform probe failures are all captured in the result.

pub mod nested;
pub mod resource;
pub mod welford;

use crate::task::Task;
use nested::ThreadActivity;
use resource::{process_cpu_time_s, MemoryTracker};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use welford::Welford;

/// Default number of elements consumed by a dry run
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Classification of a workload by CPU utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// ≥ 70% of wall time is CPU time
    CpuBound,
    /// < 30% of wall time is CPU time
    IoBound,
    /// Between the two thresholds
    Mixed,
}

impl WorkloadKind {
    /// Classify from a CPU-to-wall-clock ratio
    pub fn classify(cpu_time_ratio: f64) -> Self {
        if cpu_time_ratio >= 0.7 {
            WorkloadKind::CpuBound
        } else if cpu_time_ratio >= 0.3 {
            WorkloadKind::Mixed
        } else {
            WorkloadKind::IoBound
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::CpuBound => write!(f, "cpu_bound"),
            WorkloadKind::IoBound => write!(f, "io_bound"),
            WorkloadKind::Mixed => write!(f, "mixed"),
        }
    }
}

/// Options controlling a dry run
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Number of elements to consume (k)
    pub sample_size: usize,
    /// Track RSS growth during sampled calls
    pub enable_memory_tracking: bool,
    /// Collect per-call wall/CPU time detail alongside the aggregates
    pub enable_function_profiling: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            enable_memory_tracking: true,
            enable_function_profiling: false,
        }
    }
}

/// Per-call timing detail collected when function profiling is enabled
#[derive(Debug, Clone, Default, Serialize)]
pub struct FunctionProfile {
    /// Wall-clock seconds per sampled call, in call order
    pub call_wall_times_s: Vec<f64>,
    /// CPU seconds per sampled call, in call order (0 when unavailable)
    pub call_cpu_times_s: Vec<f64>,
}

/// Iterator that yields the consumed sample prefix, then the unconsumed tail
///
/// This is what callers receive as `data` on an optimization result; it
/// replays the exact original sequence even when the input was a
/// single-shot iterator.
#[derive(Debug)]
pub struct Reconstructed<T, R> {
    prefix: std::vec::IntoIter<T>,
    rest: Option<R>,
}

impl<T, R> Reconstructed<T, R> {
    /// Chain a consumed prefix back onto the remaining input
    pub fn new(prefix: Vec<T>, rest: Option<R>) -> Self {
        Self {
            prefix: prefix.into_iter(),
            rest,
        }
    }
}

impl<T, R: Iterator<Item = T>> Iterator for Reconstructed<T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.prefix.next().or_else(|| self.rest.as_mut()?.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (prefix_len, _) = self.prefix.size_hint();
        match &self.rest {
            Some(rest) => {
                let (lo, hi) = rest.size_hint();
                (prefix_len + lo, hi.map(|h| prefix_len + h))
            }
            None => (prefix_len, Some(prefix_len)),
        }
    }
}

/// Input split into a materialized prefix and the unconsumed tail
#[derive(Debug)]
pub struct SplitInput<T, R> {
    pub prefix: Vec<T>,
    pub rest: Option<R>,
    /// True when the input's length was not known up front
    pub is_generator: bool,
    /// Exact total length when known
    pub total_items: Option<usize>,
    /// Set when drawing the prefix itself failed
    pub error: Option<String>,
}

/// Draw the first `k` elements, keeping the tail intact
///
/// Length knowledge comes from `size_hint`: exact hints (vectors, slices,
/// ranges) yield `total_items`; anything else is treated as a single-shot
/// generator. A panicking iterator is caught and reported via `error`.
pub fn split_input<I>(data: I, k: usize) -> SplitInput<I::Item, I::IntoIter>
where
    I: IntoIterator,
{
    let mut iter = data.into_iter();
    let (lower, upper) = iter.size_hint();
    let exact = upper == Some(lower);

    let drawn = catch_unwind(AssertUnwindSafe(move || {
        let mut prefix = Vec::with_capacity(k.min(lower.max(1)));
        for _ in 0..k {
            match iter.next() {
                Some(item) => prefix.push(item),
                None => break,
            }
        }
        (prefix, iter)
    }));

    match drawn {
        Ok((prefix, rest)) => SplitInput {
            prefix,
            rest: Some(rest),
            is_generator: !exact,
            total_items: exact.then_some(lower),
            error: None,
        },
        Err(payload) => SplitInput {
            prefix: Vec::new(),
            rest: None,
            is_generator: !exact,
            total_items: exact.then_some(lower),
            error: Some(format!("input iterator panicked: {}", panic_message(&payload))),
        },
    }
}

/// Output of one dry run
///
/// All aggregates are zero when `error` is set; the sample and tail are
/// still carried so no caller data is lost.
#[derive(Debug)]
pub struct SamplingResult<T, R> {
    pub avg_exec_time_s: f64,
    pub exec_time_variance_s2: f64,
    pub coef_var: f64,
    pub avg_result_encode_time_s: f64,
    pub avg_arg_encode_time_s: f64,
    pub avg_result_size_bytes: u64,
    pub avg_arg_size_bytes: u64,
    pub peak_memory_bytes: u64,
    pub sample_count: usize,
    pub is_generator: bool,
    pub function_is_encodable: bool,
    pub args_are_encodable: bool,
    pub first_unencodable_index: Option<usize>,
    pub encode_error: Option<String>,
    pub cpu_time_ratio: f64,
    pub workload_kind: WorkloadKind,
    pub nested_parallelism_detected: bool,
    pub detected_parallel_libraries: Vec<String>,
    pub thread_count_delta: i64,
    /// Exact input length when known
    pub total_items: Option<usize>,
    /// Per-call profile when profiling was enabled
    pub function_profile: Option<FunctionProfile>,
    /// Elements consumed by the dry run, in input order
    pub sample: Vec<T>,
    /// Unconsumed tail of the input
    pub remaining: Option<R>,
    /// Why sampling failed, if it did
    pub error: Option<String>,
}

impl<T, R: Iterator<Item = T>> SamplingResult<T, R> {
    /// Rebuild the full input sequence: sample prefix, then the tail
    pub fn into_data(self) -> Reconstructed<T, R> {
        Reconstructed::new(self.sample, self.remaining)
    }
}

/// Run a dry run over the first `opts.sample_size` elements of `data`
pub fn sample<W, I>(
    task: &W,
    data: I,
    opts: &SampleOptions,
) -> SamplingResult<W::Input, I::IntoIter>
where
    W: Task + ?Sized,
    I: IntoIterator<Item = W::Input>,
{
    let split = split_input(data, opts.sample_size.max(1));
    sample_split(task, split, opts)
}

/// Run a dry run over an already-split input
///
/// The decision engine uses this directly so it can consult the decision
/// cache between splitting and full measurement.
pub fn sample_split<W, R>(
    task: &W,
    split: SplitInput<W::Input, R>,
    opts: &SampleOptions,
) -> SamplingResult<W::Input, R>
where
    W: Task + ?Sized,
    R: Iterator<Item = W::Input>,
{
    let function_encoding = task.encode_task();
    let function_is_encodable = function_encoding.is_ok();

    let SplitInput {
        prefix,
        rest,
        is_generator,
        total_items,
        error: split_error,
    } = split;

    if let Some(message) = split_error {
        return failed_result(prefix, rest, is_generator, total_items, function_is_encodable, message);
    }
    if prefix.is_empty() {
        return failed_result(
            prefix,
            rest,
            is_generator,
            total_items,
            function_is_encodable,
            "empty data sample".to_string(),
        );
    }

    // Argument encodability and cost, measured in one pass. Timing and size
    // are recorded per element; the first failure stops the scan.
    let mut args_are_encodable = true;
    let mut first_unencodable_index = None;
    let mut encode_error = match &function_encoding {
        Err(e) => Some(e.to_string()),
        Ok(_) => None,
    };
    let mut arg_time_sum = 0.0f64;
    let mut arg_size_sum = 0u64;
    let mut arg_measured = 0usize;
    for (idx, item) in prefix.iter().enumerate() {
        let start = Instant::now();
        match task.encode_input(item) {
            Ok(bytes) => {
                arg_time_sum += start.elapsed().as_secs_f64();
                arg_size_sum += bytes.len() as u64;
                arg_measured += 1;
            }
            Err(e) => {
                args_are_encodable = false;
                first_unencodable_index = Some(idx);
                encode_error = Some(e.to_string());
                arg_time_sum = 0.0;
                arg_size_sum = 0;
                arg_measured = 0;
                break;
            }
        }
    }

    // Nested parallelism probe, suppressed in test harnesses.
    let (libraries, activity, nested) = if nested::testing_mode() {
        (Vec::new(), ThreadActivity::default(), false)
    } else {
        let libraries = nested::detect_parallel_libraries();
        let env_vars = nested::parallel_environment_vars();
        let activity = nested::detect_thread_activity(task, &prefix[0]);
        let nested = nested::nested_parallelism_detected(&libraries, &env_vars, &activity);
        (libraries, activity, nested)
    };

    // Main measurement loop, specialized on the profiling flag so the hot
    // path carries no per-iteration branch.
    let loop_outcome = if opts.enable_function_profiling {
        sampling_loop_profiled(task, &prefix, opts.enable_memory_tracking)
    } else {
        sampling_loop_plain(task, &prefix, opts.enable_memory_tracking)
    };

    let measurements = match loop_outcome {
        Ok(m) => m,
        Err(message) => {
            let mut result = failed_result(
                prefix,
                rest,
                is_generator,
                total_items,
                function_is_encodable,
                message,
            );
            result.args_are_encodable = args_are_encodable;
            result.first_unencodable_index = first_unencodable_index;
            result.encode_error = encode_error;
            result.nested_parallelism_detected = nested;
            result.detected_parallel_libraries = libraries;
            result.thread_count_delta = activity.delta;
            return result;
        }
    };

    // Averages as sum * (1/n): one division, n multiplies.
    let n = prefix.len();
    let inv_n = 1.0 / n as f64;
    let cpu_time_ratio = if measurements.wall_total_s > 0.0 && measurements.cpu_available {
        measurements.cpu_total_s / measurements.wall_total_s
    } else {
        1.0
    };

    SamplingResult {
        avg_exec_time_s: measurements.exec_times.mean(),
        exec_time_variance_s2: measurements.exec_times.variance(),
        coef_var: measurements.exec_times.coefficient_of_variation(),
        avg_result_encode_time_s: measurements.result_time_sum * inv_n,
        avg_arg_encode_time_s: if arg_measured > 0 {
            arg_time_sum / arg_measured as f64
        } else {
            0.0
        },
        avg_result_size_bytes: (measurements.result_size_sum as f64 * inv_n) as u64,
        avg_arg_size_bytes: if arg_measured > 0 {
            arg_size_sum / arg_measured as u64
        } else {
            0
        },
        peak_memory_bytes: measurements.peak_memory_bytes,
        sample_count: n,
        is_generator,
        function_is_encodable,
        args_are_encodable,
        first_unencodable_index,
        encode_error,
        cpu_time_ratio,
        workload_kind: WorkloadKind::classify(cpu_time_ratio),
        nested_parallelism_detected: nested,
        detected_parallel_libraries: libraries,
        thread_count_delta: activity.delta,
        total_items,
        function_profile: measurements.profile,
        sample: prefix,
        remaining: rest,
        error: None,
    }
}

struct LoopMeasurements {
    exec_times: Welford,
    result_time_sum: f64,
    result_size_sum: u64,
    wall_total_s: f64,
    cpu_total_s: f64,
    cpu_available: bool,
    peak_memory_bytes: u64,
    profile: Option<FunctionProfile>,
}

fn sampling_loop_plain<W: Task + ?Sized>(
    task: &W,
    prefix: &[W::Input],
    track_memory: bool,
) -> Result<LoopMeasurements, String> {
    let mut tracker = track_memory.then(MemoryTracker::start);
    let mut exec_times = Welford::new();
    let mut result_time_sum = 0.0f64;
    let mut result_size_sum = 0u64;
    let mut wall_total = 0.0f64;
    let mut cpu_total = 0.0f64;
    let mut cpu_available = true;

    for item in prefix {
        let cpu_before = process_cpu_time_s();
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| task.invoke(item)));
        let wall = start.elapsed().as_secs_f64();
        let output = match outcome {
            Ok(output) => output,
            // Partial statistics are discarded; the tracker dies with this
            // scope, so memory tracking is closed on this path too.
            Err(payload) => {
                return Err(format!("task panicked: {}", panic_message(&payload)));
            }
        };
        match (cpu_before, process_cpu_time_s()) {
            (Some(before), Some(after)) => cpu_total += (after - before).max(0.0),
            _ => cpu_available = false,
        }
        exec_times.push(wall);
        wall_total += wall;

        let encode_start = Instant::now();
        match task.encode_output(&output) {
            Ok(bytes) => {
                result_time_sum += encode_start.elapsed().as_secs_f64();
                result_size_sum += bytes.len() as u64;
            }
            // Shallow size stands in when the output refuses to encode.
            Err(_) => result_size_sum += std::mem::size_of_val(&output) as u64,
        }

        if let Some(tracker) = tracker.as_mut() {
            tracker.sample();
        }
    }

    Ok(LoopMeasurements {
        exec_times,
        result_time_sum,
        result_size_sum,
        wall_total_s: wall_total,
        cpu_total_s: cpu_total,
        cpu_available,
        peak_memory_bytes: tracker.map(|t| t.peak_growth_bytes()).unwrap_or(0),
        profile: None,
    })
}

fn sampling_loop_profiled<W: Task + ?Sized>(
    task: &W,
    prefix: &[W::Input],
    track_memory: bool,
) -> Result<LoopMeasurements, String> {
    let mut tracker = track_memory.then(MemoryTracker::start);
    let mut exec_times = Welford::new();
    let mut result_time_sum = 0.0f64;
    let mut result_size_sum = 0u64;
    let mut wall_total = 0.0f64;
    let mut cpu_total = 0.0f64;
    let mut cpu_available = true;
    let mut profile = FunctionProfile {
        call_wall_times_s: Vec::with_capacity(prefix.len()),
        call_cpu_times_s: Vec::with_capacity(prefix.len()),
    };

    for item in prefix {
        let cpu_before = process_cpu_time_s();
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| task.invoke(item)));
        let wall = start.elapsed().as_secs_f64();
        let output = match outcome {
            Ok(output) => output,
            Err(payload) => {
                return Err(format!("task panicked: {}", panic_message(&payload)));
            }
        };
        let call_cpu = match (cpu_before, process_cpu_time_s()) {
            (Some(before), Some(after)) => (after - before).max(0.0),
            _ => {
                cpu_available = false;
                0.0
            }
        };
        cpu_total += call_cpu;
        exec_times.push(wall);
        wall_total += wall;
        profile.call_wall_times_s.push(wall);
        profile.call_cpu_times_s.push(call_cpu);

        let encode_start = Instant::now();
        match task.encode_output(&output) {
            Ok(bytes) => {
                result_time_sum += encode_start.elapsed().as_secs_f64();
                result_size_sum += bytes.len() as u64;
            }
            Err(_) => result_size_sum += std::mem::size_of_val(&output) as u64,
        }

        if let Some(tracker) = tracker.as_mut() {
            tracker.sample();
        }
    }

    Ok(LoopMeasurements {
        exec_times,
        result_time_sum,
        result_size_sum,
        wall_total_s: wall_total,
        cpu_total_s: cpu_total,
        cpu_available,
        peak_memory_bytes: tracker.map(|t| t.peak_growth_bytes()).unwrap_or(0),
        profile: Some(profile),
    })
}

fn failed_result<T, R>(
    sample: Vec<T>,
    remaining: Option<R>,
    is_generator: bool,
    total_items: Option<usize>,
    function_is_encodable: bool,
    message: String,
) -> SamplingResult<T, R> {
    let sample_count = sample.len();
    SamplingResult {
        avg_exec_time_s: 0.0,
        exec_time_variance_s2: 0.0,
        coef_var: 0.0,
        avg_result_encode_time_s: 0.0,
        avg_arg_encode_time_s: 0.0,
        avg_result_size_bytes: 0,
        avg_arg_size_bytes: 0,
        peak_memory_bytes: 0,
        sample_count,
        is_generator,
        function_is_encodable,
        args_are_encodable: true,
        first_unencodable_index: None,
        encode_error: None,
        cpu_time_ratio: 1.0,
        workload_kind: WorkloadKind::CpuBound,
        nested_parallelism_detected: false,
        detected_parallel_libraries: Vec::new(),
        thread_count_delta: 0,
        total_items,
        function_profile: None,
        sample,
        remaining,
        error: Some(message),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;

    use crate::testenv::EnvGuard;

    fn testing_guard() -> EnvGuard {
        EnvGuard::testing()
    }

    #[test]
    fn test_sample_basic_measurements() {
        let _guard = testing_guard();
        let task = FnTask::new("square", |x: &u64| x * x);
        let data: Vec<u64> = (0..100).collect();
        let result = sample(&task, data, &SampleOptions::default());

        assert!(result.error.is_none());
        assert_eq!(result.sample_count, 5);
        assert_eq!(result.sample, vec![0, 1, 2, 3, 4]);
        assert_eq!(result.total_items, Some(100));
        assert!(!result.is_generator);
        assert!(result.function_is_encodable);
        assert!(result.args_are_encodable);
        assert!(result.avg_exec_time_s >= 0.0);
        assert!(result.avg_arg_size_bytes > 0);
        assert!(result.avg_result_size_bytes > 0);
    }

    #[test]
    fn test_reconstructed_preserves_order() {
        let _guard = testing_guard();
        let task = FnTask::new("identity", |x: &u32| *x);
        // A filtered iterator reports an inexact size hint, so it is
        // treated as a single-shot generator.
        let data = (0..20u32).filter(|x| x % 2 == 0);
        let result = sample(&task, data, &SampleOptions::default());

        assert!(result.is_generator);
        assert_eq!(result.total_items, None);
        let replayed: Vec<u32> = result.into_data().collect();
        assert_eq!(replayed, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
    }

    #[test]
    fn test_empty_input_sets_error() {
        let _guard = testing_guard();
        let task = FnTask::new("noop", |x: &u64| *x);
        let result = sample(&task, Vec::<u64>::new(), &SampleOptions::default());

        assert_eq!(result.sample_count, 0);
        assert!(result.error.as_deref().unwrap().contains("empty"));
        assert_eq!(result.avg_exec_time_s, 0.0);
        assert_eq!(result.avg_result_size_bytes, 0);
    }

    #[test]
    fn test_sample_larger_than_input() {
        let _guard = testing_guard();
        let task = FnTask::new("inc", |x: &u64| x + 1);
        let data = vec![1u64, 2, 3];
        let opts = SampleOptions {
            sample_size: 50,
            ..Default::default()
        };
        let result = sample(&task, data, &opts);

        assert!(result.error.is_none());
        assert_eq!(result.sample_count, 3);
        let replayed: Vec<u64> = result.into_data().collect();
        assert_eq!(replayed, vec![1, 2, 3]);
    }

    #[test]
    fn test_panicking_task_is_captured() {
        let _guard = testing_guard();
        let task = FnTask::new("explodes", |x: &u64| {
            if *x >= 2 {
                panic!("element {x} is poisonous");
            }
            *x
        });
        let data: Vec<u64> = (0..10).collect();
        let result = sample(&task, data, &SampleOptions::default());

        let message = result.error.as_deref().unwrap();
        assert!(message.contains("panicked"));
        assert!(message.contains("poisonous"));
        // Partial aggregates are discarded.
        assert_eq!(result.avg_exec_time_s, 0.0);
        // The sample and tail are still intact for reconstruction.
        let replayed: Vec<u64> = result.into_data().collect();
        assert_eq!(replayed, (0..10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_unencodable_argument_is_flagged() {
        let _guard = testing_guard();

        struct LockTask;
        impl Task for LockTask {
            type Input = u32;
            type Output = u32;
            fn invoke(&self, input: &u32) -> u32 {
                *input
            }
            fn stable_identity(&self) -> Vec<u8> {
                b"lock-task".to_vec()
            }
            fn encode_task(&self) -> Result<Vec<u8>, crate::task::WireError> {
                Ok(b"lock-task".to_vec())
            }
            fn encode_input(&self, input: &u32) -> Result<Vec<u8>, crate::task::WireError> {
                if *input == 2 {
                    Err(crate::task::WireError::Encode(
                        "element holds a lock".to_string(),
                    ))
                } else {
                    crate::task::encode_wire(input)
                }
            }
            fn encode_output(&self, output: &u32) -> Result<Vec<u8>, crate::task::WireError> {
                crate::task::encode_wire(output)
            }
        }

        let result = sample(&LockTask, vec![0u32, 1, 2, 3, 4], &SampleOptions::default());
        assert!(result.error.is_none());
        assert!(!result.args_are_encodable);
        assert_eq!(result.first_unencodable_index, Some(2));
        assert!(result.encode_error.as_deref().unwrap().contains("lock"));
        // Argument measurements are discarded on failure.
        assert_eq!(result.avg_arg_size_bytes, 0);
    }

    #[test]
    fn test_anonymous_task_not_encodable() {
        let _guard = testing_guard();
        let task = FnTask::anonymous(|x: &u64| x + 1);
        let result = sample(&task, vec![1u64, 2, 3], &SampleOptions::default());
        assert!(!result.function_is_encodable);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_memory_tracking_disabled_reports_zero() {
        let _guard = testing_guard();
        let task = FnTask::new("allocates", |n: &u64| vec![0u8; *n as usize]);
        let opts = SampleOptions {
            enable_memory_tracking: false,
            ..Default::default()
        };
        let result = sample(&task, vec![1024u64; 5], &opts);
        assert_eq!(result.peak_memory_bytes, 0);
    }

    #[test]
    fn test_function_profile_collected() {
        let _guard = testing_guard();
        let task = FnTask::new("profiled", |x: &u64| x * 2);
        let opts = SampleOptions {
            enable_function_profiling: true,
            ..Default::default()
        };
        let result = sample(&task, (0..10u64).collect::<Vec<_>>(), &opts);
        let profile = result.function_profile.expect("profile requested");
        assert_eq!(profile.call_wall_times_s.len(), 5);
        assert_eq!(profile.call_cpu_times_s.len(), 5);
    }

    #[test]
    fn test_workload_kind_classification() {
        assert_eq!(WorkloadKind::classify(0.95), WorkloadKind::CpuBound);
        assert_eq!(WorkloadKind::classify(0.7), WorkloadKind::CpuBound);
        assert_eq!(WorkloadKind::classify(0.5), WorkloadKind::Mixed);
        assert_eq!(WorkloadKind::classify(0.3), WorkloadKind::Mixed);
        assert_eq!(WorkloadKind::classify(0.1), WorkloadKind::IoBound);
    }

    #[test]
    fn test_io_bound_detection() {
        let _guard = testing_guard();
        let task = FnTask::new("sleeper", |_: &u64| {
            std::thread::sleep(std::time::Duration::from_millis(5));
            0u64
        });
        let result = sample(&task, vec![0u64; 3], &SampleOptions::default());
        // Sleeping burns wall time but almost no CPU; off Linux the ratio
        // defaults to 1.0, so only assert when CPU time was measurable.
        if resource::process_cpu_time_s().is_some() {
            assert_eq!(result.workload_kind, WorkloadKind::IoBound);
        }
    }
}
