//! Parallel execution cost model
//!
//! A refined Amdahl-style model that prices the three overheads a process
//! pool pays on top of the computation itself: spawning workers, moving
//! arguments and results across the process boundary, and dispatching
//! chunks through the task queue. Every speedup number shown anywhere in
//! Amorsize comes from this function; nothing else estimates performance.
//!
//! The model is pure: same inputs, same answer, no probing, no I/O.

/// Inputs to one speedup prediction
#[derive(Debug, Clone, Copy)]
pub struct CostInputs {
    /// Total serial computation time for the whole workload (seconds)
    pub total_compute_s: f64,
    /// Time to serialize one result for return from a worker (seconds)
    pub per_item_result_encode_s: f64,
    /// Time to serialize one argument for transfer to a worker (seconds)
    pub per_item_arg_encode_s: f64,
    /// One-time cost to start a single worker (seconds)
    pub spawn_s: f64,
    /// Queue overhead per chunk handed out (seconds)
    pub dispatch_per_chunk_s: f64,
    /// Worker count
    pub n_jobs: usize,
    /// Items per chunk
    pub chunksize: usize,
    /// Total items in the workload
    pub total_items: usize,
}

/// Additive breakdown of predicted parallel wall-clock time
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CostBreakdown {
    pub spawn_total_s: f64,
    pub parallel_compute_s: f64,
    pub ipc_total_s: f64,
    pub dispatch_total_s: f64,
    pub parallel_time_s: f64,
}

/// Decompose the predicted parallel time into its overhead terms
pub fn cost_breakdown(inputs: &CostInputs) -> CostBreakdown {
    if inputs.n_jobs == 0 {
        return CostBreakdown::default();
    }
    let spawn_total_s = inputs.spawn_s * inputs.n_jobs as f64;
    let parallel_compute_s = inputs.total_compute_s / inputs.n_jobs as f64;
    // Both directions of the serialization tax count: arguments out,
    // results back.
    let ipc_total_s =
        (inputs.per_item_arg_encode_s + inputs.per_item_result_encode_s) * inputs.total_items as f64;
    let num_chunks = num_chunks(inputs.total_items, inputs.chunksize);
    let dispatch_total_s = inputs.dispatch_per_chunk_s * num_chunks as f64;
    CostBreakdown {
        spawn_total_s,
        parallel_compute_s,
        ipc_total_s,
        dispatch_total_s,
        parallel_time_s: spawn_total_s + parallel_compute_s + ipc_total_s + dispatch_total_s,
    }
}

/// Predict the speedup of a parallel configuration over serial execution
///
/// The raw serial/parallel ratio is clamped to `n_jobs` silently; it can
/// only exceed that bound when overhead terms were measured as negative
/// through clock skew. Ratios below 1.0 mean the configuration is slower
/// than serial; the decision engine's marginal-benefit gate maps those to
/// a serial recommendation. Degenerate inputs (no workers, no compute,
/// zero predicted parallel time) answer 1.0.
pub fn estimate_speedup(inputs: &CostInputs) -> f64 {
    if inputs.n_jobs == 0 || inputs.total_compute_s <= 0.0 {
        return 1.0;
    }
    let breakdown = cost_breakdown(inputs);
    if breakdown.parallel_time_s <= 0.0 {
        return 1.0;
    }
    let speedup = inputs.total_compute_s / breakdown.parallel_time_s;
    speedup.min(inputs.n_jobs as f64)
}

/// Number of chunks a workload splits into (ceiling division, at least 1)
pub fn num_chunks(total_items: usize, chunksize: usize) -> usize {
    if total_items == 0 || chunksize == 0 {
        return 1;
    }
    total_items.div_ceil(chunksize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> CostInputs {
        CostInputs {
            total_compute_s: 100.0,
            per_item_result_encode_s: 0.0001,
            per_item_arg_encode_s: 0.0001,
            spawn_s: 0.005,
            dispatch_per_chunk_s: 0.0002,
            n_jobs: 4,
            chunksize: 50,
            total_items: 1000,
        }
    }

    #[test]
    fn test_speedup_bounded_by_n_jobs() {
        let inputs = base_inputs();
        let speedup = estimate_speedup(&inputs);
        assert!(speedup <= inputs.n_jobs as f64);
        assert!(speedup > 1.0);
    }

    #[test]
    fn test_speedup_strictly_below_n_with_overhead() {
        let inputs = base_inputs();
        // All overhead terms are positive, so the ideal N is unreachable.
        assert!(estimate_speedup(&inputs) < inputs.n_jobs as f64);
    }

    #[test]
    fn test_zero_compute_gives_unity() {
        let inputs = CostInputs {
            total_compute_s: 0.0,
            ..base_inputs()
        };
        assert_eq!(estimate_speedup(&inputs), 1.0);
    }

    #[test]
    fn test_zero_workers_gives_unity() {
        let inputs = CostInputs {
            n_jobs: 0,
            ..base_inputs()
        };
        assert_eq!(estimate_speedup(&inputs), 1.0);
    }

    #[test]
    fn test_monotone_in_compute_time() {
        let mut prev = 0.0;
        for compute in [0.5, 1.0, 10.0, 100.0, 1000.0] {
            let inputs = CostInputs {
                total_compute_s: compute,
                ..base_inputs()
            };
            let speedup = estimate_speedup(&inputs);
            assert!(
                speedup >= prev,
                "speedup must not decrease as compute grows: {speedup} < {prev}"
            );
            prev = speedup;
        }
    }

    #[test]
    fn test_heavy_overhead_predicts_no_gain() {
        let inputs = CostInputs {
            total_compute_s: 0.01,
            per_item_result_encode_s: 0.01,
            per_item_arg_encode_s: 0.01,
            spawn_s: 0.15,
            dispatch_per_chunk_s: 0.001,
            n_jobs: 8,
            chunksize: 1,
            total_items: 100,
        };
        let speedup = estimate_speedup(&inputs);
        assert!(speedup < 1.2);
    }

    #[test]
    fn test_breakdown_sums_to_parallel_time() {
        let inputs = base_inputs();
        let b = cost_breakdown(&inputs);
        let sum = b.spawn_total_s + b.parallel_compute_s + b.ipc_total_s + b.dispatch_total_s;
        assert!((sum - b.parallel_time_s).abs() < 1e-12);
    }

    #[test]
    fn test_num_chunks() {
        assert_eq!(num_chunks(1000, 50), 20);
        assert_eq!(num_chunks(1001, 50), 21);
        assert_eq!(num_chunks(1, 50), 1);
        assert_eq!(num_chunks(0, 50), 1);
        assert_eq!(num_chunks(10, 0), 1);
    }

    #[test]
    fn test_ipc_counts_both_directions() {
        let one_way = CostInputs {
            per_item_arg_encode_s: 0.0,
            ..base_inputs()
        };
        let both = base_inputs();
        assert!(cost_breakdown(&both).ipc_total_s > cost_breakdown(&one_way).ipc_total_s);
    }
}
