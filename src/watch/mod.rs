//! Workload drift monitoring
//!
//! Recommendations go stale: data distributions shift, machines gain or
//! lose load, dependencies change the task's cost. The watch monitor
//! records a snapshot per re-optimization and reports when the
//! recommendation moved enough to matter. The loop itself (timing,
//! termination, signals) belongs to the caller; this module only keeps
//! the history and judges significance.

use chrono::{DateTime, Utc};

/// Thresholds deciding what counts as a significant change
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Alert when the worker count moves by at least this much
    pub change_threshold_n_jobs: usize,
    /// Alert when the speedup moves by at least this relative fraction
    pub change_threshold_speedup: f64,
    /// Alert when the chunksize moves by at least this relative fraction
    pub change_threshold_chunksize: f64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            change_threshold_n_jobs: 1,
            change_threshold_speedup: 0.2,
            change_threshold_chunksize: 0.5,
        }
    }
}

/// One recorded optimization outcome
#[derive(Debug, Clone)]
pub struct WatchSnapshot {
    pub timestamp: DateTime<Utc>,
    pub iteration: usize,
    pub n_jobs: usize,
    pub chunksize: usize,
    pub estimated_speedup: f64,
    pub reason: String,
}

/// History keeper and drift detector for repeated optimizations
#[derive(Debug)]
pub struct WatchMonitor {
    options: WatchOptions,
    snapshots: Vec<WatchSnapshot>,
}

impl WatchMonitor {
    pub fn new(options: WatchOptions) -> Self {
        Self {
            options,
            snapshots: Vec::new(),
        }
    }

    /// Record one outcome and report significant changes since the last
    ///
    /// The first recording never reports changes (there is no baseline).
    pub fn record(
        &mut self,
        n_jobs: usize,
        chunksize: usize,
        estimated_speedup: f64,
        reason: impl Into<String>,
    ) -> (WatchSnapshot, Vec<String>) {
        let snapshot = WatchSnapshot {
            timestamp: Utc::now(),
            iteration: self.snapshots.len(),
            n_jobs,
            chunksize,
            estimated_speedup,
            reason: reason.into(),
        };
        let changes = match self.snapshots.last() {
            Some(previous) => self.detect_changes(previous, &snapshot),
            None => Vec::new(),
        };
        self.snapshots.push(snapshot.clone());
        (snapshot, changes)
    }

    /// All snapshots recorded so far, oldest first
    pub fn snapshots(&self) -> &[WatchSnapshot] {
        &self.snapshots
    }

    fn detect_changes(&self, prev: &WatchSnapshot, curr: &WatchSnapshot) -> Vec<String> {
        let mut changes = Vec::new();

        let jobs_delta = curr.n_jobs.abs_diff(prev.n_jobs);
        if jobs_delta >= self.options.change_threshold_n_jobs && jobs_delta > 0 {
            changes.push(format!(
                "n_jobs changed: {} -> {} (delta {})",
                prev.n_jobs, curr.n_jobs, jobs_delta
            ));
        }

        let speedup_base = prev.estimated_speedup.max(0.01);
        let speedup_ratio = (curr.estimated_speedup - prev.estimated_speedup).abs() / speedup_base;
        if speedup_ratio >= self.options.change_threshold_speedup {
            changes.push(format!(
                "speedup changed: {:.2}x -> {:.2}x ({:.1}% change)",
                prev.estimated_speedup,
                curr.estimated_speedup,
                speedup_ratio * 100.0
            ));
        }

        if prev.chunksize > 0 {
            let chunk_ratio =
                curr.chunksize.abs_diff(prev.chunksize) as f64 / prev.chunksize as f64;
            if chunk_ratio >= self.options.change_threshold_chunksize {
                changes.push(format!(
                    "chunksize changed: {} -> {} ({:.0}% change)",
                    prev.chunksize,
                    curr.chunksize,
                    chunk_ratio * 100.0
                ));
            }
        }

        changes
    }
}
