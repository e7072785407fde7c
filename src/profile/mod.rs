//! Diagnostic profiling of optimization decisions
//!
//! When profiling is enabled, the decision engines record every factor that
//! influenced the recommendation: what the dry run observed, what the
//! platform probe reported, which constraints bit, which gates rejected
//! parallelism, and how the predicted overhead splits up. `explain()`
//! renders the whole derivation as a human-readable report.
//!
//! A profile is mutated only while one engine invocation runs, then frozen
//! inside the returned result.

use serde::Serialize;

/// Everything that went into one optimization decision
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticProfile {
    // Sampling observations
    pub avg_exec_time_s: f64,
    pub avg_result_encode_time_s: f64,
    pub avg_arg_encode_time_s: f64,
    pub result_size_bytes: u64,
    pub peak_memory_bytes: u64,
    pub sample_count: usize,
    pub function_is_encodable: bool,
    pub coefficient_of_variation: f64,
    pub is_heterogeneous: bool,

    // Platform facts
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub spawn_cost_s: f64,
    pub chunk_dispatch_cost_s: f64,
    pub available_memory_bytes: u64,
    pub spawn_model: String,

    // Workload sizing
    pub total_items: Option<usize>,
    pub estimated_serial_time_s: f64,
    pub estimated_result_memory_bytes: u64,

    // Decision factors
    pub max_workers_cpu: usize,
    pub max_workers_memory: usize,
    pub optimal_chunksize: usize,
    pub target_chunk_duration_s: f64,

    // Overhead breakdown for the recommended configuration
    pub overhead_spawn_s: f64,
    pub overhead_ipc_s: f64,
    pub overhead_dispatch_s: f64,
    pub parallel_compute_time_s: f64,

    // Speedup analysis
    pub theoretical_max_speedup: f64,
    pub estimated_speedup: f64,
    pub speedup_efficiency: f64,

    // Decision path
    pub rejection_reasons: Vec<String>,
    pub constraints: Vec<String>,
    pub recommendations: Vec<String>,
}

impl DiagnosticProfile {
    /// Fresh profile with neutral values
    pub fn new() -> Self {
        Self {
            theoretical_max_speedup: 1.0,
            estimated_speedup: 1.0,
            speedup_efficiency: 1.0,
            ..Default::default()
        }
    }

    /// Overhead components as percentages of total overhead
    ///
    /// Returns (spawn, ipc, dispatch); all zero when there is no overhead.
    pub fn overhead_breakdown_percent(&self) -> (f64, f64, f64) {
        let total = self.overhead_spawn_s + self.overhead_ipc_s + self.overhead_dispatch_s;
        if total <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        (
            self.overhead_spawn_s / total * 100.0,
            self.overhead_ipc_s / total * 100.0,
            self.overhead_dispatch_s / total * 100.0,
        )
    }

    /// Render the full decision derivation as a multi-section report
    pub fn explain(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let rule = "=".repeat(70);
        let thin = "-".repeat(70);

        lines.push(rule.clone());
        lines.push("AMORSIZE DIAGNOSTIC PROFILE".to_string());
        lines.push(rule.clone());

        lines.push(String::new());
        lines.push("[1] WORKLOAD ANALYSIS".to_string());
        lines.push(thin.clone());
        lines.push(format!(
            "  Task execution time:      {} per item",
            format_time(self.avg_exec_time_s)
        ));
        lines.push(format!(
            "  Serialization overhead:   {} per item (args {} + results {})",
            format_time(self.avg_arg_encode_time_s + self.avg_result_encode_time_s),
            format_time(self.avg_arg_encode_time_s),
            format_time(self.avg_result_encode_time_s)
        ));
        lines.push(format!(
            "  Result size:              {}",
            format_bytes(self.result_size_bytes)
        ));
        lines.push(format!(
            "  Peak memory per call:     {}",
            format_bytes(self.peak_memory_bytes)
        ));
        if self.coefficient_of_variation > 0.0 {
            lines.push(format!(
                "  Workload variability:     CV={:.2} ({})",
                self.coefficient_of_variation,
                if self.is_heterogeneous {
                    "heterogeneous"
                } else {
                    "homogeneous"
                }
            ));
        }
        lines.push(format!(
            "  Total items to process:   {}",
            match self.total_items {
                Some(n) => n.to_string(),
                None => "unknown".to_string(),
            }
        ));
        if self.estimated_serial_time_s > 0.0 {
            lines.push(format!(
                "  Estimated serial time:    {}",
                format_time(self.estimated_serial_time_s)
            ));
        }
        if self.estimated_result_memory_bytes > 0 {
            lines.push(format!(
                "  Total result memory:      {}",
                format_bytes(self.estimated_result_memory_bytes)
            ));
        }

        lines.push(String::new());
        lines.push("[2] SYSTEM RESOURCES".to_string());
        lines.push(thin.clone());
        lines.push(format!("  Physical CPU cores:       {}", self.physical_cores));
        lines.push(format!("  Logical CPU cores:        {}", self.logical_cores));
        lines.push(format!(
            "  Available memory:         {}",
            format_bytes(self.available_memory_bytes)
        ));
        lines.push(format!("  Spawn model:              {}", self.spawn_model));
        lines.push(format!(
            "  Worker spawn cost:        {} per worker",
            format_time(self.spawn_cost_s)
        ));
        lines.push(format!(
            "  Chunk dispatch cost:      {} per chunk",
            format_time(self.chunk_dispatch_cost_s)
        ));

        lines.push(String::new());
        lines.push("[3] OPTIMIZATION DECISION".to_string());
        lines.push(thin.clone());
        lines.push(format!("  Max workers (CPU limit):  {}", self.max_workers_cpu));
        lines.push(format!("  Max workers (RAM limit):  {}", self.max_workers_memory));
        lines.push(format!("  Optimal chunksize:        {}", self.optimal_chunksize));
        lines.push(format!(
            "  Target chunk duration:    {}",
            format_time(self.target_chunk_duration_s)
        ));

        if self.estimated_speedup > 1.0 || self.parallel_compute_time_s > 0.0 {
            lines.push(String::new());
            lines.push("[4] PERFORMANCE PREDICTION".to_string());
            lines.push(thin.clone());
            lines.push(format!(
                "  Theoretical max speedup:  {:.2}x",
                self.theoretical_max_speedup
            ));
            lines.push(format!(
                "  Estimated actual speedup: {:.2}x",
                self.estimated_speedup
            ));
            lines.push(format!(
                "  Parallel efficiency:      {:.1}%",
                self.speedup_efficiency * 100.0
            ));
            if self.parallel_compute_time_s > 0.0 {
                lines.push(String::new());
                lines.push("  Time breakdown (parallel execution):".to_string());
                lines.push(format!(
                    "    Computation:            {}",
                    format_time(self.parallel_compute_time_s)
                ));
                lines.push(format!(
                    "    Worker spawn:           {}",
                    format_time(self.overhead_spawn_s)
                ));
                lines.push(format!(
                    "    IPC/serialization:      {}",
                    format_time(self.overhead_ipc_s)
                ));
                lines.push(format!(
                    "    Task distribution:      {}",
                    format_time(self.overhead_dispatch_s)
                ));
                let (spawn_pct, ipc_pct, dispatch_pct) = self.overhead_breakdown_percent();
                lines.push(String::new());
                lines.push("  Overhead distribution:".to_string());
                lines.push(format!("    Spawn:                  {spawn_pct:.1}%"));
                lines.push(format!("    IPC:                    {ipc_pct:.1}%"));
                lines.push(format!("    Dispatch:               {dispatch_pct:.1}%"));
            }
        }

        if !self.rejection_reasons.is_empty() {
            lines.push(String::new());
            lines.push("[5] REJECTION REASONS".to_string());
            lines.push(thin.clone());
            for reason in &self.rejection_reasons {
                lines.push(format!("  x {reason}"));
            }
        }

        if !self.constraints.is_empty() {
            lines.push(String::new());
            lines.push("[6] ACTIVE CONSTRAINTS".to_string());
            lines.push(thin.clone());
            for constraint in &self.constraints {
                lines.push(format!("  ! {constraint}"));
            }
        }

        if !self.recommendations.is_empty() {
            lines.push(String::new());
            lines.push("[7] RECOMMENDATIONS".to_string());
            lines.push(thin.clone());
            for rec in &self.recommendations {
                lines.push(format!("  > {rec}"));
            }
        }

        lines.push(String::new());
        lines.push(rule);
        lines.join("\n")
    }
}

/// Format a duration in the most readable unit
pub fn format_time(seconds: f64) -> String {
    if seconds < 0.001 {
        format!("{:.1}us", seconds * 1_000_000.0)
    } else if seconds < 1.0 {
        format!("{:.2}ms", seconds * 1000.0)
    } else {
        format!("{seconds:.3}s")
    }
}

/// Format a byte count in the most readable unit
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    if bytes < KB {
        format!("{bytes}B")
    } else if bytes < MB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_units() {
        assert_eq!(format_time(0.0000005), "0.5us");
        assert_eq!(format_time(0.0025), "2.50ms");
        assert_eq!(format_time(1.5), "1.500s");
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.00KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00GB");
    }

    #[test]
    fn test_overhead_breakdown_percentages() {
        let mut profile = DiagnosticProfile::new();
        profile.overhead_spawn_s = 0.02;
        profile.overhead_ipc_s = 0.06;
        profile.overhead_dispatch_s = 0.02;
        let (spawn, ipc, dispatch) = profile.overhead_breakdown_percent();
        assert!((spawn - 20.0).abs() < 1e-9);
        assert!((ipc - 60.0).abs() < 1e-9);
        assert!((dispatch - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_overhead_breakdown_empty() {
        let profile = DiagnosticProfile::new();
        assert_eq!(profile.overhead_breakdown_percent(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_explain_includes_decision_path() {
        let mut profile = DiagnosticProfile::new();
        profile.physical_cores = 4;
        profile.rejection_reasons.push("test rejection".to_string());
        profile.constraints.push("test constraint".to_string());
        profile.recommendations.push("test recommendation".to_string());
        let report = profile.explain();
        assert!(report.contains("DIAGNOSTIC PROFILE"));
        assert!(report.contains("test rejection"));
        assert!(report.contains("test constraint"));
        assert!(report.contains("test recommendation"));
        assert!(report.contains("[2] SYSTEM RESOURCES"));
    }
}
