//! CLI argument parsing using clap

use crate::cache::DEFAULT_TTL;
use crate::optimizer::streaming::StreamingOptions;
use crate::optimizer::OptimizeOptions;
use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Built-in workload selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkloadKindArg {
    /// Prime counting plus sum of squares (pure CPU)
    CpuIntensive,
    /// Computation plus a short sleep (mixed CPU/IO)
    Mixed,
    /// Large intermediate data, small result
    MemoryIntensive,
    /// Single multiply (too fast to parallelize)
    Fast,
    /// Per-element cost varies widely
    Variable,
}

impl WorkloadKindArg {
    pub fn demo(self) -> crate::workloads::DemoWorkload {
        match self {
            WorkloadKindArg::CpuIntensive => crate::workloads::DemoWorkload::CpuIntensive,
            WorkloadKindArg::Mixed => crate::workloads::DemoWorkload::Mixed,
            WorkloadKindArg::MemoryIntensive => crate::workloads::DemoWorkload::MemoryIntensive,
            WorkloadKindArg::Fast => crate::workloads::DemoWorkload::Fast,
            WorkloadKindArg::Variable => crate::workloads::DemoWorkload::Variable,
        }
    }
}

/// Merge strategy selector for cache import
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeStrategyArg {
    Skip,
    Overwrite,
    Update,
}

impl MergeStrategyArg {
    pub fn strategy(self) -> crate::cache::maintenance::MergeStrategy {
        match self {
            MergeStrategyArg::Skip => crate::cache::maintenance::MergeStrategy::Skip,
            MergeStrategyArg::Overwrite => crate::cache::maintenance::MergeStrategy::Overwrite,
            MergeStrategyArg::Update => crate::cache::maintenance::MergeStrategy::Update,
        }
    }
}

/// Cache store selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheKindArg {
    Optimization,
    Benchmark,
}

impl CacheKindArg {
    pub fn kind(self) -> crate::cache::maintenance::CacheKind {
        match self {
            CacheKindArg::Optimization => crate::cache::maintenance::CacheKind::Optimization,
            CacheKindArg::Benchmark => crate::cache::maintenance::CacheKind::Benchmark,
        }
    }
}

/// Amorsize - parallelization decision engine
#[derive(Parser, Debug)]
#[command(name = "amorsize")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a workload and print the recommended pool parameters
    Optimize(OptimizeArgs),
    /// Run a workload under its recommendation and compare with serial
    Execute(ExecuteArgs),
    /// Re-optimize on an interval and report recommendation drift
    Watch(WatchArgs),
    /// Inspect and maintain the decision cache
    Cache {
        #[command(subcommand)]
        op: CacheOp,
    },
}

/// Shared analysis options
#[derive(Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Built-in workload to analyze
    #[arg(long, value_enum, default_value = "cpu-intensive")]
    pub workload: WorkloadKindArg,

    /// Number of input items
    #[arg(long, default_value = "1000")]
    pub items: usize,

    /// Elements consumed by the dry run
    #[arg(long, default_value = "5")]
    pub sample_size: usize,

    /// Target chunk duration in seconds
    #[arg(long, default_value = "0.2")]
    pub target_chunk_duration: f64,

    /// Skip the decision cache
    #[arg(long)]
    pub no_cache: bool,

    /// Use OS-default spawn cost instead of measuring it
    #[arg(long)]
    pub no_spawn_benchmark: bool,

    /// Use the default dispatch cost instead of measuring it
    #[arg(long)]
    pub no_chunking_benchmark: bool,

    /// Skip memory tracking during the dry run
    #[arg(long)]
    pub no_memory_tracking: bool,

    /// Attach per-call timing detail to the dry run
    #[arg(long)]
    pub function_profiling: bool,

    /// Capture a diagnostic profile of the decision
    #[arg(long)]
    pub profile: bool,

    /// Print analysis progress
    #[arg(short, long)]
    pub verbose: bool,
}

impl AnalysisArgs {
    pub fn optimize_options(&self) -> OptimizeOptions {
        OptimizeOptions {
            sample_size: self.sample_size,
            target_chunk_duration_s: self.target_chunk_duration,
            use_spawn_benchmark: !self.no_spawn_benchmark,
            use_chunking_benchmark: !self.no_chunking_benchmark,
            enable_memory_tracking: !self.no_memory_tracking,
            enable_function_profiling: self.function_profiling,
            profile: self.profile,
            use_cache: !self.no_cache,
            cache_ttl: DEFAULT_TTL,
            auto_adjust_for_nested_parallelism: true,
            verbose: self.verbose,
        }
    }
}

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Use the streaming engine instead of batch
    #[arg(long)]
    pub streaming: bool,

    /// Force ordered (true) or unordered (false) streaming dispatch
    #[arg(long)]
    pub prefer_ordered: Option<bool>,

    /// Permit runtime chunk resizing (streaming only)
    #[arg(long)]
    pub adaptive_chunking: bool,

    /// Aggressiveness of adaptive resizing, 0..=1 (streaming only)
    #[arg(long, default_value = "0.3")]
    pub adaptation_rate: f64,

    /// Cap the result buffer by a memory budget (streaming only)
    #[arg(long)]
    pub memory_backpressure: bool,

    /// Memory fraction above which the pool should pause, 0..=1
    #[arg(long, default_value = "0.8")]
    pub memory_threshold: f64,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the decision (JSON) to this path
    #[arg(long)]
    pub export: Option<PathBuf>,
}

impl OptimizeArgs {
    pub fn streaming_options(&self) -> StreamingOptions {
        StreamingOptions {
            common: self.analysis.optimize_options(),
            prefer_ordered: self.prefer_ordered,
            buffer_size: None,
            enable_adaptive_chunking: self.adaptive_chunking,
            adaptation_rate: self.adaptation_rate,
            enable_memory_backpressure: self.memory_backpressure,
            memory_threshold: self.memory_threshold,
        }
    }
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub analysis: AnalysisArgs,

    /// Seconds between re-optimizations
    #[arg(long, default_value = "10")]
    pub interval: f64,

    /// Number of re-optimizations before exiting
    #[arg(long, default_value = "5")]
    pub iterations: usize,

    /// Alert when n_jobs moves by at least this much
    #[arg(long, default_value = "1")]
    pub n_jobs_threshold: usize,

    /// Alert when speedup moves by at least this relative fraction
    #[arg(long, default_value = "0.2")]
    pub speedup_threshold: f64,
}

#[derive(Subcommand, Debug)]
pub enum CacheOp {
    /// Entry counts, disk usage, and age range
    Stats {
        #[arg(long, value_enum, default_value = "optimization")]
        kind: CacheKindArg,
    },
    /// Delete every entry
    Clear {
        #[arg(long, value_enum, default_value = "optimization")]
        kind: CacheKindArg,
    },
    /// Delete expired and incompatible entries
    Prune {
        /// TTL in days used to judge expiry
        #[arg(long, default_value = "7")]
        ttl_days: u64,
    },
    /// Check every entry and report a health score
    Validate {
        #[arg(long, value_enum, default_value = "optimization")]
        kind: CacheKindArg,
    },
    /// Remove entries that fail validation
    Repair {
        /// Actually delete (default is a dry run)
        #[arg(long)]
        execute: bool,
        #[arg(long, value_enum, default_value = "optimization")]
        kind: CacheKindArg,
    },
    /// Write entries to a portable JSON document
    Export {
        /// Output path
        path: PathBuf,
        #[arg(long)]
        include_expired: bool,
        #[arg(long)]
        include_incompatible: bool,
    },
    /// Read entries from an exported document
    Import {
        /// Input path
        path: PathBuf,
        #[arg(long, value_enum, default_value = "skip")]
        merge: MergeStrategyArg,
        /// Skip the system compatibility check
        #[arg(long)]
        no_validate: bool,
        /// Stamp imported entries with the current time
        #[arg(long)]
        update_timestamps: bool,
    },
    /// Seed entries for a workload without running it
    Prewarm {
        #[arg(long, value_enum, default_value = "cpu-intensive")]
        workload: WorkloadKindArg,
        /// Overwrite entries that already exist
        #[arg(long)]
        force: bool,
    },
}

/// TTL helper for CLI day counts
pub fn ttl_from_days(days: u64) -> Duration {
    Duration::from_secs(days.saturating_mul(24 * 60 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_optimize_args_parse() {
        let cli = Cli::parse_from([
            "amorsize",
            "optimize",
            "--workload",
            "fast",
            "--items",
            "500",
            "--streaming",
            "--format",
            "json",
            "--profile",
        ]);
        match cli.command {
            Command::Optimize(args) => {
                assert_eq!(args.analysis.workload, WorkloadKindArg::Fast);
                assert_eq!(args.analysis.items, 500);
                assert!(args.streaming);
                assert!(args.analysis.profile);
                assert_eq!(args.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cache_subcommands_parse() {
        let cli = Cli::parse_from(["amorsize", "cache", "repair", "--execute"]);
        match cli.command {
            Command::Cache {
                op: CacheOp::Repair { execute, kind },
            } => {
                assert!(execute);
                assert_eq!(kind, CacheKindArg::Optimization);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from([
            "amorsize",
            "cache",
            "import",
            "backup.json",
            "--merge",
            "overwrite",
        ]);
        match cli.command {
            Command::Cache {
                op: CacheOp::Import { merge, .. },
            } => assert_eq!(merge, MergeStrategyArg::Overwrite),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_analysis_args_convert_to_options() {
        let cli = Cli::parse_from([
            "amorsize",
            "optimize",
            "--no-cache",
            "--no-spawn-benchmark",
            "--sample-size",
            "9",
        ]);
        let Command::Optimize(args) = cli.command else {
            panic!("expected optimize");
        };
        let opts = args.analysis.optimize_options();
        assert!(!opts.use_cache);
        assert!(!opts.use_spawn_benchmark);
        assert!(opts.use_chunking_benchmark);
        assert_eq!(opts.sample_size, 9);
    }
}
