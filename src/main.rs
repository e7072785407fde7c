//! Amorsize CLI entry point

use amorsize::cache::maintenance::{self, PrewarmSource};
use amorsize::cache::{self, BenchmarkCacheEntry};
use amorsize::config::cli::{
    ttl_from_days, AnalysisArgs, CacheOp, Cli, Command, ExecuteArgs, OptimizeArgs, WatchArgs,
    WorkloadKindArg,
};
use amorsize::output::{DecisionReport, OutputFormat};
use amorsize::task::{FnTask, Task};
use amorsize::watch::{WatchMonitor, WatchOptions};
use amorsize::{fingerprint, workloads};
use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Bind a demo workload selection to a concrete task value
macro_rules! with_demo_task {
    ($kind:expr, $task:ident => $body:expr) => {
        match $kind {
            WorkloadKindArg::CpuIntensive => {
                let $task = FnTask::new("demo/cpu-intensive", workloads::cpu_intensive);
                $body
            }
            WorkloadKindArg::Mixed => {
                let $task = FnTask::new("demo/mixed", workloads::mixed);
                $body
            }
            WorkloadKindArg::MemoryIntensive => {
                let $task = FnTask::new("demo/memory-intensive", workloads::memory_intensive);
                $body
            }
            WorkloadKindArg::Fast => {
                let $task = FnTask::new("demo/fast", workloads::fast);
                $body
            }
            WorkloadKindArg::Variable => {
                let $task = FnTask::new("demo/variable", workloads::variable);
                $body
            }
        }
    };
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Optimize(args) => run_optimize(&args),
        Command::Execute(args) => run_execute(&args),
        Command::Watch(args) => run_watch(&args),
        Command::Cache { op } => run_cache(&op),
    }
}

fn run_optimize(args: &OptimizeArgs) -> Result<()> {
    let demo = args.analysis.workload.demo();
    let data = demo.data(args.analysis.items);

    let report = with_demo_task!(args.analysis.workload, task => {
        if args.streaming {
            let result = amorsize::optimize_streaming(&task, data, &args.streaming_options())
                .context("streaming optimization failed")?;
            DecisionReport::from_streaming(&result)
        } else {
            let result = amorsize::optimize(&task, data, &args.analysis.optimize_options())
                .context("optimization failed")?;
            DecisionReport::from_batch(&result)
        }
    });

    print!("{}", ensure_trailing_newline(report.render(args.format)));

    if let Some(path) = &args.export {
        let json = serde_json::to_string_pretty(&report)
            .context("failed to serialize decision for export")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write decision to {}", path.display()))?;
        eprintln!("Decision written to {}", path.display());
    }
    Ok(())
}

fn run_execute(args: &ExecuteArgs) -> Result<()> {
    with_demo_task!(args.analysis.workload, task => execute_workload(&task, &args.analysis, args.format))
}

/// Run a workload serially and under its recommendation, then compare
///
/// The parallel leg uses a thread pool sized to the recommendation. It
/// demonstrates the shape of the win; a process pool adds the spawn and
/// IPC costs the recommendation already accounts for.
fn execute_workload<W>(task: &W, analysis: &AnalysisArgs, format: OutputFormat) -> Result<()>
where
    W: Task<Input = u64> + Sync,
    W::Output: Send,
{
    let demo = analysis.workload.demo();
    let data = demo.data(analysis.items);

    let result = amorsize::optimize(task, data, &analysis.optimize_options())
        .context("optimization failed")?;
    let report = DecisionReport::from_batch(&result);
    print!("{}", ensure_trailing_newline(report.render(format)));

    let items: Vec<u64> = result.data.collect();

    println!();
    println!("Running serial baseline ({} items)...", items.len());
    let serial_start = Instant::now();
    for item in &items {
        std::hint::black_box(task.invoke(item));
    }
    let serial_time = serial_start.elapsed();

    println!(
        "Running with recommendation (n_jobs={}, chunksize={})...",
        result.n_jobs, result.chunksize
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(result.n_jobs)
        .build()
        .context("failed to build worker pool")?;
    let chunksize = result.chunksize.max(1);
    let parallel_start = Instant::now();
    pool.install(|| {
        items
            .par_iter()
            .with_min_len(chunksize)
            .for_each(|item| {
                std::hint::black_box(task.invoke(item));
            });
    });
    let parallel_time = parallel_start.elapsed();

    let actual_speedup = if parallel_time.as_secs_f64() > 0.0 {
        serial_time.as_secs_f64() / parallel_time.as_secs_f64()
    } else {
        1.0
    };

    println!();
    println!("Serial time:      {:.3}s", serial_time.as_secs_f64());
    println!("Parallel time:    {:.3}s", parallel_time.as_secs_f64());
    println!("Actual speedup:   {actual_speedup:.2}x");
    println!("Predicted:        {:.2}x", result.estimated_speedup);
    if result.estimated_speedup > 0.0 {
        let accuracy = (1.0
            - (actual_speedup - result.estimated_speedup).abs() / result.estimated_speedup)
            .max(0.0)
            * 100.0;
        println!("Prediction accuracy: {accuracy:.0}%");
    }

    // Record the measurement for the benchmark cache's consumers.
    let key = fingerprint::benchmark_cache_key(task, items.len());
    let entry = BenchmarkCacheEntry::new(
        serial_time.as_secs_f64(),
        parallel_time.as_secs_f64(),
        actual_speedup,
        result.n_jobs,
        result.chunksize,
    );
    cache::save_benchmark_entry(&key, &entry);
    Ok(())
}

fn run_watch(args: &WatchArgs) -> Result<()> {
    with_demo_task!(args.analysis.workload, task => watch_workload(&task, args))
}

fn watch_workload<W: Task<Input = u64>>(task: &W, args: &WatchArgs) -> Result<()> {
    let demo = args.analysis.workload.demo();
    let mut monitor = WatchMonitor::new(WatchOptions {
        change_threshold_n_jobs: args.n_jobs_threshold,
        change_threshold_speedup: args.speedup_threshold,
        ..Default::default()
    });

    println!(
        "Watching workload '{}' every {:.1}s for {} iterations",
        demo.name(),
        args.interval,
        args.iterations
    );
    println!();

    for iteration in 0..args.iterations {
        let data = demo.data(args.analysis.items);
        // Drift detection needs fresh measurements each round.
        let mut opts = args.analysis.optimize_options();
        opts.use_cache = false;
        let result = amorsize::optimize(task, data, &opts).context("optimization failed")?;

        let (snapshot, changes) = monitor.record(
            result.n_jobs,
            result.chunksize,
            result.estimated_speedup,
            result.reason.clone(),
        );
        println!(
            "[{}] #{:<3} n_jobs={:<3} chunksize={:<6} speedup={:.2}x",
            snapshot.timestamp.format("%H:%M:%S"),
            snapshot.iteration,
            snapshot.n_jobs,
            snapshot.chunksize,
            snapshot.estimated_speedup
        );
        for change in &changes {
            println!("    ! {change}");
        }

        if iteration + 1 < args.iterations {
            std::thread::sleep(Duration::from_secs_f64(args.interval.max(0.0)));
        }
    }

    println!();
    println!("Recorded {} snapshots", monitor.snapshots().len());
    Ok(())
}

fn run_cache(op: &CacheOp) -> Result<()> {
    match op {
        CacheOp::Stats { kind } => {
            let stats = maintenance::cache_stats(cache::DEFAULT_TTL, kind.kind());
            println!("{stats}");
        }
        CacheOp::Clear { kind } => {
            let removed = match kind.kind() {
                maintenance::CacheKind::Optimization => cache::clear_cache(),
                maintenance::CacheKind::Benchmark => cache::clear_benchmark_cache(),
            };
            println!("Removed {removed} cache entries");
        }
        CacheOp::Prune { ttl_days } => {
            let removed = cache::prune_expired(ttl_from_days(*ttl_days));
            println!("Pruned {removed} expired or incompatible entries");
        }
        CacheOp::Validate { kind } => {
            let report = maintenance::validate_cache(cache::DEFAULT_TTL, kind.kind());
            println!("{report}");
            if !report.is_valid {
                anyhow::bail!("cache validation found issues");
            }
        }
        CacheOp::Repair { execute, kind } => {
            let summary = maintenance::repair_cache(!execute, kind.kind());
            if *execute {
                println!(
                    "Examined {}, deleted {}, kept {}",
                    summary.examined, summary.deleted, summary.kept
                );
            } else {
                println!(
                    "Dry run: examined {}, would delete {}, would keep {}",
                    summary.examined, summary.deleted, summary.kept
                );
            }
        }
        CacheOp::Export {
            path,
            include_expired,
            include_incompatible,
        } => {
            let count = maintenance::export_cache(
                path,
                *include_expired,
                *include_incompatible,
                cache::DEFAULT_TTL,
            )
            .context("cache export failed")?;
            println!("Exported {count} entries to {}", path.display());
        }
        CacheOp::Import {
            path,
            merge,
            no_validate,
            update_timestamps,
        } => {
            let (imported, skipped, incompatible) = maintenance::import_cache(
                path,
                merge.strategy(),
                !no_validate,
                *update_timestamps,
            )
            .context("cache import failed")?;
            println!("Imported {imported}, skipped {skipped}, incompatible {incompatible}");
        }
        CacheOp::Prewarm { workload, force } => {
            let profiles = maintenance::default_workload_profiles();
            let created = with_demo_task!(*workload, task => {
                maintenance::prewarm_cache(&task, PrewarmSource::Profiles(&profiles), *force)
            });
            println!("Prewarmed {created} cache entries");
        }
    }
    Ok(())
}

fn ensure_trailing_newline(mut rendered: String) -> String {
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    rendered
}
