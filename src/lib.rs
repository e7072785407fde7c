//! Amorsize - parallelization decision engine
//!
//! Amorsize answers one question: given a unary task and an input
//! collection, is it worth running on a multi-process worker pool, and if
//! so with how many workers and what chunk size? Its purpose is to prevent
//! negative scaling, the common failure where spawn, serialization, and
//! dispatch overheads make parallel execution slower than serial.
//!
//! # Architecture
//!
//! - **Dry-run sampler**: measures per-item cost, serialization tax,
//!   memory growth, variance, and worker-transferability in the caller's
//!   thread
//! - **Cost model**: a refined Amdahl-style prediction composing spawn,
//!   IPC, and dispatch overheads; the single source of every speedup shown
//! - **Decision engines**: batch ([`optimize`]) and streaming
//!   ([`optimize_streaming`]) gate chains that map unprofitable workloads
//!   to serial execution with captured reasons
//! - **Decision cache**: bucketed fingerprint keys, JSON files under the
//!   user cache directory, optional shared key-value backend
//! - **Platform probe**: cores, memory, spawn model, and one-shot
//!   micro-benchmarks of spawn and dispatch cost
//!
//! Amorsize never runs the task in parallel itself; it hands back
//! parameters for the caller's own pool. When the input is a single-shot
//! iterator, consume `result.data` instead of the original input.
//!
//! # Example
//!
//! ```no_run
//! use amorsize::{optimize, FnTask, OptimizeOptions};
//!
//! let task = FnTask::new("checksum/v1", |block: &Vec<u8>| {
//!     block.iter().fold(0u64, |acc, b| acc.wrapping_add(*b as u64))
//! });
//! let blocks: Vec<Vec<u8>> = (0..1000).map(|i| vec![i as u8; 65536]).collect();
//!
//! let result = optimize(&task, blocks, &OptimizeOptions::default())?;
//! println!("{result}");
//! // Hand result.n_jobs / result.chunksize to your pool and feed it
//! // result.data.
//! # Ok::<(), amorsize::AmorsizeError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod optimizer;
pub mod output;
pub mod platform;
pub mod profile;
pub mod sampling;
pub mod task;
pub mod watch;
pub mod workloads;

pub use cache::distributed::{
    configure_distributed_cache, disable_distributed_cache, is_distributed_cache_enabled,
    KvStore,
};
pub use error::{AmorsizeError, Result};
pub use optimizer::streaming::{optimize_streaming, StreamingOptimizationResult, StreamingOptions};
pub use optimizer::{optimize, OptimizationResult, OptimizeOptions};
pub use profile::DiagnosticProfile;
pub use sampling::{SamplingResult, WorkloadKind};
pub use task::{FnTask, Task};
