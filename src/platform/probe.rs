//! Spawn and dispatch micro-benchmarks
//!
//! Two one-shot measurements back the platform facts:
//!
//! - **Spawn cost**: launch a noop child process and wait for it. This
//!   captures the real process-creation latency on this machine, which can
//!   differ from the OS-keyed defaults by an order of magnitude under
//!   containers or security tooling.
//! - **Dispatch cost**: round-trip small chunk payloads through a bounded
//!   channel to a worker thread. This approximates the queueing and context
//!   switch cost a pool pays per chunk handed out.
//!
//! Both are called at most once per process (memoized by the parent module).

use crossbeam::channel;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

/// Number of round trips averaged by the dispatch benchmark
const DISPATCH_ROUNDS: usize = 64;

/// Payload size for the dispatch benchmark, roughly one small encoded chunk
const DISPATCH_PAYLOAD_BYTES: usize = 256;

/// Time spawning and reaping a single noop child process
///
/// Returns None if no suitable noop command exists (the caller falls back
/// to the OS-keyed default).
pub fn measure_spawn_cost() -> Option<f64> {
    let start = Instant::now();
    let status = noop_command()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()?;
    let elapsed = start.elapsed().as_secs_f64();
    if !status.success() || elapsed <= 0.0 {
        return None;
    }
    Some(elapsed)
}

#[cfg(unix)]
fn noop_command() -> Command {
    Command::new("true")
}

#[cfg(windows)]
fn noop_command() -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/c", "exit"]);
    cmd
}

/// Time per-chunk dispatch overhead via a channel round trip
///
/// A worker thread echoes each payload back; the average round-trip time
/// over [`DISPATCH_ROUNDS`] chunks stands in for per-chunk queue overhead.
pub fn measure_dispatch_cost() -> Option<f64> {
    let (to_worker, from_main) = channel::bounded::<Vec<u8>>(1);
    let (to_main, from_worker) = channel::bounded::<Vec<u8>>(1);

    let worker = thread::spawn(move || {
        while let Ok(payload) = from_main.recv() {
            if to_main.send(payload).is_err() {
                break;
            }
        }
    });

    let payload = vec![0u8; DISPATCH_PAYLOAD_BYTES];
    let start = Instant::now();
    for _ in 0..DISPATCH_ROUNDS {
        if to_worker.send(payload.clone()).is_err() {
            return None;
        }
        if from_worker.recv().is_err() {
            return None;
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    drop(to_worker);
    let _ = worker.join();

    if elapsed <= 0.0 {
        return None;
    }
    Some(elapsed / DISPATCH_ROUNDS as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_spawn_cost() {
        if let Some(cost) = measure_spawn_cost() {
            assert!(cost > 0.0);
            // Even heavily loaded CI should spawn a noop in under 10s.
            assert!(cost < 10.0);
        }
    }

    #[test]
    fn test_measure_dispatch_cost() {
        let cost = measure_dispatch_cost().expect("channel benchmark should run");
        assert!(cost > 0.0);
        // Channel round trips are microseconds, not milliseconds.
        assert!(cost < 0.1);
    }
}
