//! Built-in demonstration workloads
//!
//! The CLI needs something to optimize. These named workloads cover the
//! interesting regimes: pure CPU, mixed CPU/IO, memory-heavy results, a
//! function too fast to parallelize, and a heterogeneous one whose cost
//! varies per element.

use std::time::Duration;

/// Names and data generators for the demo workloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoWorkload {
    /// Prime counting plus a sum of squares; pure CPU
    CpuIntensive,
    /// Computation followed by a short sleep; mixed CPU/IO
    Mixed,
    /// Large intermediate allocation with a small result
    MemoryIntensive,
    /// A single multiply; far below the 1 ms floor
    Fast,
    /// Cost proportional to the element value; high variance
    Variable,
}

impl DemoWorkload {
    pub const ALL: [DemoWorkload; 5] = [
        DemoWorkload::CpuIntensive,
        DemoWorkload::Mixed,
        DemoWorkload::MemoryIntensive,
        DemoWorkload::Fast,
        DemoWorkload::Variable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DemoWorkload::CpuIntensive => "cpu-intensive",
            DemoWorkload::Mixed => "mixed",
            DemoWorkload::MemoryIntensive => "memory-intensive",
            DemoWorkload::Fast => "fast",
            DemoWorkload::Variable => "variable",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DemoWorkload::CpuIntensive => "pure CPU-bound computation (prime counting)",
            DemoWorkload::Mixed => "mixed CPU and simulated IO workload",
            DemoWorkload::MemoryIntensive => "memory-heavy intermediate data, small result",
            DemoWorkload::Fast => "very fast function, unlikely to benefit from parallelism",
            DemoWorkload::Variable => "heterogeneous workload with varying execution times",
        }
    }

    /// Input data for a run of `count` items
    pub fn data(self, count: usize) -> Vec<u64> {
        match self {
            DemoWorkload::CpuIntensive => (1000..1000 + count as u64).collect(),
            DemoWorkload::Mixed => (500..500 + count as u64).collect(),
            DemoWorkload::MemoryIntensive => (100..100 + count as u64).collect(),
            DemoWorkload::Fast => (0..count as u64).collect(),
            // Stride the values so per-item cost spreads widely.
            DemoWorkload::Variable => (0..count as u64).map(|i| 100 + i * 10).collect(),
        }
    }
}

/// Count primes below `n` and add a sum of squares
pub fn cpu_intensive(n: &u64) -> u64 {
    fn is_prime(candidate: u64) -> bool {
        if candidate < 2 {
            return false;
        }
        let mut divisor = 2;
        while divisor * divisor <= candidate {
            if candidate % divisor == 0 {
                return false;
            }
            divisor += 1;
        }
        true
    }
    let prime_count = (2..*n).filter(|&i| is_prime(i)).count() as u64;
    let sum_squares: u64 = (0..*n).map(|i| i.wrapping_mul(i)).fold(0, u64::wrapping_add);
    prime_count.wrapping_add(sum_squares)
}

/// Sum of squares plus a 100 microsecond simulated IO pause
pub fn mixed(n: &u64) -> u64 {
    let sum: u64 = (0..*n).map(|i| i.wrapping_mul(i)).fold(0, u64::wrapping_add);
    std::thread::sleep(Duration::from_micros(100));
    sum
}

/// Build, filter, and sort a large vector; return only the top slice
pub fn memory_intensive(n: &u64) -> Vec<u64> {
    let mut filtered: Vec<u64> = (0..n * 100).filter(|x| x % 3 == 0).collect();
    filtered.sort_unstable_by(|a, b| b.cmp(a));
    filtered.truncate(100);
    filtered
}

/// A single multiply
pub fn fast(x: &u64) -> u64 {
    x.wrapping_mul(*x)
}

/// Work proportional to the element value
pub fn variable(x: &u64) -> u64 {
    (0..*x).map(|i| i.wrapping_mul(i)).fold(0, u64::wrapping_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_intensive_counts_primes() {
        // Primes below 10: 2, 3, 5, 7. Sum of squares 0..10 = 285.
        assert_eq!(cpu_intensive(&10), 4 + 285);
    }

    #[test]
    fn test_memory_intensive_returns_small_result() {
        let result = memory_intensive(&50);
        assert!(result.len() <= 100);
        // Sorted descending, multiples of three.
        assert!(result.windows(2).all(|w| w[0] >= w[1]));
        assert!(result.iter().all(|x| x % 3 == 0));
    }

    #[test]
    fn test_fast_is_square() {
        assert_eq!(fast(&9), 81);
    }

    #[test]
    fn test_variable_grows_with_input() {
        assert!(variable(&100) != variable(&10) || variable(&100) == 0);
    }

    #[test]
    fn test_data_generators_have_requested_length() {
        for workload in DemoWorkload::ALL {
            assert_eq!(workload.data(25).len(), 25, "{}", workload.name());
        }
    }
}
