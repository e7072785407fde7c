//! Memory-bounded batch sizing
//!
//! When results are too large to accumulate all at once and streaming is
//! not an option, processing in fixed-size batches bounds peak memory.
//! This helper sizes those batches from the measured result size and the
//! memory actually available right now.

use crate::error::{AmorsizeError, Result};
use crate::platform;

/// Largest batch whose accumulated results fit in a memory budget
///
/// `max_memory_fraction` is the share of currently-available memory the
/// batch may consume (0, 1]. Always returns at least 1.
///
/// # Errors
///
/// Caller errors only: a non-positive result size or a fraction outside
/// (0, 1].
pub fn estimate_safe_batch_size(result_size_bytes: u64, max_memory_fraction: f64) -> Result<usize> {
    if result_size_bytes == 0 {
        return Err(AmorsizeError::validation(
            "result_size_bytes must be positive",
        ));
    }
    if !max_memory_fraction.is_finite() || max_memory_fraction <= 0.0 || max_memory_fraction > 1.0
    {
        return Err(AmorsizeError::validation(format!(
            "max_memory_fraction must be within (0, 1], got {max_memory_fraction}"
        )));
    }

    let available = platform::available_memory_bytes();
    let budget = (available as f64 * max_memory_fraction) as u64;
    Ok(((budget / result_size_bytes) as usize).max(1))
}
