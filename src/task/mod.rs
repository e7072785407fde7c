//! Task abstraction
//!
//! This module defines the core abstraction for the unit of work the engine
//! analyzes. A task bundles three capabilities:
//!
//! - **Invoke**: run the task on one input element
//! - **Stable identity**: a deterministic byte identity of the task body,
//!   used by the fingerprint module to key the decision cache
//! - **Wire encoding**: encode the task, its inputs, and its outputs for
//!   transfer across a process boundary
//!
//! The engine never sends anything to a worker itself; it *prices* the wire
//! encoding during the dry run to model IPC overhead, and it refuses to
//! recommend parallelism for tasks or elements that cannot cross a process
//! boundary at all.
//!
//! # Example
//!
//! ```
//! use amorsize::task::{FnTask, Task};
//!
//! let task = FnTask::new("square", |x: &u64| x * x);
//! assert_eq!(task.invoke(&7), 49);
//! assert!(task.encode_task().is_ok());
//! assert!(task.encode_input(&7).unwrap().len() > 0);
//! ```

use serde::Serialize;
use thiserror::Error;

/// Failure to encode a value for transfer to a worker process
#[derive(Debug, Clone, Error)]
pub enum WireError {
    /// The value's serializer rejected it
    #[error("cannot serialize for worker transfer: {0}")]
    Encode(String),
    /// The task has no transferable representation (e.g. an anonymous closure)
    #[error("task has no transferable identity: {0}")]
    Opaque(String),
}

/// A unit of work the decision engine can analyze
///
/// Implementors are free to back `invoke` with anything callable. The
/// default adapter is [`FnTask`], which wraps a closure plus serde-encodable
/// input and output types.
///
/// # Panics
///
/// `invoke` may panic; the sampler catches panics and records them as a
/// sampling error, which maps to a serial recommendation.
pub trait Task {
    /// Element type consumed from the input collection
    type Input;
    /// Value produced per element
    type Output;

    /// Run the task on one element
    fn invoke(&self, input: &Self::Input) -> Self::Output;

    /// Deterministic byte identity of the task body
    ///
    /// Implementations may hash compiled code, an object file symbol, or a
    /// caller-supplied tag. The fingerprint module hashes whatever this
    /// returns, so two tasks with the same identity share cache entries.
    fn stable_identity(&self) -> Vec<u8>;

    /// Encode the task itself for transfer to a worker
    ///
    /// `Err` means the task cannot cross a process boundary and the engine
    /// must recommend serial execution.
    fn encode_task(&self) -> Result<Vec<u8>, WireError>;

    /// Encode one input element for transfer to a worker
    fn encode_input(&self, input: &Self::Input) -> Result<Vec<u8>, WireError>;

    /// Encode one output value for return from a worker
    fn encode_output(&self, output: &Self::Output) -> Result<Vec<u8>, WireError>;
}

/// Encode a serde-serializable value with the wire codec
///
/// The engine uses this to measure real serialization time and size; the
/// same codec a process pool would use for its queue protocol.
pub fn encode_wire<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    bincode::serialize(value).map_err(|e| WireError::Encode(e.to_string()))
}

/// Adapter wrapping a closure as a [`Task`]
///
/// Two flavors exist:
///
/// - [`FnTask::new`] takes a tag naming the function. The tag doubles as the
///   stable identity and as the transferable representation (a worker on the
///   other side resolves the tag to the same function).
/// - [`FnTask::anonymous`] wraps an unnamed closure. Its identity falls back
///   to the closure's type name, which is stable within a build, but the
///   task itself is not transferable and always yields a serial
///   recommendation.
pub struct FnTask<F, I, O>
where
    F: Fn(&I) -> O,
{
    func: F,
    tag: Option<String>,
    _marker: std::marker::PhantomData<fn(&I) -> O>,
}

impl<F, I, O> FnTask<F, I, O>
where
    F: Fn(&I) -> O,
{
    /// Wrap a named function
    ///
    /// The tag must identify the function body: change the function, change
    /// the tag. Version suffixes work well (`"tokenize/v2"`).
    pub fn new(tag: impl Into<String>, func: F) -> Self {
        Self {
            func,
            tag: Some(tag.into()),
            _marker: std::marker::PhantomData,
        }
    }

    /// Wrap an anonymous closure that cannot be transferred to workers
    pub fn anonymous(func: F) -> Self {
        Self {
            func,
            tag: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// The tag this task was created with, if any
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl<F, I, O> Task for FnTask<F, I, O>
where
    F: Fn(&I) -> O,
    I: Serialize,
    O: Serialize,
{
    type Input = I;
    type Output = O;

    fn invoke(&self, input: &I) -> O {
        (self.func)(input)
    }

    fn stable_identity(&self) -> Vec<u8> {
        match &self.tag {
            Some(tag) => tag.as_bytes().to_vec(),
            // Type names are stable within a build, like compiled bytecode.
            None => std::any::type_name::<F>().as_bytes().to_vec(),
        }
    }

    fn encode_task(&self) -> Result<Vec<u8>, WireError> {
        match &self.tag {
            Some(tag) => Ok(tag.as_bytes().to_vec()),
            None => Err(WireError::Opaque(
                "anonymous closures cannot be transferred to worker processes".to_string(),
            )),
        }
    }

    fn encode_input(&self, input: &I) -> Result<Vec<u8>, WireError> {
        encode_wire(input)
    }

    fn encode_output(&self, output: &O) -> Result<Vec<u8>, WireError> {
        encode_wire(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_task_is_transferable() {
        let task = FnTask::new("double", |x: &u32| x * 2);
        assert_eq!(task.invoke(&21), 42);
        assert_eq!(task.encode_task().unwrap(), b"double".to_vec());
        assert_eq!(task.stable_identity(), b"double".to_vec());
    }

    #[test]
    fn test_anonymous_task_is_not_transferable() {
        let task = FnTask::anonymous(|x: &u32| x + 1);
        assert_eq!(task.invoke(&1), 2);
        assert!(task.encode_task().is_err());
        // Identity still exists so the fingerprint can key cache entries.
        assert!(!task.stable_identity().is_empty());
    }

    #[test]
    fn test_input_output_encoding() {
        let task = FnTask::new("vec-len", |v: &Vec<u8>| v.len() as u64);
        let input = vec![1u8, 2, 3];
        let encoded = task.encode_input(&input).unwrap();
        assert!(!encoded.is_empty());
        let out = task.invoke(&input);
        assert!(!task.encode_output(&out).unwrap().is_empty());
    }

    #[test]
    fn test_encode_failure_is_reported() {
        struct Poison;
        impl Serialize for Poison {
            fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("held resource cannot be serialized"))
            }
        }
        let err = encode_wire(&Poison).unwrap_err();
        assert!(err.to_string().contains("serialize"));
    }
}
