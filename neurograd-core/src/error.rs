use crate::types::DType;
use thiserror::Error;

/// Custom error type for the neurograd runtime.
///
/// Every variant describes a programming-contract violation raised at the point
/// where it is detected. None of them are transient, so nothing in the crate
/// retries on error.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum NeuroGradError {
    #[error("Allocation of {bytes} bytes failed: {reason}")]
    AllocationError { bytes: usize, reason: String },

    #[error(
        "Copy out of bounds: offset {offset} + count {count} elements of width {width} exceeds {capacity} bytes"
    )]
    BoundsError {
        offset: usize,
        count: usize,
        width: usize,
        capacity: usize,
    },

    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error(
        "Operator '{operator}' expects {expected_inputs} inputs and {expected_outputs} outputs, got {actual_inputs} and {actual_outputs}"
    )]
    ArityError {
        operator: String,
        expected_inputs: usize,
        expected_outputs: usize,
        actual_inputs: usize,
        actual_outputs: usize,
    },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Data type mismatch for operation '{operation}': expected {expected:?}, got {actual:?}")]
    DataTypeMismatch {
        operation: String,
        expected: DType,
        actual: DType,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Operator '{operator}' binds tensor '{name}' more than once")]
    AliasedTensor { operator: String, name: String },

    #[error("Invalid parameter '{key}': {reason}")]
    ParamError { key: String, reason: String },

    #[error("Kernel error in {kernel}: {reason}")]
    KernelError { kernel: String, reason: String },

    #[error("Failed to acquire {lock_type} lock: {reason}")]
    LockError { lock_type: String, reason: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}
