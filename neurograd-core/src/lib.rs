// Core modules of the crate
pub mod autograd;
pub mod buffer;
pub mod device;
pub mod error;
pub mod math;
pub mod operators;
pub mod tensor;
pub mod types;
pub mod utils;

// Re-export the main types so they are reachable as `neurograd_core::Tensor` etc.
pub use buffer::CpuContext;
pub use device::{DeviceContext, StorageDevice};
pub use error::NeuroGradError;
pub use math::Blas;
pub use operators::{Operator, OperatorIo};
pub use tensor::{SharedTensor, Tensor, TensorTable};
pub use types::{DType, Element};
// Re-export traits required by public functions/structs
pub use num_traits;
