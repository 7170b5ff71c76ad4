// src/tensor/mod.rs

use log::trace;

use crate::buffer::CpuContext;
use crate::device::{DeviceContext, StorageDevice};
use crate::error::NeuroGradError;
use crate::types::{DType, Element};

pub mod create;
pub mod table;

// Re-export creation functions and the table types
pub use create::{full, ones, rand_uniform, randn, zeros};
pub use table::{read_tensor, write_tensor, SharedTensor, TensorTable};

/// Element count of `shape`. A rank-0 shape describes an empty tensor, not a
/// scalar, so it counts 0.
pub(crate) fn element_count(shape: &[usize]) -> usize {
    if shape.is_empty() {
        0
    } else {
        shape.iter().product()
    }
}

/// A shaped, typed view over one device context's buffer.
///
/// A tensor with no elements is *empty*; operators use that state to decide
/// whether they must originate a shape or validate an existing one.
///
/// Re-allocation policy: [`resize`](Tensor::resize) keeps the current buffer,
/// and therefore its contents, whenever the new byte length equals the old one.
/// Any other byte length releases the buffer and allocates a zeroed one.
#[derive(Debug, Default)]
pub struct Tensor<C: DeviceContext = CpuContext> {
    context: C,
    shape: Vec<usize>,
    dtype: DType,
}

impl<C: DeviceContext> Tensor<C> {
    /// Creates an empty tensor. No memory is allocated.
    pub fn new() -> Self {
        Tensor {
            context: C::default(),
            shape: Vec::new(),
            dtype: DType::default(),
        }
    }

    /// Creates a tensor of the given shape holding `data` in row-major order.
    ///
    /// # Errors
    /// `NeuroGradError::TensorCreationError` if `data.len()` does not match the
    /// element count of `shape`.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: Vec<usize>) -> Result<Self, NeuroGradError> {
        let numel = element_count(&shape);
        if data.len() != numel {
            return Err(NeuroGradError::TensorCreationError {
                data_len: data.len(),
                shape,
            });
        }
        let mut tensor = Self::new();
        tensor.resize::<T>(&shape)?;
        tensor.copy_from_slice(&data)?;
        Ok(tensor)
    }

    /// Resizes the tensor to `shape` with element type `T`.
    pub fn resize<T: Element>(&mut self, shape: &[usize]) -> Result<(), NeuroGradError> {
        self.resize_with_dtype(shape, T::DTYPE)
    }

    /// Resizes the tensor to `shape` and tags it with `dtype`.
    ///
    /// The buffer is only re-allocated when the byte length changes, see the
    /// type-level docs for what happens to the contents.
    pub fn resize_with_dtype(&mut self, shape: &[usize], dtype: DType) -> Result<(), NeuroGradError> {
        let numel = element_count(shape);
        let width = dtype.size_of();
        let bytes = numel.checked_mul(width);
        if bytes != Some(self.context.size()) {
            trace!(
                "Tensor: re-allocating for shape {:?} ({} -> {:?} bytes)",
                shape,
                self.context.size(),
                bytes
            );
            if let Err(e) = self.context.allocate(numel, width) {
                self.shape.clear();
                return Err(e);
            }
        }
        self.shape = shape.to_vec();
        self.dtype = dtype;
        Ok(())
    }

    /// Resizes to the shape and element type of `other`.
    pub fn reshape_like(&mut self, other: &Tensor<C>) -> Result<(), NeuroGradError> {
        self.resize_with_dtype(&other.shape, other.dtype)
    }

    /// Releases the buffer and returns to the empty state.
    pub fn clear(&mut self) {
        self.context.clear();
        self.shape.clear();
    }

    /// Number of elements, 0 for an empty tensor.
    pub fn size(&self) -> usize {
        element_count(&self.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Size of dimension `i`.
    ///
    /// # Errors
    /// `NeuroGradError::IndexOutOfBounds` if `i >= rank()`.
    pub fn dim(&self, i: usize) -> Result<usize, NeuroGradError> {
        self.shape
            .get(i)
            .copied()
            .ok_or_else(|| NeuroGradError::IndexOutOfBounds {
                index: vec![i],
                shape: self.shape.clone(),
            })
    }

    /// True iff both tensors hold the same number of elements, whatever their dims.
    pub fn compare_size_with<D: DeviceContext>(&self, other: &Tensor<D>) -> bool {
        self.size() == other.size()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> StorageDevice {
        C::DEVICE
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Base address of the buffer, null while empty.
    pub fn raw_ptr(&self) -> *const u8 {
        self.context.raw_ptr()
    }

    fn check_dtype<T: Element>(&self, operation: &str) -> Result<(), NeuroGradError> {
        if T::DTYPE != self.dtype {
            return Err(NeuroGradError::DataTypeMismatch {
                operation: operation.to_string(),
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(())
    }

    /// Typed read-only view of the elements.
    ///
    /// # Errors
    /// `NeuroGradError::DataTypeMismatch` if `T` is not the tensor's element type.
    pub fn as_slice<T: Element>(&self) -> Result<&[T], NeuroGradError> {
        if self.is_empty() {
            return Ok(&[]);
        }
        self.check_dtype::<T>("as_slice")?;
        bytemuck::try_cast_slice(self.context.as_bytes())
            .map_err(|e| NeuroGradError::InternalError(format!("as_slice: {:?}", e)))
    }

    /// Typed mutable view of the elements.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T], NeuroGradError> {
        if self.is_empty() {
            return Ok(&mut []);
        }
        self.check_dtype::<T>("as_mut_slice")?;
        bytemuck::try_cast_slice_mut(self.context.as_bytes_mut())
            .map_err(|e| NeuroGradError::InternalError(format!("as_mut_slice: {:?}", e)))
    }

    /// Sets every element to `value`.
    pub fn fill<T: Element>(&mut self, value: T) -> Result<(), NeuroGradError> {
        self.as_mut_slice::<T>()?.fill(value);
        Ok(())
    }

    /// Copies the elements out into a new vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, NeuroGradError> {
        let mut out = vec![T::zero(); self.size()];
        if !out.is_empty() {
            self.check_dtype::<T>("to_vec")?;
            self.context.copy_out(
                0,
                out.len(),
                T::DTYPE.size_of(),
                bytemuck::cast_slice_mut(&mut out),
            )?;
        }
        Ok(out)
    }

    /// Overwrites the elements with `data`, which must hold exactly `size()` values.
    pub fn copy_from_slice<T: Element>(&mut self, data: &[T]) -> Result<(), NeuroGradError> {
        if data.len() != self.size() {
            return Err(NeuroGradError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: vec![data.len()],
                operation: "copy_from_slice".to_string(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        self.check_dtype::<T>("copy_from_slice")?;
        self.context
            .copy_in(0, data.len(), T::DTYPE.size_of(), bytemuck::cast_slice(data))
    }
}

#[cfg(test)]
mod tests;
