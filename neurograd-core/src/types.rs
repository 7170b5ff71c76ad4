use std::fmt::{self, Debug};

use bytemuck::Pod;
use ndarray::LinalgScalar;
use num_traits::{Float, NumAssignOps};

/// Defines the possible data types for Tensor elements.
///
/// The tag travels with every tensor so typed access can be checked against it
/// instead of being assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DType {
    /// 32-bit floating-point type.
    #[default]
    F32,
    /// 64-bit floating-point type.
    F64,
}

impl DType {
    /// Width in bytes of one element of this type.
    pub fn size_of(&self) -> usize {
        match self {
            DType::F32 => std::mem::size_of::<f32>(),
            DType::F64 => std::mem::size_of::<f64>(),
        }
    }

    /// Short name used when composing operator kind names (`FC_f32_Gradient`).
    pub fn name(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A trait representing the element types a tensor can hold.
///
/// Bounds the types (`f32`, `f64`) usable by the kernels and operators:
/// float arithmetic from `num-traits`, the scalar capability the `ndarray`
/// linear algebra needs, and `Pod` so a device buffer can be viewed as a
/// typed slice without copying.
pub trait Element:
    Float
    + NumAssignOps
    + LinalgScalar
    + Pod
    + PartialOrd
    + Debug
    + Send
    + Sync
    + 'static
{
    /// The runtime tag matching this type.
    const DTYPE: DType;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtype_of<T: Element>() -> DType {
        T::DTYPE
    }

    #[test]
    fn test_element_tags() {
        assert_eq!(dtype_of::<f32>(), DType::F32);
        assert_eq!(dtype_of::<f64>(), DType::F64);
    }

    #[test]
    fn test_dtype_width_and_name() {
        assert_eq!(DType::F32.size_of(), 4);
        assert_eq!(DType::F64.size_of(), 8);
        assert_eq!(DType::F32.to_string(), "f32");
        assert_eq!(DType::F64.name(), "f64");
    }
}
