//! # Operators
//!
//! An operator is built once from a wiring descriptor ([`OperatorIo`]) and a
//! [`TensorTable`], then computed any number of times.
//!
//! Construction resolves every named tensor, checks the kind's arity and
//! element type, and performs deferred shape resolution: either the operator
//! *originates* the shapes of its dependent tensors from a hyperparameter, or
//! it *validates* shapes that were already fixed upstream. Exactly one of the
//! two branches runs, and shapes are frozen afterwards.

use std::collections::HashSet;
use std::fmt::Debug;

use log::debug;

use crate::device::DeviceContext;
use crate::error::NeuroGradError;
use crate::tensor::{SharedTensor, Tensor, TensorTable};
use crate::types::DType;

pub mod fully_connected;
pub mod io;
pub mod one_hot;

pub use fully_connected::{FullyConnectedGradientOp, FullyConnectedOp};
pub use io::{OperatorIo, OperatorIoBuilder, ParamDef, ParamValue, PARAM_DIM, PARAM_UNITS};
pub use one_hot::OneHotOp;

/// Kind name of the fully-connected forward operator.
pub const FC: &str = "FC";
/// Kind name of the one-hot encoder.
pub const ONE_HOT: &str = "OneHot";

/// Kind name of the backward operator derived from `forward_kind`.
pub fn gradient_kind(forward_kind: &str, dtype: DType) -> String {
    format!("{}_{}_Gradient", forward_kind, dtype.name())
}

/// The interface every operator kind exposes once constructed.
///
/// Construction is kind-specific (each kind has its own `new`) and performs
/// shape resolution; what remains common is recomputation. The trait is object
/// safe so a graph executor can hold a `Vec<Box<dyn Operator>>`.
pub trait Operator: Debug {
    /// Reads the current input contents and overwrites the outputs in place.
    ///
    /// Never changes a shape. Safe to call repeatedly with only values changing
    /// between calls, which is what optimisation loops and the gradient
    /// checker rely on.
    ///
    /// # Errors
    /// `NeuroGradError::LockError` if a shared tensor's lock is poisoned, and
    /// `NeuroGradError::KernelError` if a kernel sees extents inconsistent with
    /// the ones fixed at construction (a tensor was resized behind the
    /// operator's back).
    fn compute(&mut self) -> Result<(), NeuroGradError>;

    /// The wiring descriptor the operator was built from.
    fn io(&self) -> &OperatorIo;
}

/// Fixed input/output counts of an operator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub inputs: usize,
    pub outputs: usize,
}

impl Arity {
    pub const fn new(inputs: usize, outputs: usize) -> Self {
        Arity { inputs, outputs }
    }
}

/// Which branch of deferred shape resolution a construction takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeResolution {
    /// Size the dependent tensors from the carried hyperparameter.
    Originate(usize),
    /// Treat every tensor as already sized and check the kind's relations.
    Validate,
}

impl ShapeResolution {
    /// Originates only when the hyperparameter is present, every dependent
    /// tensor is still empty, and the driving inputs are already sized.
    pub fn decide(hyperparameter: Option<usize>, dependents_empty: bool, drivers_sized: bool) -> Self {
        match hyperparameter {
            Some(value) if dependents_empty && drivers_sized => ShapeResolution::Originate(value),
            _ => ShapeResolution::Validate,
        }
    }
}

/// Resolved wiring shared by every operator kind.
#[derive(Debug)]
pub struct OperatorBase<C: DeviceContext> {
    io: OperatorIo,
    inputs: Vec<SharedTensor<C>>,
    outputs: Vec<SharedTensor<C>>,
}

impl<C: DeviceContext> OperatorBase<C> {
    /// Resolves the descriptor's names against `table` after checking arity,
    /// element type and aliasing.
    ///
    /// # Errors
    /// * `ArityError` if the descriptor names the wrong number of tensors.
    /// * `DataTypeMismatch` if the descriptor's element type is not `dtype`.
    /// * `AliasedTensor` if a name is bound twice. Shape origination writes to
    ///   inputs (`w`, `b`) as well as outputs, so any repeat is rejected.
    pub fn resolve(
        io: OperatorIo,
        table: &mut TensorTable<C>,
        arity: Arity,
        dtype: DType,
    ) -> Result<Self, NeuroGradError> {
        if io.inputs.len() != arity.inputs || io.outputs.len() != arity.outputs {
            return Err(NeuroGradError::ArityError {
                operator: io.op_type.clone(),
                expected_inputs: arity.inputs,
                expected_outputs: arity.outputs,
                actual_inputs: io.inputs.len(),
                actual_outputs: io.outputs.len(),
            });
        }
        if io.dtype != dtype {
            return Err(NeuroGradError::DataTypeMismatch {
                operation: io.op_type.clone(),
                expected: dtype,
                actual: io.dtype,
            });
        }
        let mut seen = HashSet::new();
        for name in io.inputs.iter().chain(io.outputs.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(NeuroGradError::AliasedTensor {
                    operator: io.op_type.clone(),
                    name: name.clone(),
                });
            }
        }

        let inputs = io.inputs.iter().map(|n| table.get_or_create(n)).collect();
        let outputs = io.outputs.iter().map(|n| table.get_or_create(n)).collect();
        debug!(
            "Operator '{}': resolved inputs {:?} outputs {:?}",
            io.op_type, io.inputs, io.outputs
        );
        Ok(OperatorBase { io, inputs, outputs })
    }

    pub fn io(&self) -> &OperatorIo {
        &self.io
    }

    pub fn input(&self, i: usize) -> &SharedTensor<C> {
        &self.inputs[i]
    }

    pub fn output(&self, i: usize) -> &SharedTensor<C> {
        &self.outputs[i]
    }

    pub fn op_type(&self) -> &str {
        &self.io.op_type
    }
}

/// Dims of a non-empty rank-2 tensor, `ShapeMismatch` otherwise.
pub(crate) fn matrix_dims<C: DeviceContext>(
    tensor: &Tensor<C>,
    operation: &str,
) -> Result<(usize, usize), NeuroGradError> {
    match *tensor.shape() {
        [rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
        _ => Err(NeuroGradError::ShapeMismatch {
            expected: Vec::new(),
            actual: tensor.shape().to_vec(),
            operation: format!("{}: expected a non-empty matrix", operation),
        }),
    }
}

/// Element type check for tensors an operator did not size itself.
pub(crate) fn ensure_dtype<C: DeviceContext>(
    tensor: &Tensor<C>,
    dtype: DType,
    operation: &str,
) -> Result<(), NeuroGradError> {
    if !tensor.is_empty() && tensor.dtype() != dtype {
        return Err(NeuroGradError::DataTypeMismatch {
            operation: operation.to_string(),
            expected: dtype,
            actual: tensor.dtype(),
        });
    }
    Ok(())
}

/// Checks an algebraic shape relation.
pub(crate) fn ensure_shape(
    holds: bool,
    expected: &[usize],
    actual: &[usize],
    operation: &str,
) -> Result<(), NeuroGradError> {
    if holds {
        Ok(())
    } else {
        Err(NeuroGradError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            operation: operation.to_string(),
        })
    }
}
