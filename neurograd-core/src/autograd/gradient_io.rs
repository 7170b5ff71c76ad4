use std::fmt::Debug;

use log::debug;

use crate::error::NeuroGradError;
use crate::operators::{gradient_kind, OperatorIo, FC};

/// Suffix naming the gradient tensor of a forward tensor (`y` -> `y_grad`).
pub const GRAD_SUFFIX: &str = "_grad";

/// Name of the gradient tensor paired with `name`.
pub fn grad_name(name: &str) -> String {
    format!("{}{}", name, GRAD_SUFFIX)
}

/// Derives the wiring of a backward operator from the wiring of its forward
/// operator.
///
/// The derivation is purely by naming convention: the upstream gradient of a
/// forward output `y` is the tensor named `y_grad`, and the backward operator
/// writes `<input>_grad` for each forward input. That convention is the only
/// contract between forward and backward subgraphs.
pub trait GradientIo: Debug + Send + Sync {
    /// Kind name of the forward operator this derivation applies to.
    fn forward_kind(&self) -> &'static str;

    /// Builds the backward descriptor for `forward`.
    ///
    /// # Errors
    /// `NeuroGradError::ArityError` if `forward` does not have the forward
    /// kind's input/output counts.
    fn gradient_io(&self, forward: &OperatorIo) -> Result<OperatorIo, NeuroGradError>;
}

/// Gradient wiring of the fully-connected layer.
///
/// `FC` with inputs `[x, w, b]` and output `[y]` becomes `FC_<dtype>_Gradient`
/// with inputs `[x, w, y_grad]` and outputs `[w_grad, b_grad, x_grad]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullyConnectedGradientIo;

impl GradientIo for FullyConnectedGradientIo {
    fn forward_kind(&self) -> &'static str {
        FC
    }

    fn gradient_io(&self, forward: &OperatorIo) -> Result<OperatorIo, NeuroGradError> {
        let (x, w, b, y) = match (forward.inputs.as_slice(), forward.outputs.as_slice()) {
            ([x, w, b], [y]) => (x, w, b, y),
            _ => {
                return Err(NeuroGradError::ArityError {
                    operator: forward.op_type.clone(),
                    expected_inputs: 3,
                    expected_outputs: 1,
                    actual_inputs: forward.inputs.len(),
                    actual_outputs: forward.outputs.len(),
                })
            }
        };
        let backward = OperatorIo {
            op_type: gradient_kind(&forward.op_type, forward.dtype),
            dtype: forward.dtype,
            inputs: vec![x.clone(), w.clone(), grad_name(y)],
            outputs: vec![grad_name(w), grad_name(b), grad_name(x)],
            param: forward.param.clone(),
        };
        debug!(
            "GradientIo: {} {:?} -> {} {:?}",
            forward.op_type, forward.outputs, backward.op_type, backward.outputs
        );
        Ok(backward)
    }
}

static FC_GRADIENT_IO: FullyConnectedGradientIo = FullyConnectedGradientIo;

/// Looks up the gradient derivation for a forward kind.
///
/// Returns `None` for kinds without a gradient, such as `OneHot`.
pub fn gradient_io_for(forward_kind: &str) -> Option<&'static dyn GradientIo> {
    match forward_kind {
        FC => Some(&FC_GRADIENT_IO),
        _ => None,
    }
}
