use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace, warn};
use num_traits::NumCast;
use thiserror::Error;

use crate::error::NeuroGradError;
use crate::math::Blas;
use crate::operators::Operator;
use crate::tensor::{read_tensor, write_tensor, SharedTensor, Tensor};
use crate::types::Element;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed at element {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },
    #[error("Numerical gradient is NaN or infinite at element {element_index}: {numerical_grad:?}")]
    NumericalGradNaNOrInfinite {
        element_index: usize,
        numerical_grad: f64,
    },
    #[error("Operator compute failed at element {element_index}: {source}")]
    ComputeError {
        element_index: usize,
        source: NeuroGradError,
    },
    #[error("Epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),
    #[error("Scaler must be finite and non-zero, got {0}")]
    InvalidScaler(f64),
    #[error("Tensor error during gradient check: {0}")]
    TensorError(NeuroGradError),
}

impl From<NeuroGradError> for GradCheckError {
    fn from(err: NeuroGradError) -> Self {
        GradCheckError::TensorError(err)
    }
}

/// Step and acceptance threshold of a gradient check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheckConfig {
    /// Finite-difference step.
    pub epsilon: f64,
    /// Largest accepted `|analytical - numerical|` in [`GradientChecker::check`].
    pub tolerance: f64,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        GradCheckConfig {
            epsilon: 1e-2,
            tolerance: 1e-3,
        }
    }
}

/// Central-difference validator for an operator's analytic gradient.
///
/// For every element `theta[i]` the checker perturbs it by `+epsilon` and
/// `-epsilon`, recomputes the operator each time, and estimates
/// `sum((y+ - y-) / (2 * epsilon)) / scaler`. `scaler` must match the
/// reduction the analytic gradient applies (the batch size for a gradient
/// averaged over the batch, 1 otherwise). `theta[i]` is restored before the
/// next element.
///
/// Summing `y` means the estimate is the gradient of `sum(y)`, so the
/// analytic gradient under test must have been computed with an all-ones
/// upstream gradient.
#[derive(Debug, Clone)]
pub struct GradientChecker<T: Element> {
    config: GradCheckConfig,
    _marker: PhantomData<T>,
}

impl<T: Element> Default for GradientChecker<T> {
    fn default() -> Self {
        Self::with_config(GradCheckConfig::default())
    }
}

impl<T: Element> GradientChecker<T> {
    /// Checker with step `epsilon` and the default tolerance.
    pub fn new(epsilon: f64) -> Self {
        Self::with_config(GradCheckConfig {
            epsilon,
            ..GradCheckConfig::default()
        })
    }

    pub fn with_config(config: GradCheckConfig) -> Self {
        GradientChecker {
            config,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &GradCheckConfig {
        &self.config
    }

    /// Returns a tensor shaped like `theta` holding
    /// `analytical[i] - numerical[i]` for every element.
    ///
    /// # Errors
    /// * `InvalidEpsilon` / `InvalidScaler` for a non-positive step or a zero scaler.
    /// * `TensorError` if `theta` and `y` are the same tensor, or if
    ///   `analytical` does not hold one value per element of `theta`.
    /// * `ComputeError` if the operator fails; `theta` is restored first.
    pub fn run<O, C>(
        &self,
        op: &mut O,
        theta: &SharedTensor<C>,
        y: &SharedTensor<C>,
        analytical: &SharedTensor<C>,
        scaler: T,
    ) -> Result<Tensor<C>, GradCheckError>
    where
        O: Operator + ?Sized,
        C: Blas<T>,
    {
        let mut discrepancies = Vec::new();
        self.sweep(op, theta, y, analytical, scaler, |_, analytic, numeric| {
            discrepancies.push(analytic - numeric);
            Ok(())
        })?;

        let mut result = Tensor::new();
        result.reshape_like(&*read_tensor(theta)?)?;
        result.copy_from_slice(&discrepancies)?;
        Ok(result)
    }

    /// Runs the same sweep as [`run`](Self::run) and fails on the first element
    /// whose discrepancy exceeds the configured tolerance.
    pub fn check<O, C>(
        &self,
        op: &mut O,
        theta: &SharedTensor<C>,
        y: &SharedTensor<C>,
        analytical: &SharedTensor<C>,
        scaler: T,
    ) -> Result<(), GradCheckError>
    where
        O: Operator + ?Sized,
        C: Blas<T>,
    {
        let tolerance = self.config.tolerance;
        self.sweep(op, theta, y, analytical, scaler, |element_index, analytic, numeric| {
            let analytical_grad = to_f64(analytic);
            let numerical_grad = to_f64(numeric);
            if !numerical_grad.is_finite() {
                return Err(GradCheckError::NumericalGradNaNOrInfinite {
                    element_index,
                    numerical_grad,
                });
            }
            let difference = (analytical_grad - numerical_grad).abs();
            if !(difference <= tolerance) {
                return Err(GradCheckError::GradientMismatch {
                    element_index,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
            Ok(())
        })
    }

    /// Perturbs each element of `theta` in turn and hands
    /// `(index, analytical, numerical)` to `visit`.
    fn sweep<O, C, F>(
        &self,
        op: &mut O,
        theta: &SharedTensor<C>,
        y: &SharedTensor<C>,
        analytical: &SharedTensor<C>,
        scaler: T,
        mut visit: F,
    ) -> Result<(), GradCheckError>
    where
        O: Operator + ?Sized,
        C: Blas<T>,
        F: FnMut(usize, T, T) -> Result<(), GradCheckError>,
    {
        let epsilon = self.config.epsilon;
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(GradCheckError::InvalidEpsilon(epsilon));
        }
        let e = <T as NumCast>::from(epsilon)
            .filter(|e| e.is_normal())
            .ok_or(GradCheckError::InvalidEpsilon(epsilon))?;
        if scaler == T::zero() || !scaler.is_finite() {
            return Err(GradCheckError::InvalidScaler(to_f64(scaler)));
        }
        if Arc::ptr_eq(theta, y) {
            return Err(NeuroGradError::AliasedTensor {
                operator: op.io().op_type.clone(),
                name: "theta/y".to_string(),
            }
            .into());
        }

        let analytical = read_tensor(analytical)?.to_vec::<T>()?;
        let size = read_tensor(theta)?.size();
        if analytical.len() != size {
            return Err(NeuroGradError::ShapeMismatch {
                expected: read_tensor(theta)?.shape().to_vec(),
                actual: vec![analytical.len()],
                operation: "gradient check: analytical gradient size".to_string(),
            }
            .into());
        }
        if size == 0 {
            warn!("GradientChecker: theta is empty, nothing to check");
            return Ok(());
        }
        debug!(
            "GradientChecker: checking {} elements of '{}' with epsilon {}",
            size,
            op.io().op_type,
            epsilon
        );

        let two_e = e + e;
        let mut numerical = Vec::new();
        for i in 0..size {
            let val = read_tensor(theta)?.as_slice::<T>()?[i];

            set_element(theta, i, val + e)?;
            if let Err(source) = op.compute() {
                set_element(theta, i, val)?;
                return Err(GradCheckError::ComputeError { element_index: i, source });
            }
            numerical.clear();
            numerical.extend_from_slice(read_tensor(y)?.as_slice::<T>()?);

            set_element(theta, i, val - e)?;
            if let Err(source) = op.compute() {
                set_element(theta, i, val)?;
                return Err(GradCheckError::ComputeError { element_index: i, source });
            }
            {
                let y = read_tensor(y)?;
                <C as Blas<T>>::axpy(numerical.len(), -T::one(), y.as_slice::<T>()?, &mut numerical)?;
            }
            <C as Blas<T>>::scal_in_place(numerical.len(), T::one() / two_e, &mut numerical)?;
            let estimate = numerical.iter().fold(T::zero(), |acc, &v| acc + v) / scaler;

            set_element(theta, i, val)?;
            trace!(
                "GradientChecker: element {} analytical {:?} numerical {:?}",
                i,
                analytical[i],
                estimate
            );
            visit(i, analytical[i], estimate)?;
        }
        debug!("GradientChecker: swept {} elements", size);
        Ok(())
    }
}

fn set_element<C: Blas<T>, T: Element>(theta: &SharedTensor<C>, i: usize, value: T) -> Result<(), NeuroGradError> {
    write_tensor(theta)?.as_mut_slice::<T>()?[i] = value;
    Ok(())
}

fn to_f64<T: Element>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
#[path = "grad_check_test.rs"]
mod tests;
