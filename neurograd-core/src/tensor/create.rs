// src/tensor/create.rs

use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::NeuroGradError;
use crate::tensor::{element_count, Tensor};
use crate::types::Element;

/// Creates a new tensor filled with `value` with the specified shape.
/// Currently creates the tensor on the CPU.
pub fn full<T: Element>(shape: &[usize], value: T) -> Result<Tensor, NeuroGradError> {
    let mut tensor = Tensor::new();
    tensor.resize::<T>(shape)?;
    tensor.fill(value)?;
    Ok(tensor)
}

/// Creates a new tensor filled with zeros with the specified shape.
pub fn zeros<T: Element>(shape: &[usize]) -> Result<Tensor, NeuroGradError> {
    full(shape, T::zero())
}

/// Creates a new tensor filled with ones with the specified shape.
pub fn ones<T: Element>(shape: &[usize]) -> Result<Tensor, NeuroGradError> {
    full(shape, T::one())
}

// Random creation takes the RNG from the caller so tests and gradient checks
// can be made reproducible with a seeded generator.

/// Samples every element uniformly from `[low, high)`.
pub fn rand_uniform<T, R>(shape: &[usize], low: T, high: T, rng: &mut R) -> Result<Tensor, NeuroGradError>
where
    T: Element + SampleUniform,
    R: Rng,
{
    if low.partial_cmp(&high) != Some(std::cmp::Ordering::Less) {
        return Err(NeuroGradError::InternalError(format!(
            "rand_uniform requires low < high, got [{:?}, {:?})",
            low, high
        )));
    }
    let numel = element_count(shape);
    let data_vec: Vec<T> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
    Tensor::from_vec(data_vec, shape.to_vec())
}

/// Samples every element from the standard normal distribution.
pub fn randn<T, R>(shape: &[usize], rng: &mut R) -> Result<Tensor, NeuroGradError>
where
    T: Element,
    StandardNormal: Distribution<T>,
    R: Rng,
{
    let numel = element_count(shape);
    let data_vec: Vec<T> = (0..numel).map(|_| StandardNormal.sample(rng)).collect();
    Tensor::from_vec(data_vec, shape.to_vec())
}
