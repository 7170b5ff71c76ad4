//! # Numeric kernel set
//!
//! The four dense kernels operators are written against. Each device context
//! type implements [`Blas`] for the element types it supports, so the pair
//! (element type, context type) selects the implementation at compile time and
//! operator code never names a backend.
//!
//! Matrices are row-major. A leading dimension (`lda`, `ldb`, `ldc`) is the
//! distance in elements between the starts of two consecutive rows of the
//! matrix *as stored*, so it must be at least the stored column count.
//!
//! `alpha`/`beta` follow the BLAS convention with one tightening: `beta == 0`
//! clears the destination instead of multiplying it, so NaN or infinite values
//! already there never leak into the result.

mod cpu;

use crate::device::DeviceContext;
use crate::error::NeuroGradError;
use crate::types::Element;

/// Dense linear algebra kernels for element type `T` on this device context.
pub trait Blas<T: Element>: DeviceContext {
    /// `C = alpha * op(A) * op(B) + beta * C`.
    ///
    /// `op(A)` is `m x k` and `op(B)` is `k x n`; `C` is `m x n`. With
    /// `trans_a` the stored `A` is `k x m`, with `trans_b` the stored `B` is
    /// `n x k`.
    #[allow(clippy::too_many_arguments)]
    fn gemm(
        trans_a: bool,
        trans_b: bool,
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: &[T],
        lda: usize,
        b: &[T],
        ldb: usize,
        beta: T,
        c: &mut [T],
        ldc: usize,
    ) -> Result<(), NeuroGradError>;

    /// `y = alpha * op(A) * x + beta * y` where the stored `A` is `m x n`.
    ///
    /// Without `trans_a`, `x` has `n` elements and `y` has `m`; with it, `x`
    /// has `m` and `y` has `n`.
    #[allow(clippy::too_many_arguments)]
    fn gemv(
        trans_a: bool,
        m: usize,
        n: usize,
        alpha: T,
        a: &[T],
        lda: usize,
        x: &[T],
        beta: T,
        y: &mut [T],
    ) -> Result<(), NeuroGradError>;

    /// `y += alpha * x` over the first `size` elements.
    fn axpy(size: usize, alpha: T, x: &[T], y: &mut [T]) -> Result<(), NeuroGradError>;

    /// `y = alpha * x` over the first `size` elements. `alpha == 0` writes
    /// zeros without reading `x`.
    fn scal(size: usize, alpha: T, x: &[T], y: &mut [T]) -> Result<(), NeuroGradError>;

    /// `y = alpha * y`, the in-place form of [`scal`](Blas::scal).
    fn scal_in_place(size: usize, alpha: T, y: &mut [T]) -> Result<(), NeuroGradError>;
}
