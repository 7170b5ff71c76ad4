use std::marker::PhantomData;

use log::debug;
use num_traits::NumCast;

use crate::buffer::CpuContext;
use crate::error::NeuroGradError;
use crate::math::Blas;
use crate::operators::io::{OperatorIo, PARAM_UNITS};
use crate::operators::{
    ensure_dtype, ensure_shape, matrix_dims, Arity, Operator, OperatorBase, ShapeResolution,
};
use crate::tensor::{read_tensor, write_tensor, Tensor, TensorTable};
use crate::types::Element;

/// Fully-connected (dense) layer: `y = x · wᵗ + b`.
///
/// Wiring: inputs `[x, w, b]`, output `[y]`, with `x: batch × in`,
/// `w: units × in`, `b: units` and `y: batch × units`.
///
/// When the descriptor carries `"Units"`, `x` is sized and `w`, `b`, `y` are
/// all still empty, construction sizes `w`, `b` and `y`. Otherwise the
/// existing shapes are checked.
#[derive(Debug)]
pub struct FullyConnectedOp<T: Element, C: Blas<T> = CpuContext> {
    base: OperatorBase<C>,
    /// Batch size.
    m: usize,
    /// Output size.
    n: usize,
    /// Input size (contraction length).
    k: usize,
    /// `m` ones, broadcasting `b` over the batch through a rank-1 gemm.
    bias_multiplier: Tensor<C>,
    _marker: PhantomData<T>,
}

impl<T: Element, C: Blas<T>> FullyConnectedOp<T, C> {
    pub fn new(io: OperatorIo, table: &mut TensorTable<C>) -> Result<Self, NeuroGradError> {
        let base = OperatorBase::resolve(io, table, Arity::new(3, 1), T::DTYPE)?;
        let op = base.op_type().to_string();
        let units = base.io().param.get_opt::<usize>(PARAM_UNITS)?;
        let (x, w, b, y) = (base.input(0), base.input(1), base.input(2), base.output(0));

        let resolution = ShapeResolution::decide(
            units,
            read_tensor(w)?.is_empty() && read_tensor(b)?.is_empty() && read_tensor(y)?.is_empty(),
            !read_tensor(x)?.is_empty(),
        );
        debug!("{}: shape resolution {:?}", op, resolution);

        let (m, k) = {
            let x = read_tensor(x)?;
            ensure_dtype(&x, T::DTYPE, &op)?;
            matrix_dims(&x, &format!("{} x", op))?
        };

        let n = match resolution {
            ShapeResolution::Originate(units) => {
                write_tensor(w)?.resize::<T>(&[units, k])?;
                write_tensor(b)?.resize::<T>(&[units])?;
                write_tensor(y)?.resize::<T>(&[m, units])?;
                units
            }
            ShapeResolution::Validate => {
                let (w, b, y) = (read_tensor(w)?, read_tensor(b)?, read_tensor(y)?);
                for t in [&w, &b, &y] {
                    ensure_dtype(t, T::DTYPE, &op)?;
                }
                let (n, w_k) = matrix_dims(&w, &format!("{} w", op))?;
                ensure_shape(w_k == k, &[n, k], w.shape(), &format!("{}: x.dim1 == w.dim1", op))?;
                if let Some(units) = units {
                    ensure_shape(units == n, &[units, k], w.shape(), &format!("{}: Units == w.dim0", op))?;
                }
                ensure_shape(y.shape() == [m, n], &[m, n], y.shape(), &format!("{}: y == [x.dim0, w.dim0]", op))?;
                ensure_shape(b.size() == n, &[n], b.shape(), &format!("{}: b.size == w.dim0", op))?;
                n
            }
        };

        let mut bias_multiplier = Tensor::new();
        bias_multiplier.resize::<T>(&[m])?;
        bias_multiplier.fill(T::one())?;

        debug!("{}: constructed with m={} n={} k={}", op, m, n, k);
        Ok(FullyConnectedOp {
            base,
            m,
            n,
            k,
            bias_multiplier,
            _marker: PhantomData,
        })
    }

    /// Cached `(batch, units, input size)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.m, self.n, self.k)
    }
}

impl<T: Element, C: Blas<T>> Operator for FullyConnectedOp<T, C> {
    fn compute(&mut self) -> Result<(), NeuroGradError> {
        let (m, n, k) = (self.m, self.n, self.k);
        let x = read_tensor(self.base.input(0))?;
        let w = read_tensor(self.base.input(1))?;
        let b = read_tensor(self.base.input(2))?;
        let mut y = write_tensor(self.base.output(0))?;
        let y = y.as_mut_slice::<T>()?;

        // y = x * w^T
        <C as Blas<T>>::gemm(
            false,
            true,
            m,
            n,
            k,
            T::one(),
            x.as_slice::<T>()?,
            k,
            w.as_slice::<T>()?,
            k,
            T::zero(),
            y,
            n,
        )?;
        // y += ones(m) * b^T
        <C as Blas<T>>::gemm(
            false,
            false,
            m,
            n,
            1,
            T::one(),
            self.bias_multiplier.as_slice::<T>()?,
            1,
            b.as_slice::<T>()?,
            n,
            T::one(),
            y,
            n,
        )
    }

    fn io(&self) -> &OperatorIo {
        self.base.io()
    }
}

/// Backward pass of [`FullyConnectedOp`].
///
/// Wiring: inputs `[x, w, dy]`, outputs `[dw, db, dx]`. Computes, in order,
/// `db = dyᵗ · ones`, `dw = dyᵗ · x`, `dx = dy · w`, then scales `db` and `dw`
/// by `1 / batch`. `dx` is left unscaled.
#[derive(Debug)]
pub struct FullyConnectedGradientOp<T: Element, C: Blas<T> = CpuContext> {
    base: OperatorBase<C>,
    m: usize,
    n: usize,
    k: usize,
    bias_multiplier: Tensor<C>,
    _marker: PhantomData<T>,
}

impl<T: Element, C: Blas<T>> FullyConnectedGradientOp<T, C> {
    pub fn new(io: OperatorIo, table: &mut TensorTable<C>) -> Result<Self, NeuroGradError> {
        let base = OperatorBase::resolve(io, table, Arity::new(3, 3), T::DTYPE)?;
        let op = base.op_type().to_string();
        let units = base.io().param.get_opt::<usize>(PARAM_UNITS)?;
        let (x, w, dy) = (base.input(0), base.input(1), base.input(2));
        let (dw, db, dx) = (base.output(0), base.output(1), base.output(2));

        let resolution = ShapeResolution::decide(
            units,
            read_tensor(dw)?.is_empty() && read_tensor(db)?.is_empty() && read_tensor(dx)?.is_empty(),
            !read_tensor(x)?.is_empty() && !read_tensor(w)?.is_empty() && !read_tensor(dy)?.is_empty(),
        );
        debug!("{}: shape resolution {:?}", op, resolution);

        // x, w and dy come from upstream in both branches.
        let (m, k, n) = {
            let (x, w, dy) = (read_tensor(x)?, read_tensor(w)?, read_tensor(dy)?);
            for t in [&x, &w, &dy] {
                ensure_dtype(t, T::DTYPE, &op)?;
            }
            let (m, k) = matrix_dims(&x, &format!("{} x", op))?;
            let (n, w_k) = matrix_dims(&w, &format!("{} w", op))?;
            ensure_shape(w_k == k, &[n, k], w.shape(), &format!("{}: x.dim1 == w.dim1", op))?;
            ensure_shape(dy.size() == m * n, &[m, n], dy.shape(), &format!("{}: dy.size == batch * w.dim0", op))?;
            (m, k, n)
        };

        match resolution {
            ShapeResolution::Originate(units) => {
                ensure_shape(units == n, &[units], &[n], &format!("{}: Units == w.dim0", op))?;
                write_tensor(dw)?.reshape_like(&*read_tensor(w)?)?;
                write_tensor(db)?.resize::<T>(&[units])?;
                write_tensor(dx)?.reshape_like(&*read_tensor(x)?)?;
            }
            ShapeResolution::Validate => {
                let (dw, db, dx) = (read_tensor(dw)?, read_tensor(db)?, read_tensor(dx)?);
                for t in [&dw, &db, &dx] {
                    ensure_dtype(t, T::DTYPE, &op)?;
                }
                ensure_shape(dw.size() == n * k, &[n, k], dw.shape(), &format!("{}: dw ~ w", op))?;
                ensure_shape(db.size() == n, &[n], db.shape(), &format!("{}: db.size == w.dim0", op))?;
                ensure_shape(dx.size() == m * k, &[m, k], dx.shape(), &format!("{}: dx ~ x", op))?;
            }
        }

        let mut bias_multiplier = Tensor::new();
        bias_multiplier.resize::<T>(&[m])?;
        bias_multiplier.fill(T::one())?;

        debug!("{}: constructed with m={} n={} k={}", op, m, n, k);
        Ok(FullyConnectedGradientOp {
            base,
            m,
            n,
            k,
            bias_multiplier,
            _marker: PhantomData,
        })
    }

    /// Cached `(batch, units, input size)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.m, self.n, self.k)
    }
}

impl<T: Element, C: Blas<T>> Operator for FullyConnectedGradientOp<T, C> {
    fn compute(&mut self) -> Result<(), NeuroGradError> {
        let (m, n, k) = (self.m, self.n, self.k);
        let x = read_tensor(self.base.input(0))?;
        let w = read_tensor(self.base.input(1))?;
        let dy = read_tensor(self.base.input(2))?;
        let mut dw = write_tensor(self.base.output(0))?;
        let mut db = write_tensor(self.base.output(1))?;
        let mut dx = write_tensor(self.base.output(2))?;
        let (x, w, dy) = (x.as_slice::<T>()?, w.as_slice::<T>()?, dy.as_slice::<T>()?);
        let (dw, db, dx) = (
            dw.as_mut_slice::<T>()?,
            db.as_mut_slice::<T>()?,
            dx.as_mut_slice::<T>()?,
        );

        // db = dy^T * ones(m)
        <C as Blas<T>>::gemv(
            true,
            m,
            n,
            T::one(),
            dy,
            n,
            self.bias_multiplier.as_slice::<T>()?,
            T::zero(),
            db,
        )?;
        // dw = dy^T * x
        <C as Blas<T>>::gemm(true, false, n, k, m, T::one(), dy, n, x, k, T::zero(), dw, k)?;
        // dx = dy * w
        <C as Blas<T>>::gemm(false, false, m, k, n, T::one(), dy, n, w, k, T::zero(), dx, k)?;

        let scale = T::one() / <T as NumCast>::from(m).ok_or_else(|| NeuroGradError::KernelError {
            kernel: "scal".to_string(),
            reason: format!("batch size {} is not representable", m),
        })?;
        <C as Blas<T>>::scal_in_place(n, scale, db)?;
        <C as Blas<T>>::scal_in_place(n * k, scale, dw)
    }

    fn io(&self) -> &OperatorIo {
        self.base.io()
    }
}

#[cfg(test)]
#[path = "fully_connected_test.rs"]
mod tests;
