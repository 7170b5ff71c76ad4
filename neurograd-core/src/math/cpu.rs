// Host kernels: zero-copy ndarray views over the caller's slices.

use ndarray::linalg::{general_mat_mul, general_mat_vec_mul};
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, ShapeBuilder};

use crate::buffer::CpuContext;
use crate::error::NeuroGradError;
use crate::math::Blas;
use crate::types::Element;

fn kernel_error(kernel: &str, reason: String) -> NeuroGradError {
    NeuroGradError::KernelError {
        kernel: kernel.to_string(),
        reason,
    }
}

fn check_len(kernel: &str, operand: &str, len: usize, needed: usize) -> Result<(), NeuroGradError> {
    if len < needed {
        return Err(kernel_error(
            kernel,
            format!("operand {} has {} elements, needs {}", operand, len, needed),
        ));
    }
    Ok(())
}

/// Number of elements a `rows x cols` row-major matrix with leading dimension
/// `ld` spans in its backing slice.
fn stored_extent(kernel: &str, operand: &str, rows: usize, cols: usize, ld: usize) -> Result<usize, NeuroGradError> {
    if rows == 0 || cols == 0 {
        return Ok(0);
    }
    if rows > 1 && ld < cols {
        return Err(kernel_error(
            kernel,
            format!("operand {}: leading dimension {} is smaller than {} columns", operand, ld, cols),
        ));
    }
    (rows - 1)
        .checked_mul(ld)
        .and_then(|v| v.checked_add(cols))
        .ok_or_else(|| kernel_error(kernel, format!("operand {}: extent overflows usize", operand)))
}

fn matrix_view<'a, T: Element>(
    kernel: &str,
    operand: &str,
    data: &'a [T],
    rows: usize,
    cols: usize,
    ld: usize,
) -> Result<ArrayView2<'a, T>, NeuroGradError> {
    let extent = stored_extent(kernel, operand, rows, cols, ld)?;
    check_len(kernel, operand, data.len(), extent)?;
    ArrayView2::from_shape((rows, cols).strides((ld, 1)), &data[..extent])
        .map_err(|e| kernel_error(kernel, format!("operand {}: {}", operand, e)))
}

fn matrix_view_mut<'a, T: Element>(
    kernel: &str,
    operand: &str,
    data: &'a mut [T],
    rows: usize,
    cols: usize,
    ld: usize,
) -> Result<ArrayViewMut2<'a, T>, NeuroGradError> {
    let extent = stored_extent(kernel, operand, rows, cols, ld)?;
    check_len(kernel, operand, data.len(), extent)?;
    ArrayViewMut2::from_shape((rows, cols).strides((ld, 1)), &mut data[..extent])
        .map_err(|e| kernel_error(kernel, format!("operand {}: {}", operand, e)))
}

impl<T: Element> Blas<T> for CpuContext {
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
    ) -> Result<(), NeuroGradError> {
        let a_op = if trans_a {
            matrix_view("gemm", "A", a, k, m, lda)?.reversed_axes()
        } else {
            matrix_view("gemm", "A", a, m, k, lda)?
        };
        let b_op = if trans_b {
            matrix_view("gemm", "B", b, n, k, ldb)?.reversed_axes()
        } else {
            matrix_view("gemm", "B", b, k, n, ldb)?
        };
        let mut c_view = matrix_view_mut("gemm", "C", c, m, n, ldc)?;

        if beta == T::zero() {
            c_view.fill(T::zero());
            general_mat_mul(alpha, &a_op, &b_op, T::one(), &mut c_view);
        } else {
            general_mat_mul(alpha, &a_op, &b_op, beta, &mut c_view);
        }
        Ok(())
    }

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
    ) -> Result<(), NeuroGradError> {
        let stored = matrix_view("gemv", "A", a, m, n, lda)?;
        let (a_op, x_len, y_len) = if trans_a {
            (stored.reversed_axes(), m, n)
        } else {
            (stored, n, m)
        };
        check_len("gemv", "x", x.len(), x_len)?;
        check_len("gemv", "y", y.len(), y_len)?;
        let x_view = ArrayView1::from(&x[..x_len]);
        let mut y_view = ArrayViewMut1::from(&mut y[..y_len]);

        if beta == T::zero() {
            y_view.fill(T::zero());
            general_mat_vec_mul(alpha, &a_op, &x_view, T::one(), &mut y_view);
        } else {
            general_mat_vec_mul(alpha, &a_op, &x_view, beta, &mut y_view);
        }
        Ok(())
    }

    fn axpy(size: usize, alpha: T, x: &[T], y: &mut [T]) -> Result<(), NeuroGradError> {
        check_len("axpy", "x", x.len(), size)?;
        check_len("axpy", "y", y.len(), size)?;
        let mut y_view = ArrayViewMut1::from(&mut y[..size]);
        y_view.scaled_add(alpha, &ArrayView1::from(&x[..size]));
        Ok(())
    }

    fn scal(size: usize, alpha: T, x: &[T], y: &mut [T]) -> Result<(), NeuroGradError> {
        check_len("scal", "x", x.len(), size)?;
        check_len("scal", "y", y.len(), size)?;
        let mut y_view = ArrayViewMut1::from(&mut y[..size]);
        if alpha == T::zero() {
            y_view.fill(T::zero());
        } else {
            y_view.zip_mut_with(&ArrayView1::from(&x[..size]), |y, &x| *y = alpha * x);
        }
        Ok(())
    }

    fn scal_in_place(size: usize, alpha: T, y: &mut [T]) -> Result<(), NeuroGradError> {
        check_len("scal", "y", y.len(), size)?;
        let mut y_view = ArrayViewMut1::from(&mut y[..size]);
        if alpha == T::zero() {
            y_view.fill(T::zero());
        } else {
            y_view.map_inplace(|v| *v = *v * alpha);
        }
        Ok(())
    }
}
