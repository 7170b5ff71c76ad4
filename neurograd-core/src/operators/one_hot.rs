use std::marker::PhantomData;

use log::{debug, warn};

use crate::buffer::CpuContext;
use crate::error::NeuroGradError;
use crate::math::Blas;
use crate::operators::io::{OperatorIo, PARAM_DIM};
use crate::operators::{
    ensure_dtype, ensure_shape, matrix_dims, Arity, Operator, OperatorBase, ShapeResolution,
};
use crate::tensor::{read_tensor, write_tensor, TensorTable};
use crate::types::Element;

/// One-hot encoder: `x: batch` class indices in, `y: batch × dim` out.
///
/// Class indices are stored in the operator's float element type and
/// truncated toward zero. Every index is checked against `dim` before `y` is
/// touched.
#[derive(Debug)]
pub struct OneHotOp<T: Element, C: Blas<T> = CpuContext> {
    base: OperatorBase<C>,
    batch: usize,
    dim: usize,
    _marker: PhantomData<T>,
}

impl<T: Element, C: Blas<T>> OneHotOp<T, C> {
    pub fn new(io: OperatorIo, table: &mut TensorTable<C>) -> Result<Self, NeuroGradError> {
        let base = OperatorBase::resolve(io, table, Arity::new(1, 1), T::DTYPE)?;
        let op = base.op_type().to_string();
        let dim = base.io().param.get_opt::<usize>(PARAM_DIM)?;
        let (x, y) = (base.input(0), base.output(0));

        let resolution = ShapeResolution::decide(dim, read_tensor(y)?.is_empty(), !read_tensor(x)?.is_empty());
        debug!("{}: shape resolution {:?}", op, resolution);

        let batch = {
            let x = read_tensor(x)?;
            ensure_dtype(&x, T::DTYPE, &op)?;
            let batch = x.shape().first().copied().unwrap_or(0);
            ensure_shape(
                batch > 0 && x.size() == batch,
                &[batch],
                x.shape(),
                &format!("{}: x holds one class index per row", op),
            )?;
            batch
        };

        let dim = match resolution {
            ShapeResolution::Originate(dim) => {
                write_tensor(y)?.resize::<T>(&[batch, dim])?;
                dim
            }
            ShapeResolution::Validate => {
                let y = read_tensor(y)?;
                ensure_dtype(&y, T::DTYPE, &op)?;
                let (rows, y_dim) = matrix_dims(&y, &format!("{} y", op))?;
                ensure_shape(rows == batch, &[batch, y_dim], y.shape(), &format!("{}: y.dim0 == x.dim0", op))?;
                if let Some(dim) = dim {
                    ensure_shape(dim == y_dim, &[batch, dim], y.shape(), &format!("{}: Dim == y.dim1", op))?;
                }
                y_dim
            }
        };

        debug!("{}: constructed with batch={} dim={}", op, batch, dim);
        Ok(OneHotOp {
            base,
            batch,
            dim,
            _marker: PhantomData,
        })
    }

    /// Number of classes.
    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl<T: Element, C: Blas<T>> Operator for OneHotOp<T, C> {
    fn compute(&mut self) -> Result<(), NeuroGradError> {
        let (batch, dim) = (self.batch, self.dim);
        let x = read_tensor(self.base.input(0))?;
        ensure_shape(
            x.size() == batch,
            &[batch],
            x.shape(),
            &format!("{}: x changed size since construction", self.base.op_type()),
        )?;
        let classes = x
            .as_slice::<T>()?
            .iter()
            .enumerate()
            .map(|(row, value)| match value.to_usize() {
                Some(class) if class < dim => Ok(class),
                other => {
                    warn!("{}: class value {:?} in row {} outside [0, {})", self.base.op_type(), value, row, dim);
                    Err(NeuroGradError::IndexOutOfBounds {
                        index: vec![row, other.unwrap_or(usize::MAX)],
                        shape: vec![batch, dim],
                    })
                }
            })
            .collect::<Result<Vec<usize>, NeuroGradError>>()?;

        let mut y = write_tensor(self.base.output(0))?;
        let y = y.as_mut_slice::<T>()?;
        <C as Blas<T>>::scal_in_place(batch * dim, T::zero(), y)?;
        for (row, class) in classes.into_iter().enumerate() {
            y[row * dim + class] = T::one();
        }
        Ok(())
    }

    fn io(&self) -> &OperatorIo {
        self.base.io()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::ONE_HOT;
    use crate::tensor::Tensor;
    use crate::types::DType;
    use crate::utils::testing::{check_tensor_near, create_test_tensor};

    fn one_hot_io(dtype: DType, dim: Option<usize>) -> OperatorIo {
        let mut builder = OperatorIo::builder(ONE_HOT, dtype).input("label").output("onehot");
        if let Some(dim) = dim {
            builder = builder.param(PARAM_DIM, dim);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_one_hot_encodes_rows() {
        let mut table: TensorTable = TensorTable::new();
        table.insert("label", create_test_tensor(vec![0.0f32, 2.0, 1.0], vec![3]));
        let mut op = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap();
        assert_eq!(op.dim(), 3);
        op.compute().unwrap();

        let y = table.get_or_create("onehot");
        let y = read_tensor(&y).unwrap();
        check_tensor_near(
            &y,
            &[3, 3],
            &[1.0f32, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            0.0,
        );
    }

    #[test]
    fn test_one_hot_recompute_clears_previous_rows() {
        let mut table: TensorTable = TensorTable::new();
        let label = table.insert("label", Tensor::from_vec(vec![0.0f64, 1.0], vec![2, 1]).unwrap());
        let mut op = OneHotOp::<f64>::new(one_hot_io(DType::F64, Some(2)), &mut table).unwrap();
        op.compute().unwrap();
        write_tensor(&label).unwrap().copy_from_slice(&[1.0f64, 0.0]).unwrap();
        op.compute().unwrap();

        let y = table.get_or_create("onehot");
        let y = read_tensor(&y).unwrap();
        check_tensor_near(&y, &[2, 2], &[0.0f64, 1.0, 1.0, 0.0], 0.0);
    }

    #[test]
    fn test_one_hot_rejects_out_of_range_class() {
        let mut table: TensorTable = TensorTable::new();
        table.insert("label", create_test_tensor(vec![0.0f32, 3.0], vec![2]));
        let mut op = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap();
        let err = op.compute().unwrap_err();
        assert_eq!(
            err,
            NeuroGradError::IndexOutOfBounds {
                index: vec![1, 3],
                shape: vec![2, 3]
            }
        );
        // Nothing was written.
        let y = table.get_or_create("onehot");
        assert!(read_tensor(&y).unwrap().to_vec::<f32>().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_one_hot_rejects_input_resized_after_construction() {
        for resized in [vec![0.0f32, 1.0, 2.0], vec![1.0f32]] {
            let mut table: TensorTable = TensorTable::new();
            let label = table.insert("label", create_test_tensor(vec![0.0f32, 1.0], vec![2]));
            let mut op = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap();
            let len = resized.len();
            *write_tensor(&label).unwrap() = create_test_tensor(resized, vec![len]);

            let err = op.compute().unwrap_err();
            assert_eq!(
                err,
                NeuroGradError::ShapeMismatch {
                    expected: vec![2],
                    actual: vec![len],
                    operation: "OneHot: x changed size since construction".to_string(),
                }
            );
            let y = table.get_or_create("onehot");
            assert!(read_tensor(&y).unwrap().to_vec::<f32>().unwrap().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_one_hot_second_construction_keeps_shape_and_buffer() {
        let mut table: TensorTable = TensorTable::new();
        table.insert("label", create_test_tensor(vec![2.0f32, 0.0], vec![2]));
        let _first = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap();
        let y = table.get_or_create("onehot");
        let ptr = read_tensor(&y).unwrap().raw_ptr();

        let mut second = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap();
        assert_eq!(second.dim(), 3);
        {
            let y = read_tensor(&y).unwrap();
            assert_eq!(y.shape(), &[2, 3]);
            assert_eq!(y.raw_ptr(), ptr);
        }
        second.compute().unwrap();
        let y = read_tensor(&y).unwrap();
        check_tensor_near(
            &y,
            &[2, 3],
            &[0.0f32, 0.0, 1.0, 1.0, 0.0, 0.0],
            0.0,
        );
    }

    #[test]
    fn test_one_hot_rejects_negative_and_nan() {
        for bad in [-1.0f32, f32::NAN, f32::INFINITY] {
            let mut table: TensorTable = TensorTable::new();
            table.insert("label", create_test_tensor(vec![bad], vec![1]));
            let mut op = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(4)), &mut table).unwrap();
            assert!(
                matches!(op.compute(), Err(NeuroGradError::IndexOutOfBounds { .. })),
                "class value {} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_one_hot_validate_takes_dim_from_output() {
        let mut table: TensorTable = TensorTable::new();
        table.insert("label", create_test_tensor(vec![4.0f32, 1.0], vec![2]));
        table.insert("onehot", create_test_tensor(vec![9.0f32; 10], vec![2, 5]));
        let mut op = OneHotOp::<f32>::new(one_hot_io(DType::F32, None), &mut table).unwrap();
        assert_eq!(op.dim(), 5);
        op.compute().unwrap();
        let y = table.get_or_create("onehot");
        let y = read_tensor(&y).unwrap();
        check_tensor_near(
            &y,
            &[2, 5],
            &[0.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            0.0,
        );
    }

    #[test]
    fn test_one_hot_validate_rejects_batch_mismatch() {
        let mut table: TensorTable = TensorTable::new();
        table.insert("label", create_test_tensor(vec![0.0f32, 1.0, 2.0], vec![3]));
        table.insert("onehot", create_test_tensor(vec![0.0f32; 6], vec![2, 3]));
        let err = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap_err();
        assert!(matches!(err, NeuroGradError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_one_hot_rejects_unsized_input() {
        let mut table: TensorTable = TensorTable::new();
        let err = OneHotOp::<f32>::new(one_hot_io(DType::F32, Some(3)), &mut table).unwrap_err();
        assert!(matches!(err, NeuroGradError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_one_hot_arity() {
        let mut table: TensorTable = TensorTable::new();
        let io = OperatorIo::builder(ONE_HOT, DType::F32)
            .input("a")
            .input("b")
            .output("y")
            .build()
            .unwrap();
        assert!(matches!(
            OneHotOp::<f32>::new(io, &mut table),
            Err(NeuroGradError::ArityError { .. })
        ));
    }
}
