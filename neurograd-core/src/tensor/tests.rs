// neurograd-core/src/tensor/tests.rs

use super::*;
use approx::assert_relative_eq;

#[test]
fn test_new_tensor_is_empty() {
    let t: Tensor = Tensor::new();
    assert!(t.is_empty());
    assert_eq!(t.size(), 0);
    assert_eq!(t.rank(), 0);
    assert!(t.raw_ptr().is_null());
    assert_eq!(t.as_slice::<f64>().unwrap(), &[] as &[f64]);
}

#[test]
fn test_from_vec() {
    let t: Tensor = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], vec![2, 2]).unwrap();
    assert_eq!(t.shape(), &[2, 2]);
    assert_eq!(t.size(), 4);
    assert_eq!(t.dtype(), DType::F32);
    assert_eq!(t.context().size(), 16);
    let data = t.as_slice::<f32>().unwrap();
    assert_relative_eq!(data[0], 1.0);
    assert_relative_eq!(data[3], 4.0);
}

#[test]
fn test_from_vec_length_mismatch() {
    let result: Result<Tensor, _> = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], vec![2, 2]);
    match result {
        Err(NeuroGradError::TensorCreationError { data_len, shape }) => {
            assert_eq!(data_len, 3);
            assert_eq!(shape, vec![2, 2]);
        }
        other => panic!("Expected TensorCreationError, got {:?}", other),
    }
}

#[test]
fn test_resize_allocates_and_zeroes() {
    let mut t: Tensor = Tensor::new();
    t.resize::<f64>(&[3, 2]).unwrap();
    assert!(!t.is_empty());
    assert_eq!(t.size(), 6);
    assert_eq!(t.context().size(), 48);
    assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0; 6]);
}

#[test]
fn test_resize_same_byte_length_keeps_buffer_and_contents() {
    let mut t: Tensor = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();
    let before = t.raw_ptr();
    t.resize::<f32>(&[3, 2]).unwrap();
    assert_eq!(t.shape(), &[3, 2]);
    assert_eq!(t.raw_ptr(), before);
    assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_resize_new_byte_length_discards_contents() {
    let mut t: Tensor = Tensor::from_vec(vec![7.0f32; 4], vec![4]).unwrap();
    t.resize::<f32>(&[5]).unwrap();
    assert_eq!(t.context().size(), 20);
    assert_eq!(t.to_vec::<f32>().unwrap(), vec![0.0; 5]);

    // Same element count, wider element type: a new allocation as well.
    t.resize::<f64>(&[5]).unwrap();
    assert_eq!(t.context().size(), 40);
    assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0; 5]);
}

#[test]
fn test_resize_to_zero_elements_releases() {
    let mut t: Tensor = Tensor::from_vec(vec![1.0f64, 2.0], vec![2]).unwrap();
    t.resize::<f64>(&[0, 4]).unwrap();
    assert!(t.is_empty());
    assert_eq!(t.context().size(), 0);
    assert!(t.raw_ptr().is_null());
}

#[test]
fn test_reshape_like() {
    let src: Tensor = Tensor::from_vec(vec![1.0f64; 6], vec![2, 3]).unwrap();
    let mut dst: Tensor = Tensor::new();
    dst.reshape_like(&src).unwrap();
    assert_eq!(dst.shape(), &[2, 3]);
    assert_eq!(dst.dtype(), DType::F64);
    assert!(dst.compare_size_with(&src));
}

#[test]
fn test_dim_out_of_range() {
    let t: Tensor = Tensor::from_vec(vec![0.0f32; 6], vec![2, 3]).unwrap();
    assert_eq!(t.dim(1).unwrap(), 3);
    let err = t.dim(2).unwrap_err();
    assert_eq!(
        err,
        NeuroGradError::IndexOutOfBounds {
            index: vec![2],
            shape: vec![2, 3]
        }
    );
}

#[test]
fn test_compare_size_ignores_dims() {
    let a: Tensor = Tensor::from_vec(vec![0.0f32; 6], vec![2, 3]).unwrap();
    let b: Tensor = Tensor::from_vec(vec![0.0f32; 6], vec![6]).unwrap();
    let c: Tensor = Tensor::from_vec(vec![0.0f32; 4], vec![4]).unwrap();
    assert!(a.compare_size_with(&b));
    assert!(!a.compare_size_with(&c));
}

#[test]
fn test_typed_access_checks_dtype() {
    let mut t: Tensor = Tensor::from_vec(vec![1.0f32, 2.0], vec![2]).unwrap();
    let err = t.as_slice::<f64>().unwrap_err();
    assert!(matches!(
        err,
        NeuroGradError::DataTypeMismatch {
            expected: DType::F32,
            actual: DType::F64,
            ..
        }
    ));
    assert!(t.as_mut_slice::<f64>().is_err());
    assert!(t.fill(1.0f64).is_err());
    assert!(t.to_vec::<f64>().is_err());
}

#[test]
fn test_fill_and_mutate() {
    let mut t: Tensor = Tensor::new();
    t.resize::<f32>(&[2, 2]).unwrap();
    t.fill(3.0f32).unwrap();
    t.as_mut_slice::<f32>().unwrap()[1] = -1.0;
    assert_eq!(t.to_vec::<f32>().unwrap(), vec![3.0, -1.0, 3.0, 3.0]);
}

#[test]
fn test_copy_from_slice_length_checked() {
    let mut t: Tensor = Tensor::from_vec(vec![0.0f64; 3], vec![3]).unwrap();
    assert!(t.copy_from_slice(&[1.0f64, 2.0]).is_err());
    t.copy_from_slice(&[1.0f64, 2.0, 3.0]).unwrap();
    assert_eq!(t.to_vec::<f64>().unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_rank_zero_shape_holds_no_elements() {
    let mut t: Tensor = Tensor::from_vec(vec![1.0f32; 4], vec![4]).unwrap();
    t.resize::<f32>(&[]).unwrap();
    assert!(t.is_empty());
    assert_eq!(t.size(), 0);
    assert_eq!(t.context().size(), 0);
    assert!(t.raw_ptr().is_null());

    let err = Tensor::<CpuContext>::from_vec(vec![5.0f64], vec![]).unwrap_err();
    assert_eq!(
        err,
        NeuroGradError::TensorCreationError {
            data_len: 1,
            shape: vec![]
        }
    );
    let empty: Tensor = Tensor::from_vec(Vec::<f64>::new(), vec![]).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.context().size(), 0);
}

#[test]
fn test_clear_returns_to_empty() {
    let mut t: Tensor = Tensor::from_vec(vec![1.0f32; 8], vec![2, 4]).unwrap();
    t.clear();
    assert!(t.is_empty());
    assert_eq!(t.rank(), 0);
    assert_eq!(t.context().size(), 0);
}
