use crate::device::DeviceContext;
use crate::tensor::Tensor;
use crate::types::Element;

/// Checks if a tensor matches an expected shape and data within tolerance.
/// Panics if shapes differ or data differs significantly.
pub fn check_tensor_near<T: Element, C: DeviceContext>(
    actual: &Tensor<C>,
    expected_shape: &[usize],
    expected_data: &[T],
    tolerance: T,
) {
    assert_eq!(actual.shape(), expected_shape, "Shape mismatch");

    let actual_data_vec = actual
        .to_vec::<T>()
        .expect("Failed to read tensor data in check_tensor_near");

    assert_eq!(
        actual_data_vec.len(),
        expected_data.len(),
        "Data length mismatch"
    );

    for (i, (a, e)) in actual_data_vec.iter().zip(expected_data.iter()).enumerate() {
        let diff = (*a - *e).abs();
        if !(diff <= tolerance) {
            panic!(
                "Data mismatch at index {}: actual={:?}, expected={:?}, diff={:?}, tolerance={:?}",
                i, a, e, diff, tolerance
            );
        }
    }
}

/// Helper to create a host tensor for testing purposes.
pub fn create_test_tensor<T: Element>(data: Vec<T>, shape: Vec<usize>) -> Tensor {
    Tensor::from_vec(data, shape).expect("Failed to create test tensor")
}
