use neurograd_core::tensor::{read_tensor, SharedTensor, TensorTable};
use neurograd_core::Element;

// Each integration test binary includes this module and uses a different
// subset of it.
#[allow(dead_code)]
pub fn init_logger() {
    // Attempt to initialize env_logger. If it is already initialized, that's okay.
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn values<T: Element>(table: &mut TensorTable, name: &str) -> Vec<T> {
    let handle: SharedTensor = table.get_or_create(name);
    let tensor = read_tensor(&handle).expect("lock poisoned");
    tensor.to_vec::<T>().expect("Failed to read tensor values")
}

#[allow(dead_code)]
pub fn shape(table: &mut TensorTable, name: &str) -> Vec<usize> {
    let handle: SharedTensor = table.get_or_create(name);
    let tensor = read_tensor(&handle).expect("lock poisoned");
    tensor.shape().to_vec()
}
