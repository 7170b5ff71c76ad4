use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::trace;

use crate::buffer::CpuContext;
use crate::device::DeviceContext;
use crate::error::NeuroGradError;
use crate::tensor::Tensor;

/// A tensor handle shared between the table and every operator bound to it.
///
/// Several operators may hold the same handle (fan-out and fan-in in the
/// dataflow), so none of them may assume exclusive access.
pub type SharedTensor<C = CpuContext> = Arc<RwLock<Tensor<C>>>;

/// Acquires a read lock on a shared tensor, mapping poisoning to `LockError`.
pub fn read_tensor<C: DeviceContext>(
    tensor: &SharedTensor<C>,
) -> Result<RwLockReadGuard<'_, Tensor<C>>, NeuroGradError> {
    tensor.read().map_err(|e| NeuroGradError::LockError {
        lock_type: "read".to_string(),
        reason: e.to_string(),
    })
}

/// Acquires a write lock on a shared tensor, mapping poisoning to `LockError`.
pub fn write_tensor<C: DeviceContext>(
    tensor: &SharedTensor<C>,
) -> Result<RwLockWriteGuard<'_, Tensor<C>>, NeuroGradError> {
    tensor.write().map_err(|e| NeuroGradError::LockError {
        lock_type: "write".to_string(),
        reason: e.to_string(),
    })
}

/// Name → tensor lookup that operator constructors resolve wiring against.
///
/// A name seen for the first time gets a fresh empty tensor, which is what
/// lets an operator originate shapes for tensors nobody has sized yet.
#[derive(Debug)]
pub struct TensorTable<C: DeviceContext = CpuContext> {
    tensors: HashMap<String, SharedTensor<C>>,
}

impl<C: DeviceContext> Default for TensorTable<C> {
    fn default() -> Self {
        Self {
            tensors: HashMap::new(),
        }
    }
}

impl<C: DeviceContext> TensorTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tensor registered under `name`, creating an empty one first
    /// if the name is unknown.
    pub fn get_or_create(&mut self, name: &str) -> SharedTensor<C> {
        Arc::clone(self.tensors.entry(name.to_string()).or_insert_with(|| {
            trace!("TensorTable: creating empty tensor '{}'", name);
            Arc::new(RwLock::new(Tensor::new()))
        }))
    }

    pub fn get(&self, name: &str) -> Option<SharedTensor<C>> {
        self.tensors.get(name).map(Arc::clone)
    }

    /// Registers `tensor` under `name`, replacing any previous entry, and
    /// returns the shared handle.
    pub fn insert(&mut self, name: &str, tensor: Tensor<C>) -> SharedTensor<C> {
        let shared = Arc::new(RwLock::new(tensor));
        self.tensors.insert(name.to_string(), Arc::clone(&shared));
        shared
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}
