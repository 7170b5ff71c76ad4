use std::fmt::Debug;

use crate::error::NeuroGradError;

/// Represents the physical location where tensor data is stored.
///
/// Only host memory has a context implementation today; the enum exists so a
/// tensor can report where it lives and so other backends have a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StorageDevice {
    /// Data is stored in main system memory (RAM).
    #[default]
    CPU,
}

/// The memory-ownership abstraction for one backend.
///
/// A context owns at most one contiguous byte buffer. It is either empty
/// (`size() == 0`, null `raw_ptr()`) or holds exactly `size()` bytes.
/// Re-allocating releases the previous buffer first, and dropping the context
/// releases whatever it still owns.
///
/// Offsets and counts in the copy operations are expressed in elements of
/// `width` bytes, mirroring how tensors address their storage.
pub trait DeviceContext: Debug + Default + Send + Sync {
    /// Where buffers of this context live.
    const DEVICE: StorageDevice;

    /// Releases any existing buffer, then allocates `count * width` bytes.
    ///
    /// # Errors
    /// `NeuroGradError::AllocationError` if the byte size overflows or the
    /// allocator refuses the request. The context is left empty on failure.
    fn allocate(&mut self, count: usize, width: usize) -> Result<(), NeuroGradError>;

    /// Releases the buffer if there is one. Idempotent.
    fn clear(&mut self);

    /// Byte length of the owned buffer, 0 when empty.
    fn size(&self) -> usize;

    /// Base address of the owned buffer, null when empty.
    fn raw_ptr(&self) -> *const u8;

    /// Copies `count * width` bytes starting at byte `offset * width` into `dst`.
    ///
    /// # Errors
    /// `NeuroGradError::BoundsError` if the range exceeds the allocation or
    /// `dst` is shorter than the requested byte count.
    fn copy_out(
        &self,
        offset: usize,
        count: usize,
        width: usize,
        dst: &mut [u8],
    ) -> Result<(), NeuroGradError>;

    /// Symmetric to [`copy_out`](DeviceContext::copy_out): writes `src` into the buffer.
    fn copy_in(
        &mut self,
        offset: usize,
        count: usize,
        width: usize,
        src: &[u8],
    ) -> Result<(), NeuroGradError>;

    /// Host-visible view of the whole buffer.
    fn as_bytes(&self) -> &[u8];

    /// Mutable host-visible view of the whole buffer.
    fn as_bytes_mut(&mut self) -> &mut [u8];

    fn is_allocated(&self) -> bool {
        self.size() != 0
    }
}

/// Validates a copy request against an allocation of `capacity` bytes and a
/// caller buffer of `host_len` bytes. Returns the byte range inside the device
/// buffer on success.
pub(crate) fn checked_copy_range(
    offset: usize,
    count: usize,
    width: usize,
    capacity: usize,
    host_len: usize,
) -> Result<std::ops::Range<usize>, NeuroGradError> {
    let out_of_bounds = || NeuroGradError::BoundsError {
        offset,
        count,
        width,
        capacity,
    };
    let end_elems = offset.checked_add(count).ok_or_else(out_of_bounds)?;
    let end = end_elems.checked_mul(width).ok_or_else(out_of_bounds)?;
    let bytes = count * width; // cannot overflow once `end` did not
    if end > capacity || bytes > host_len {
        return Err(out_of_bounds());
    }
    Ok(end - bytes..end)
}
