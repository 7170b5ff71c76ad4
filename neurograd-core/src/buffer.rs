//! Host-memory device context.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use log::trace;

use crate::device::{checked_copy_range, DeviceContext, StorageDevice};
use crate::error::NeuroGradError;

/// Alignment of every host allocation. Large enough for any `Element` and for
/// the vectorised loops of the linear algebra backend.
const HOST_ALIGN: usize = 64;

/// Device context backed by a single heap allocation in main memory.
///
/// The buffer is zero-initialised on allocation, so a typed view taken right
/// after a resize reads zeros rather than uninitialised memory. The stored
/// `Layout` is the release action: it is what `clear` hands back to the
/// allocator.
#[derive(Debug, Default)]
pub struct CpuContext {
    block: Option<(NonNull<u8>, Layout)>,
}

// SAFETY: the allocation is owned exclusively by this context and only ever
// reached through `&self`/`&mut self`, so moving or sharing the context across
// threads follows the usual borrow rules.
unsafe impl Send for CpuContext {}
unsafe impl Sync for CpuContext {}

impl CpuContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceContext for CpuContext {
    const DEVICE: StorageDevice = StorageDevice::CPU;

    fn allocate(&mut self, count: usize, width: usize) -> Result<(), NeuroGradError> {
        self.clear();
        let bytes = count
            .checked_mul(width)
            .ok_or_else(|| NeuroGradError::AllocationError {
                bytes: usize::MAX,
                reason: format!("{} elements of {} bytes overflow usize", count, width),
            })?;
        if bytes == 0 {
            return Ok(());
        }
        let layout = Layout::from_size_align(bytes, HOST_ALIGN).map_err(|e| {
            NeuroGradError::AllocationError {
                bytes,
                reason: e.to_string(),
            }
        })?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| NeuroGradError::AllocationError {
            bytes,
            reason: "allocator returned null".to_string(),
        })?;
        trace!("CpuContext: allocated {} bytes at {:p}", bytes, raw);
        self.block = Some((ptr, layout));
        Ok(())
    }

    fn clear(&mut self) {
        if let Some((ptr, layout)) = self.block.take() {
            trace!("CpuContext: releasing {} bytes at {:p}", layout.size(), ptr);
            // SAFETY: `ptr` was returned by `alloc_zeroed` with exactly this layout
            // and has not been freed, since `take()` removed our only copy.
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }

    fn size(&self) -> usize {
        self.block.map_or(0, |(_, layout)| layout.size())
    }

    fn raw_ptr(&self) -> *const u8 {
        self.block
            .map_or(std::ptr::null(), |(ptr, _)| ptr.as_ptr() as *const u8)
    }

    fn copy_out(
        &self,
        offset: usize,
        count: usize,
        width: usize,
        dst: &mut [u8],
    ) -> Result<(), NeuroGradError> {
        let range = checked_copy_range(offset, count, width, self.size(), dst.len())?;
        let len = range.len();
        dst[..len].copy_from_slice(&self.as_bytes()[range]);
        Ok(())
    }

    fn copy_in(
        &mut self,
        offset: usize,
        count: usize,
        width: usize,
        src: &[u8],
    ) -> Result<(), NeuroGradError> {
        let range = checked_copy_range(offset, count, width, self.size(), src.len())?;
        let len = range.len();
        self.as_bytes_mut()[range].copy_from_slice(&src[..len]);
        Ok(())
    }

    fn as_bytes(&self) -> &[u8] {
        match self.block {
            // SAFETY: the block is a live allocation of `layout.size()` initialised bytes.
            Some((ptr, layout)) => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), layout.size())
            },
            None => &[],
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self.block {
            // SAFETY: as above, and `&mut self` guarantees exclusive access.
            Some((ptr, layout)) => unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr(), layout.size())
            },
            None => &mut [],
        }
    }
}

impl Drop for CpuContext {
    fn drop(&mut self) {
        self.clear();
    }
}
