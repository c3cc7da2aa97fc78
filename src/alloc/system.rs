//! Device allocator backed by the global Rust allocator.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, dealloc};

use super::{AllocError, Device, DeviceAlloc};

/// Host allocator that forwards to the process-wide global allocator.
///
/// Only [`Device::Cpu`] is served; any other device yields an [`AllocError`].
/// Zero-sized layouts are answered with a dangling, well-aligned pointer and
/// never reach the global allocator.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemAlloc;

// SAFETY: `alloc_zeroed` returns a zeroed block of exactly `layout`, released
// only through `dealloc` with the same layout. Zero-sized layouts get a
// dangling pointer aligned to `layout.align()`, which is never dereferenced.
unsafe impl DeviceAlloc for SystemAlloc {
    fn allocate_zeroed(&self, device: Device, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if device != Device::Cpu {
            return Err(AllocError::new(device, layout.size()));
        }
        if layout.size() == 0 {
            // SAFETY: alignment is non-zero, so this is a non-null dangling pointer.
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(AllocError::new(device, layout.size()))
    }

    unsafe fn deallocate(&self, _device: Device, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}
