//! Device tags and the allocator trait.

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

/// The memory domain an allocation is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host memory.
    Cpu,
    /// Device memory on the GPU with the given ordinal.
    Gpu(u16),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Gpu(ordinal) => write!(f, "gpu:{ordinal}"),
        }
    }
}

/// A trait for per-device memory allocators.
///
/// This is the allocation seam for compaction tables: the table asks for
/// a zero-filled block on a [`Device`] and hands the same device, pointer and
/// layout back on release.
///
/// Implementations must be thread-safe (`Sync`); tables are shared by every
/// worker of a parallel region.
///
/// # Safety
///
/// Owners such as [`DeviceBuffer`](super::DeviceBuffer) build slices straight
/// from the returned pointer, so an implementor must guarantee that every
/// `Ok(ptr)` from [`allocate_zeroed`](Self::allocate_zeroed):
///
/// - points to a block of at least `layout.size()` bytes,
/// - is aligned to `layout.align()`,
/// - has every byte of that block set to zero,
/// - stays valid and unaliased until passed to [`deallocate`](Self::deallocate).
///
/// A safe impl cannot make these promises:
///
/// ```compile_fail
/// use core::alloc::Layout;
/// use core::ptr::NonNull;
/// use idcompact::{AllocError, Device, DeviceAlloc};
///
/// struct Tiny;
///
/// impl DeviceAlloc for Tiny {
///     fn allocate_zeroed(&self, _: Device, _: Layout) -> Result<NonNull<u8>, AllocError> {
///         Ok(NonNull::dangling())
///     }
///     unsafe fn deallocate(&self, _: Device, _: NonNull<u8>, _: Layout) {}
/// }
/// ```
pub unsafe trait DeviceAlloc: Sync {
    /// Allocates a block of `layout.size()` bytes whose contents are all zero.
    ///
    /// # Errors
    /// Returns `AllocError` if the device is not served by this allocator or
    /// the allocation fails.
    fn allocate_zeroed(&self, device: Device, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Deallocates memory.
    ///
    /// # Safety
    /// `ptr` must denote a block of memory currently allocated by this allocator
    /// on `device`. `layout` must be the same layout that was used to allocate
    /// that block of memory.
    unsafe fn deallocate(&self, device: Device, ptr: NonNull<u8>, layout: Layout);
}

// SAFETY: forwards both calls to `A`, which upholds the contract.
unsafe impl<A: DeviceAlloc + ?Sized> DeviceAlloc for &A {
    #[inline]
    fn allocate_zeroed(&self, device: Device, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate_zeroed(device, layout)
    }

    #[inline]
    unsafe fn deallocate(&self, device: Device, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(device, ptr, layout);
    }
}

/// The error type for allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    /// Device the allocation was requested on.
    pub device: Device,
    /// Requested size in bytes.
    pub bytes: usize,
}

impl AllocError {
    /// Creates an error for a failed request of `bytes` on `device`.
    pub const fn new(device: Device, bytes: usize) -> Self {
        Self { device, bytes }
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory allocation of {} bytes on {} failed", self.bytes, self.device)
    }
}

impl std::error::Error for AllocError {}
