//! `DeviceBuffer` — an owned, fixed-length, zero-initialized array on a device.

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize};

use tracing::trace;

use super::{AllocError, Device, DeviceAlloc, SystemAlloc};

/// Types for which the all-zero bit pattern is a valid value.
///
/// # Safety
/// Implementors must guarantee that a block of zeroed bytes of
/// `size_of::<Self>()` is a valid, initialized `Self`.
pub unsafe trait ZeroInit {}

unsafe impl ZeroInit for u32 {}
unsafe impl ZeroInit for u64 {}
unsafe impl ZeroInit for usize {}
unsafe impl ZeroInit for AtomicU32 {}
unsafe impl ZeroInit for AtomicU64 {}
unsafe impl ZeroInit for AtomicUsize {}

/// A contiguous array of `len` elements owned exclusively by this value.
///
/// The memory comes from `A` already zeroed and is handed back to `A` on
/// drop, on every exit path.
pub struct DeviceBuffer<T: ZeroInit, A: DeviceAlloc = SystemAlloc> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    device: Device,
    alloc: A,
    _owns: PhantomData<T>,
}

impl<T: ZeroInit, A: DeviceAlloc> DeviceBuffer<T, A> {
    /// Allocates `len` zeroed elements on `device`.
    ///
    /// # Errors
    /// Returns `AllocError` if the byte size overflows or `alloc` fails.
    pub fn new_zeroed(len: usize, device: Device, alloc: A) -> Result<Self, AllocError> {
        let layout = Layout::array::<T>(len)
            .map_err(|_| AllocError::new(device, len.saturating_mul(core::mem::size_of::<T>())))?;
        // `DeviceAlloc` guarantees size, alignment and zeroing of the block.
        let ptr = alloc.allocate_zeroed(device, layout)?;
        debug_assert_eq!(ptr.as_ptr() as usize % layout.align(), 0, "misaligned device block");
        trace!(%device, len, bytes = layout.size(), "device buffer allocated");
        Ok(Self {
            ptr: ptr.cast(),
            len,
            layout,
            device,
            alloc,
            _owns: PhantomData,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The device this buffer lives on.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    /// The allocator that owns the backing memory.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }
}

impl<T: ZeroInit, A: DeviceAlloc> Deref for DeviceBuffer<T, A> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        // SAFETY: per the `DeviceAlloc` contract `ptr` is aligned and covers `len`
        // zero-initialized elements, which are valid per `ZeroInit`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: ZeroInit, A: DeviceAlloc> DerefMut for DeviceBuffer<T, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`, and `&mut self` guarantees exclusivity.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: ZeroInit, A: DeviceAlloc> Drop for DeviceBuffer<T, A> {
    fn drop(&mut self) {
        // SAFETY: the block was allocated by `self.alloc` on `self.device` with `self.layout`.
        unsafe { self.alloc.deallocate(self.device, self.ptr.cast(), self.layout) };
        trace!(device = %self.device, len = self.len, "device buffer released");
    }
}

impl<T: ZeroInit + fmt::Debug, A: DeviceAlloc> fmt::Debug for DeviceBuffer<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("device", &self.device)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

// SAFETY: the buffer owns its elements like a `Box<[T]>` would.
unsafe impl<T: ZeroInit + Send, A: DeviceAlloc + Send> Send for DeviceBuffer<T, A> {}
unsafe impl<T: ZeroInit + Sync, A: DeviceAlloc> Sync for DeviceBuffer<T, A> {}
