//! Device allocator that maps anonymous memory regions straight from the OS.
//!
//! Large compaction tables span the whole id universe. Mapping them directly
//! keeps them out of the global heap, and the kernel hands out zero-filled
//! pages, so no explicit clearing pass is needed after allocation.

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use super::{AllocError, Device, DeviceAlloc};

/// Granularity of mapped regions.
pub const PAGE_SIZE: usize = 4096;

/// Rounds `value` up to a multiple of `align` (a power of two, or zero for no rounding).
pub const fn align_up(value: usize, align: usize) -> usize {
    if align == 0 {
        value
    } else {
        (value + (align - 1)) & !(align - 1)
    }
}

/// Host allocator that maps one OS region per allocation.
///
/// Alignments above [`PAGE_SIZE`] are not supported and are reported as an
/// [`AllocError`], as are requests for any device other than [`Device::Cpu`].
#[derive(Default, Clone, Copy, Debug)]
pub struct PageAlloc;

// SAFETY: regions are page-aligned, cover `layout.size()` rounded up to whole
// pages, come zero-filled from the OS and stay mapped until `deallocate`.
// Alignments above `PAGE_SIZE` are refused. Zero-sized layouts get a dangling
// pointer aligned to `layout.align()`, which is never dereferenced.
unsafe impl DeviceAlloc for PageAlloc {
    fn allocate_zeroed(&self, device: Device, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if device != Device::Cpu || layout.align() > PAGE_SIZE {
            return Err(AllocError::new(device, layout.size()));
        }
        if layout.size() == 0 {
            // SAFETY: alignment is non-zero, so this is a non-null dangling pointer.
            return Ok(unsafe { NonNull::new_unchecked(layout.align() as *mut u8) });
        }
        // SAFETY: size is non-zero.
        let ptr = unsafe { map_region(align_up(layout.size(), PAGE_SIZE)) };
        NonNull::new(ptr).ok_or(AllocError::new(device, layout.size()))
    }

    unsafe fn deallocate(&self, _device: Device, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            unmap_region(ptr.as_ptr(), align_up(layout.size(), PAGE_SIZE));
        }
    }
}

/// Maps `len` bytes of fresh anonymous memory, or returns null.
///
/// # Safety
/// `len` must be a non-zero multiple of `PAGE_SIZE`.
#[cfg(unix)]
unsafe fn map_region(len: usize) -> *mut u8 {
    let ptr = libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANON,
        -1,
        0,
    );
    if ptr == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        ptr.cast()
    }
}

/// # Safety
/// `ptr` and `len` must come from one successful `map_region` call.
#[cfg(unix)]
unsafe fn unmap_region(ptr: *mut u8, len: usize) {
    libc::munmap(ptr.cast(), len);
}

#[cfg(windows)]
unsafe fn map_region(len: usize) -> *mut u8 {
    use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};
    VirtualAlloc(ptr::null_mut(), len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE).cast()
}

#[cfg(windows)]
unsafe fn unmap_region(ptr: *mut u8, _len: usize) {
    use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};
    VirtualFree(ptr.cast(), 0, MEM_RELEASE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, PAGE_SIZE), 0);
        assert_eq!(align_up(1, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE, PAGE_SIZE), PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE + 1, PAGE_SIZE), 2 * PAGE_SIZE);
        assert_eq!(align_up(7, 0), 7);
    }

    #[test]
    fn test_page_alloc_roundtrip() {
        let layout = Layout::array::<u32>(3 * PAGE_SIZE).unwrap();
        let ptr = PageAlloc.allocate_zeroed(Device::Cpu, layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % PAGE_SIZE, 0);
        unsafe {
            let words = core::slice::from_raw_parts_mut(ptr.as_ptr() as *mut u32, 3 * PAGE_SIZE);
            assert!(words.iter().all(|&w| w == 0));
            words[0] = 1;
            words[3 * PAGE_SIZE - 1] = 2;
            PageAlloc.deallocate(Device::Cpu, ptr, layout);
        }
    }

    #[test]
    fn test_page_alloc_rounds_partial_pages() {
        for size in [1, 5, PAGE_SIZE - 1, PAGE_SIZE + 1] {
            let layout = Layout::from_size_align(size, 1).unwrap();
            let ptr = PageAlloc.allocate_zeroed(Device::Cpu, layout).unwrap();
            unsafe {
                let bytes = core::slice::from_raw_parts_mut(ptr.as_ptr(), size);
                assert!(bytes.iter().all(|&b| b == 0));
                bytes[size - 1] = 0xAB;
                PageAlloc.deallocate(Device::Cpu, ptr, layout);
            }
        }
    }

    #[test]
    fn test_page_alloc_zero_size_never_maps() {
        let layout = Layout::from_size_align(0, 16).unwrap();
        let ptr = PageAlloc.allocate_zeroed(Device::Cpu, layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize, 16);
        unsafe { PageAlloc.deallocate(Device::Cpu, ptr, layout) };
    }

    #[test]
    fn test_page_alloc_rejects_oversized_alignment() {
        let layout = Layout::from_size_align(64, PAGE_SIZE * 2).unwrap();
        assert!(PageAlloc.allocate_zeroed(Device::Cpu, layout).is_err());
        assert!(PageAlloc.allocate_zeroed(Device::Gpu(1), Layout::new::<u8>()).is_err());
    }
}
