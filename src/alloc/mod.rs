//! Device memory allocation.
//!
//! Compaction tables never touch the global heap directly. They request
//! zero-filled blocks through a [`DeviceAlloc`] and keep them inside an owning
//! [`DeviceBuffer`], which returns the block to the same allocator on drop.

pub mod buffer;
pub mod device;
pub mod page;
pub mod system;

pub use buffer::{DeviceBuffer, ZeroInit};
pub use device::{AllocError, Device, DeviceAlloc};
pub use page::PageAlloc;
pub use system::SystemAlloc;
