//! Slot layouts of the two backing arrays.
//!
//! Both slot types are plain `u32` words behind atomics, so the zero-filled
//! memory handed out by a [`DeviceAlloc`](crate::alloc::DeviceAlloc) is a valid,
//! fully cleared table.
//!
//! Tag encoding: an origin slot stores `global + 1` once claimed and `0`
//! ([`EMPTY_TAG`]) while free. Zero therefore doubles as the "empty"
//! sentinel and the all-zero bit pattern is an empty table.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::alloc::ZeroInit;

/// Integer type of global and local ids.
pub type IdType = u32;

/// Tag value of an unclaimed origin slot.
pub const EMPTY_TAG: u32 = 0;

/// Largest supported capacity: every id below it has a distinct non-zero tag.
pub const MAX_CAPACITY: usize = IdType::MAX as usize;

#[inline(always)]
const fn encode(id: IdType) -> u32 {
    id + 1
}

/// Origin-to-local entry, one per possible global id.
#[repr(C)]
pub(crate) struct OriginSlot {
    tag: AtomicU32,
    local: AtomicU32,
}

// SAFETY: two `AtomicU32`s, zero is a valid value for each.
unsafe impl ZeroInit for OriginSlot {}

impl OriginSlot {
    /// Claims the slot for `id`. Returns `true` for the single caller whose
    /// compare-and-swap observed the slot empty.
    #[inline(always)]
    pub(crate) fn try_claim(&self, id: IdType) -> bool {
        self.tag
            .compare_exchange(EMPTY_TAG, encode(id), Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    pub(crate) fn is_claimed_by(&self, id: IdType) -> bool {
        self.tag.load(Ordering::Acquire) == encode(id)
    }

    /// The assigned local index. Unspecified unless the slot is claimed.
    #[inline(always)]
    pub(crate) fn local(&self) -> IdType {
        self.local.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn set_local(&self, local: IdType) {
        self.local.store(local, Ordering::Relaxed);
    }

    /// Marks the slot empty. `local` is left stale.
    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        *self.tag.get_mut() = EMPTY_TAG;
    }
}

/// Local-to-origin entry, one per assigned local index.
#[repr(transparent)]
pub(crate) struct LocalSlot {
    global: AtomicU32,
}

// SAFETY: a single `AtomicU32`.
unsafe impl ZeroInit for LocalSlot {}

impl LocalSlot {
    #[inline(always)]
    pub(crate) fn global(&self) -> IdType {
        self.global.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub(crate) fn set_global(&self, id: IdType) {
        self.global.store(id, Ordering::Relaxed);
    }
}

const _: () = {
    use core::mem;

    assert!(mem::size_of::<OriginSlot>() == 2 * mem::size_of::<IdType>());
    assert!(mem::size_of::<LocalSlot>() == mem::size_of::<IdType>());
};
