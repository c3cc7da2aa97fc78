//! `ParallelCompactTable` — lock-free compaction of sparse global ids.
//!
//! The table owns two arrays sized to the id universe:
//!
//! - an origin array indexed by global id, holding a claim tag and the
//!   assigned local index;
//! - a local array indexed by local index, holding the global id it came from.
//!
//! [`populate`](ParallelCompactTable::populate) inserts a batch of ids in
//! parallel. Every id is claimed with a single compare-and-swap on its own
//! slot; the one thread that wins the claim reserves the next local index with
//! a fetch-and-add and records both directions of the mapping. Losers do
//! nothing, so duplicates inside a batch or across batches are free.
//!
//! Each operation is a single parallel region that joins before returning.
//! The join is the only ordering point: writes made by one call are visible
//! to the next call on the same table, but not to readers running
//! concurrently with a `populate`.
//!
//! # Contract violations
//!
//! Ids outside `0..capacity` and over-long node requests are caller bugs and
//! panic with a diagnostic (the release profile aborts). The `try_*` methods
//! run the same checks up front and return a [`CompactError`] instead, leaving
//! the table untouched.
//!
//! # Example
//!
//! ```rust
//! use idcompact::{ParallelCompactTable, ParallelContext};
//!
//! let ctx = ParallelContext::with_threads(2).unwrap();
//! let table = ParallelCompactTable::new(10, &ctx).unwrap();
//!
//! assert_eq!(table.populate(&[3, 7, 3, 9]), 3);
//! assert_eq!(table.num_items(), 3);
//!
//! let mut nodes = table.mapped_nodes();
//! nodes.sort_unstable();
//! assert_eq!(nodes, vec![3, 7, 9]);
//!
//! let (mut src, mut dst) = ([0], [0]);
//! table.map_edges(&[3], &[7], &mut src, &mut dst);
//! assert_eq!(Some(src[0]), table.local_of(3));
//! assert_eq!(Some(dst[0]), table.local_of(7));
//! ```

pub mod slot;

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::alloc::{Device, DeviceAlloc, DeviceBuffer, SystemAlloc};
use crate::config::ParallelContext;
use crate::error::{fatal, CompactError};

use slot::{LocalSlot, OriginSlot};
pub use slot::{IdType, EMPTY_TAG, MAX_CAPACITY};

/// A fixed-capacity, lock-free table mapping global ids to dense local ids.
pub struct ParallelCompactTable<A: DeviceAlloc = SystemAlloc> {
    origin: DeviceBuffer<OriginSlot, A>,
    local: DeviceBuffer<LocalSlot, A>,
    /// Distinct ids accepted so far, and the next local index to hand out.
    num_items: CachePadded<AtomicUsize>,
    ctx: ParallelContext,
}

impl ParallelCompactTable<SystemAlloc> {
    /// Creates a table for ids in `0..capacity`, backed by the global allocator.
    ///
    /// # Errors
    /// See [`new_in`](Self::new_in).
    pub fn new(capacity: usize, ctx: &ParallelContext) -> Result<Self, CompactError> {
        Self::new_in(capacity, ctx, SystemAlloc)
    }
}

impl<A: DeviceAlloc + Clone> ParallelCompactTable<A> {
    /// Creates a table for ids in `0..capacity` with memory from `alloc`.
    ///
    /// Both arrays are requested zeroed on [`Device::Cpu`], which is the empty
    /// state, so the table is ready for [`populate`](Self::populate) without a
    /// [`reset`](Self::reset).
    ///
    /// # Errors
    /// Returns `CompactError::CapacityTooLarge` if `capacity > MAX_CAPACITY`, or
    /// `CompactError::Alloc` if either array cannot be allocated.
    pub fn new_in(capacity: usize, ctx: &ParallelContext, alloc: A) -> Result<Self, CompactError> {
        if capacity > MAX_CAPACITY {
            return Err(CompactError::CapacityTooLarge {
                capacity,
                max: MAX_CAPACITY,
            });
        }
        let origin = DeviceBuffer::new_zeroed(capacity, Device::Cpu, alloc.clone())?;
        let local = DeviceBuffer::new_zeroed(capacity, Device::Cpu, alloc)?;
        debug!(capacity, threads = ctx.threads(), "compaction table created");
        Ok(Self {
            origin,
            local,
            num_items: CachePadded::new(AtomicUsize::new(0)),
            ctx: ctx.clone(),
        })
    }
}

impl<A: DeviceAlloc> ParallelCompactTable<A> {
    /// Size of the id universe.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.origin.len()
    }

    /// Number of distinct ids inserted since construction or the last reset.
    #[inline]
    pub fn num_items(&self) -> usize {
        self.num_items.load(Ordering::Acquire)
    }

    /// Alias of [`num_items`](Self::num_items).
    #[inline]
    pub fn len(&self) -> usize {
        self.num_items()
    }

    /// Returns `true` if no id has been inserted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_items() == 0
    }

    /// The worker pool this table runs on.
    pub fn context(&self) -> &ParallelContext {
        &self.ctx
    }

    /// Inserts every id of `ids`, assigning fresh local indices to ids not yet
    /// present. Returns how many ids this call inserted.
    ///
    /// Duplicates are allowed anywhere; an id keeps the local index it got
    /// first. Safe to call concurrently with other `populate` calls on the
    /// same table.
    ///
    /// # Panics
    /// Panics if any id is `>= capacity()`.
    pub fn populate(&self, ids: &[IdType]) -> usize {
        let _span = debug_span!("populate", count = ids.len()).entered();
        let min_len = self.ctx.min_chunk_len();
        let inserted = self.ctx.install(|| {
            ids.par_iter()
                .with_min_len(min_len)
                .filter(|&&id| self.insert(id))
                .count()
        });
        debug!(inserted, num_items = self.num_items(), "populate finished");
        inserted
    }

    /// Checked [`populate`](Self::populate): validates every id first and
    /// inserts nothing if one is out of range.
    ///
    /// # Errors
    /// Returns `CompactError::IdOutOfRange` naming an offending id.
    pub fn try_populate(&self, ids: &[IdType]) -> Result<usize, CompactError> {
        self.check_ids(ids)?;
        Ok(self.populate(ids))
    }

    /// Inserts both endpoint columns of an edge list in one parallel pass.
    /// Returns how many ids this call inserted.
    ///
    /// # Panics
    /// Panics if any id is `>= capacity()`.
    pub fn populate_edges(&self, src: &[IdType], dst: &[IdType]) -> usize {
        let _span = debug_span!("populate_edges", src = src.len(), dst = dst.len()).entered();
        let min_len = self.ctx.min_chunk_len();
        let inserted = self.ctx.install(|| {
            src.par_iter()
                .chain(dst.par_iter())
                .with_min_len(min_len)
                .filter(|&&id| self.insert(id))
                .count()
        });
        debug!(inserted, num_items = self.num_items(), "populate_edges finished");
        inserted
    }

    /// Writes the global id of local index `i` to `output[i]` for every
    /// `i < output.len()`.
    ///
    /// # Panics
    /// Panics if `output.len() > num_items()`.
    pub fn map_nodes(&self, output: &mut [IdType]) {
        let available = self.num_items();
        if output.len() > available {
            fatal(CompactError::OutputExceedsItems {
                requested: output.len(),
                available,
            });
        }
        let _span = debug_span!("map_nodes", count = output.len()).entered();
        let min_len = self.ctx.min_chunk_len();
        self.ctx.install(|| {
            output
                .par_iter_mut()
                .enumerate()
                .with_min_len(min_len)
                .for_each(|(i, out)| *out = self.local[i].global());
        });
    }

    /// Checked [`map_nodes`](Self::map_nodes).
    ///
    /// # Errors
    /// Returns `CompactError::OutputExceedsItems` if `output` is longer than
    /// the number of inserted ids.
    pub fn try_map_nodes(&self, output: &mut [IdType]) -> Result<(), CompactError> {
        let available = self.num_items();
        if output.len() > available {
            return Err(CompactError::OutputExceedsItems {
                requested: output.len(),
                available,
            });
        }
        self.map_nodes(output);
        Ok(())
    }

    /// Returns every inserted global id, ordered by local index.
    pub fn mapped_nodes(&self) -> Vec<IdType> {
        let mut nodes = vec![0; self.num_items()];
        self.map_nodes(&mut nodes);
        nodes
    }

    /// Translates position-aligned `(src[i], dst[i])` global pairs into local
    /// pairs `(out_src[i], out_dst[i])`.
    ///
    /// Every id must have been inserted earlier; the local index read for an
    /// id that never was is unspecified.
    ///
    /// # Panics
    /// Panics if the four slices differ in length or any id is `>= capacity()`.
    pub fn map_edges(&self, src: &[IdType], dst: &[IdType], out_src: &mut [IdType], out_dst: &mut [IdType]) {
        if let Err(err) = check_lengths(src.len(), &[dst.len(), out_src.len(), out_dst.len()]) {
            fatal(err);
        }
        let _span = debug_span!("map_edges", len = src.len()).entered();
        let min_len = self.ctx.min_chunk_len();
        self.ctx.install(|| {
            out_src
                .par_iter_mut()
                .zip(out_dst.par_iter_mut())
                .zip(src.par_iter().zip(dst.par_iter()))
                .with_min_len(min_len)
                .for_each(|((new_src, new_dst), (&s, &d))| {
                    let (s, d) = (self.origin_slot(s), self.origin_slot(d));
                    *new_src = s.local();
                    *new_dst = d.local();
                });
        });
    }

    /// Checked [`map_edges`](Self::map_edges): validates lengths and ids first
    /// and writes nothing on failure.
    ///
    /// # Errors
    /// Returns `CompactError::LengthMismatch` or `CompactError::IdOutOfRange`.
    pub fn try_map_edges(
        &self,
        src: &[IdType],
        dst: &[IdType],
        out_src: &mut [IdType],
        out_dst: &mut [IdType],
    ) -> Result<(), CompactError> {
        check_lengths(src.len(), &[dst.len(), out_src.len(), out_dst.len()])?;
        self.check_ids(src)?;
        self.check_ids(dst)?;
        self.map_edges(src, dst, out_src, out_dst);
        Ok(())
    }

    /// Translates a flat array of inserted global ids into local ids.
    ///
    /// # Panics
    /// Panics if the slices differ in length or any id is `>= capacity()`.
    pub fn map_ids(&self, input: &[IdType], output: &mut [IdType]) {
        if let Err(err) = check_lengths(input.len(), &[output.len()]) {
            fatal(err);
        }
        let _span = debug_span!("map_ids", len = input.len()).entered();
        let min_len = self.ctx.min_chunk_len();
        self.ctx.install(|| {
            output
                .par_iter_mut()
                .zip(input.par_iter())
                .with_min_len(min_len)
                .for_each(|(out, &id)| *out = self.origin_slot(id).local());
        });
    }

    /// Checked [`map_ids`](Self::map_ids).
    ///
    /// # Errors
    /// Returns `CompactError::LengthMismatch` or `CompactError::IdOutOfRange`.
    pub fn try_map_ids(&self, input: &[IdType], output: &mut [IdType]) -> Result<(), CompactError> {
        check_lengths(input.len(), &[output.len()])?;
        self.check_ids(input)?;
        self.map_ids(input, output);
        Ok(())
    }

    /// Local index of `global`, or `None` if it is out of range or was never
    /// inserted.
    pub fn local_of(&self, global: IdType) -> Option<IdType> {
        let slot = self.origin.get(global as usize)?;
        slot.is_claimed_by(global).then(|| slot.local())
    }

    /// Global id behind `local`, or `None` if `local >= num_items()`.
    pub fn global_of(&self, local: IdType) -> Option<IdType> {
        let local = local as usize;
        (local < self.num_items()).then(|| self.local[local].global())
    }

    /// Empties the table for a new compaction pass.
    ///
    /// The item count drops to zero and every origin slot is marked free. The
    /// local array keeps stale entries, which stay unreachable until ids are
    /// inserted again.
    pub fn reset(&mut self) {
        let Self {
            origin,
            num_items,
            ctx,
            ..
        } = self;
        let _span = debug_span!("reset", capacity = origin.len()).entered();
        *num_items.get_mut() = 0;
        let min_len = ctx.min_chunk_len();
        let slots: &mut [OriginSlot] = origin;
        ctx.install(|| {
            slots
                .par_iter_mut()
                .with_min_len(min_len)
                .for_each(OriginSlot::clear);
        });
    }

    /// Claims `id`; the winner takes the next local index.
    #[inline]
    fn insert(&self, id: IdType) -> bool {
        let slot = self.origin_slot(id);
        if !slot.try_claim(id) {
            return false;
        }
        // `id < capacity <= MAX_CAPACITY` and each id wins once, so this stays below capacity.
        let local = self.num_items.fetch_add(1, Ordering::AcqRel);
        slot.set_local(local as IdType);
        self.local[local].set_global(id);
        true
    }

    #[inline]
    fn origin_slot(&self, id: IdType) -> &OriginSlot {
        match self.origin.get(id as usize) {
            Some(slot) => slot,
            None => fatal(CompactError::IdOutOfRange {
                id,
                capacity: self.capacity(),
            }),
        }
    }

    fn check_ids(&self, ids: &[IdType]) -> Result<(), CompactError> {
        let capacity = self.capacity();
        let min_len = self.ctx.min_chunk_len();
        let bad = self.ctx.install(|| {
            ids.par_iter()
                .with_min_len(min_len)
                .copied()
                .find_any(|&id| id as usize >= capacity)
        });
        match bad {
            Some(id) => Err(CompactError::IdOutOfRange { id, capacity }),
            None => Ok(()),
        }
    }
}

fn check_lengths(expected: usize, others: &[usize]) -> Result<(), CompactError> {
    match others.iter().find(|&&len| len != expected) {
        Some(&found) => Err(CompactError::LengthMismatch { expected, found }),
        None => Ok(()),
    }
}

impl<A: DeviceAlloc> fmt::Debug for ParallelCompactTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelCompactTable")
            .field("capacity", &self.capacity())
            .field("num_items", &self.num_items())
            .field("threads", &self.ctx.threads())
            .finish()
    }
}
