//! # `idcompact` - Parallel Id Compaction
//!
//! A lock-free table that turns a stream of sparse, possibly repeated integer
//! ids into a dense local index space `0..N`, keeps the mapping in both
//! directions, and remaps bulk id arrays and edge lists from global to local
//! ids in parallel. Graph sampling pipelines use it to compact node sets
//! before aggregation.
//!
//! ## Guarantees
//!
//! - **Bijection**: after inserting a set `S` of distinct ids (with any
//!   repetition or batching), `num_items() == |S|` and every id in `S` owns
//!   exactly one local index in `0..|S|`.
//! - **Stable assignment**: re-inserting an id never changes its local index.
//! - **Lock-free**: insertion is one compare-and-swap per id plus one
//!   fetch-and-add per new id. No locks anywhere.
//! - **Call-boundary ordering**: every operation joins all of its workers
//!   before returning, so each call observes everything earlier calls wrote.
//!
//! Local index order depends on scheduling and is not reproducible across
//! runs; it is always internally consistent.
//!
//! ## Architecture
//!
//! 1. **Table** ([`ParallelCompactTable`]): origin array (per global id: claim
//!    tag, local index) and local array (per local index: global id).
//! 2. **Allocation** ([`alloc`]): a [`DeviceAlloc`] hands out zeroed blocks per
//!    [`Device`]; [`DeviceBuffer`] owns them and releases on drop.
//! 3. **Execution** ([`ParallelContext`]): an explicit worker pool built from a
//!    [`ParallelConfig`], shared by any number of tables.
//!
//! ## Example
//!
//! ```rust
//! use idcompact::{ParallelCompactTable, ParallelConfig, ParallelContext};
//!
//! let ctx = ParallelContext::new(&ParallelConfig::with_threads(4)).unwrap();
//! let mut table = ParallelCompactTable::new(1 << 16, &ctx).unwrap();
//!
//! let src = [40_000, 17, 40_000];
//! let dst = [17, 9, 9];
//! table.populate_edges(&src, &dst);
//! assert_eq!(table.num_items(), 3);
//!
//! let (mut new_src, mut new_dst) = ([0; 3], [0; 3]);
//! table.map_edges(&src, &dst, &mut new_src, &mut new_dst);
//! assert!(new_src.iter().chain(&new_dst).all(|&l| l < 3));
//!
//! table.reset();
//! assert!(table.is_empty());
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

pub mod alloc;
pub mod config;
pub mod error;
pub mod table;

pub use alloc::{AllocError, Device, DeviceAlloc, DeviceBuffer, PageAlloc, SystemAlloc};
pub use config::{ConfigError, ParallelConfig, ParallelContext};
pub use error::CompactError;
pub use table::{IdType, ParallelCompactTable, MAX_CAPACITY};
