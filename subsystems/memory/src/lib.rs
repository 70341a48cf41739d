//! # Helix Memory Subsystem
//!
//! Physical page recycling for the Helix kernel.
//!
//! ## Components
//!
//! - **Page**: an exclusively owned block of `1 << order` base pages
//! - **Page Pool**: a per-order cache of freed blocks, split into a low and a
//!   high (highmem) queue
//! - **Pool Heap**: the set of pools a heap owns, indexed by order, and the
//!   shrinker the reclaim path calls into
//! - **Accounting**: the process-wide pooled page counter
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Pool Heap                            │
//! │   order 8 ─┐        order 4 ─┐        order 0 ─┐             │
//! │   ┌────────▼───┐    ┌────────▼───┐    ┌────────▼───┐         │
//! │   │  PagePool  │    │  PagePool  │    │  PagePool  │  ◀── Shrinker
//! │   │ high │ low │    │ high │ low │    │ high │ low │         │
//! │   └──────┬─────┘    └──────┬─────┘    └──────┬─────┘         │
//! │          └──────────────┬──┴─────────────────┘               │
//! │                         ▼                                    │
//! │                   PageAllocator                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! 1. A pool's `low_count`/`high_count` always equal the lengths of the
//!    corresponding queues. Both are only written with the pool lock held.
//! 2. The pool lock is never held across a call into the page allocator.
//! 3. The process-wide pooled page counter is advisory. It may drift under
//!    concurrent updates and is clamped to zero when observed negative.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod accounting;
pub mod context;
pub mod error;
pub mod heap;
pub mod page;
pub mod pool;

pub use accounting::{pooled_page_count, PoolAccounting};
pub use context::TaskContext;
pub use error::{PoolError, PoolResult};
pub use heap::{HeapConfig, PoolHeap, ShrinkControl, Shrinker};
pub use page::{GfpFlags, Page, PageAllocator, PAGE_SHIFT, PAGE_SIZE};
pub use pool::PagePool;

#[cfg(test)]
pub(crate) mod testing;
