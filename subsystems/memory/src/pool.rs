//! # Page Pool
//!
//! A cache of freed blocks of one fixed order.
//!
//! Freed blocks are sorted into two FIFO queues by where they live: `low`
//! for permanently mapped memory and `high` for highmem blocks. Allocation
//! hands out highmem blocks first, while shrinking gives low blocks back
//! first and only touches highmem blocks when the reclaimer asked for
//! them. Highmem blocks are the expensive ones to prepare again, so they
//! are the last to leave the pool through reclaim.
//!
//! ## Locking
//!
//! One spinlock covers both queues and both counts. Allocation paths only
//! ever `try_lock` it and fall back to the page allocator when it is busy.
//! `free` takes it for a single queue insert. `shrink` takes it once per
//! removed block and drops it before calling into the allocator.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::accounting::{global_accounting, PoolAccounting};
use crate::context::TaskContext;
use crate::error::{PoolError, PoolResult};
use crate::page::{GfpFlags, Page, PageAllocator};

/// The pooled blocks, guarded together by the pool lock
struct PoolLists {
    low_items: VecDeque<Page>,
    high_items: VecDeque<Page>,
}

/// A block handed out by [`PagePool::alloc`]
#[derive(Debug)]
pub struct Allocation {
    /// The block
    pub page: Page,
    /// The block came out of the pool rather than the page allocator
    pub from_pool: bool,
}

/// Per-order page cache
pub struct PagePool {
    order: u32,
    gfp_mask: GfpFlags,
    cached: bool,
    lists: Mutex<PoolLists>,
    /// Written only with `lists` locked; read without it
    low_count: AtomicUsize,
    /// Written only with `lists` locked; read without it
    high_count: AtomicUsize,
    allocator: Arc<dyn PageAllocator>,
    accounting: &'static PoolAccounting,
}

impl PagePool {
    /// Create a pool accounted in the process-wide counters
    pub fn new(allocator: Arc<dyn PageAllocator>, gfp_mask: GfpFlags, order: u32, cached: bool) -> Self {
        Self::with_accounting(allocator, gfp_mask, order, cached, global_accounting())
    }

    /// Create a pool accounted in `accounting`
    pub fn with_accounting(
        allocator: Arc<dyn PageAllocator>,
        gfp_mask: GfpFlags,
        order: u32,
        cached: bool,
        accounting: &'static PoolAccounting,
    ) -> Self {
        Self {
            order,
            gfp_mask,
            cached,
            lists: Mutex::new(PoolLists {
                low_items: VecDeque::new(),
                high_items: VecDeque::new(),
            }),
            low_count: AtomicUsize::new(0),
            high_count: AtomicUsize::new(0),
            allocator,
            accounting,
        }
    }

    /// Block order served by this pool
    #[inline]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Flags used for fresh allocations
    #[inline]
    pub fn gfp_mask(&self) -> GfpFlags {
        self.gfp_mask
    }

    /// Whether pooled blocks are CPU-cache-coherently mapped
    #[inline]
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Pooled low blocks
    #[inline]
    pub fn low_count(&self) -> usize {
        self.low_count.load(Ordering::Relaxed)
    }

    /// Pooled highmem blocks
    #[inline]
    pub fn high_count(&self) -> usize {
        self.high_count.load(Ordering::Relaxed)
    }

    fn alloc_pages(&self) -> Option<Page> {
        self.allocator.alloc_pages(self.gfp_mask, self.order)
    }

    fn free_pages(&self, page: Page) {
        self.allocator.free_pages(page, self.order);
    }

    fn add(&self, page: Page) {
        let mut lists = self.lists.lock();
        if page.is_highmem() {
            lists.high_items.push_back(page);
            self.high_count.fetch_add(1, Ordering::Relaxed);
        } else {
            lists.low_items.push_back(page);
            self.low_count.fetch_add(1, Ordering::Relaxed);
        }
        self.accounting.add_block(self.order);
    }

    /// Take the oldest block from one queue. Caller holds the pool lock.
    fn remove(&self, lists: &mut PoolLists, high: bool) -> Page {
        let page = if high {
            assert!(self.high_count() != 0, "page pool: remove from empty high list");
            self.high_count.fetch_sub(1, Ordering::Relaxed);
            lists.high_items.pop_front()
        } else {
            assert!(self.low_count() != 0, "page pool: remove from empty low list");
            self.low_count.fetch_sub(1, Ordering::Relaxed);
            lists.low_items.pop_front()
        };
        let page = page.expect("page pool: count out of sync with list");
        self.accounting.remove_block(self.order);
        page
    }

    /// Take one pooled block, highmem first, without waiting for the lock
    fn try_remove(&self) -> Option<Page> {
        let mut lists = self.lists.try_lock()?;
        if self.high_count() != 0 {
            Some(self.remove(&mut lists, true))
        } else if self.low_count() != 0 {
            Some(self.remove(&mut lists, false))
        } else {
            None
        }
    }

    /// Allocate a block, from the pool if `from_pool` is set and a pooled
    /// block can be had without waiting, else from the page allocator.
    pub fn alloc(&self, ctx: &dyn TaskContext, from_pool: bool) -> PoolResult<Allocation> {
        if ctx.fatal_signal_pending() {
            return Err(PoolError::Interrupted);
        }

        if from_pool {
            if let Some(page) = self.try_remove() {
                return Ok(Allocation {
                    page,
                    from_pool: true,
                });
            }
        }

        match self.alloc_pages() {
            Some(page) => Ok(Allocation {
                page,
                from_pool: false,
            }),
            None => Err(PoolError::OutOfMemory),
        }
    }

    /// Allocate a pooled block only; never calls into the page allocator
    pub fn alloc_pool_only(&self) -> PoolResult<Page> {
        self.try_remove().ok_or(PoolError::OutOfMemory)
    }

    /// Return a block to the pool
    pub fn free(&self, page: Page) {
        debug_assert_eq!(page.order(), self.order, "page pool: order mismatch");
        self.add(page);
    }

    /// Return a block straight to the page allocator, bypassing the pool
    pub fn free_immediate(&self, page: Page) {
        self.free_pages(page);
    }

    /// Pooled base pages, counting highmem blocks only if `high` is set.
    /// Lock-free, may be stale.
    pub fn total(&self, high: bool) -> usize {
        let mut count = self.low_count();
        if high {
            count += self.high_count();
        }
        count << self.order
    }

    /// Release up to `nr_to_scan` base pages back to the page allocator.
    ///
    /// With `nr_to_scan == 0` nothing is released and the number of
    /// releasable base pages is returned instead. Highmem blocks are only
    /// releasable for the reclaim worker or when `gfp_mask` allows highmem.
    /// Returns the number of base pages released.
    pub fn shrink(&self, ctx: &dyn TaskContext, gfp_mask: GfpFlags, nr_to_scan: usize) -> usize {
        let high = ctx.is_kswapd() || gfp_mask.contains(GfpFlags::HIGHMEM);

        if nr_to_scan == 0 {
            return self.total(high);
        }

        let mut freed = 0;
        while freed < nr_to_scan {
            let page = {
                let mut lists = self.lists.lock();
                if self.low_count() != 0 {
                    self.remove(&mut lists, false)
                } else if high && self.high_count() != 0 {
                    self.remove(&mut lists, true)
                } else {
                    break;
                }
            };
            self.free_pages(page);
            freed += 1 << self.order;
        }

        freed
    }
}

impl Drop for PagePool {
    fn drop(&mut self) {
        let lists = self.lists.get_mut();
        let leftover = lists.low_items.len() + lists.high_items.len();
        if leftover != 0 {
            log::debug!(
                "PagePool: releasing {} blocks of order {} on destroy",
                leftover,
                self.order
            );
        }
        let low = core::mem::take(&mut lists.low_items);
        let high = core::mem::take(&mut lists.high_items);
        for page in low.into_iter().chain(high) {
            self.accounting.remove_block(self.order);
            self.allocator.free_pages(page, self.order);
        }
        self.low_count.store(0, Ordering::Relaxed);
        self.high_count.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for PagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePool")
            .field("order", &self.order)
            .field("gfp_mask", &self.gfp_mask)
            .field("cached", &self.cached)
            .field("low_count", &self.low_count())
            .field("high_count", &self.high_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(PagePool: Send, Sync);
