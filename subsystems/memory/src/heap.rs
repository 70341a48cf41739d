//! # Pool Heap
//!
//! The set of page pools a system heap keeps, one cached and one uncached
//! pool per configured order, and the shrinker the reclaim path drives.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::accounting::{global_accounting, PoolAccounting};
use crate::context::TaskContext;
use crate::error::{PoolError, PoolResult};
use crate::page::{order_to_size, GfpFlags, Page, PageAllocator, MAX_ORDER};
use crate::pool::{Allocation, PagePool};

// =============================================================================
// Configuration
// =============================================================================

/// Orders a system heap pools by default, largest first
pub const DEFAULT_ORDERS: [u32; 3] = [8, 4, 0];

/// Orders above this use the opportunistic high-order flags
pub const HIGH_ORDER_THRESHOLD: u32 = 4;

/// Pool heap configuration
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Pooled orders, strictly descending
    pub orders: &'static [u32],
    /// Flags for fresh allocations above [`HIGH_ORDER_THRESHOLD`]
    pub high_order_gfp: GfpFlags,
    /// Flags for fresh allocations at or below [`HIGH_ORDER_THRESHOLD`]
    pub low_order_gfp: GfpFlags,
}

impl HeapConfig {
    /// The system heap layout
    pub const fn system() -> Self {
        Self {
            orders: &DEFAULT_ORDERS,
            // High orders are opportunistic: no reclaim, no retries, no noise
            high_order_gfp: GfpFlags::from_bits_truncate(
                (GfpFlags::HIGHUSER.bits()
                    | GfpFlags::ZERO.bits()
                    | GfpFlags::NOWARN.bits()
                    | GfpFlags::NORETRY.bits())
                    & !GfpFlags::RECLAIM.bits(),
            ),
            low_order_gfp: GfpFlags::from_bits_truncate(
                GfpFlags::HIGHUSER.bits() | GfpFlags::ZERO.bits(),
            ),
        }
    }

    /// Allocation flags for a pool of `order`
    pub fn gfp_for(&self, order: u32) -> GfpFlags {
        let gfp = if order > HIGH_ORDER_THRESHOLD {
            self.high_order_gfp
        } else {
            self.low_order_gfp
        };
        if order > 0 {
            gfp | GfpFlags::COMP
        } else {
            gfp
        }
    }

    fn validate(&self) -> PoolResult<()> {
        let descending = self.orders.windows(2).all(|w| w[0] > w[1]);
        let in_range = self.orders.iter().all(|&o| o <= MAX_ORDER);
        if self.orders.is_empty() || !descending || !in_range {
            return Err(PoolError::InvalidPool);
        }
        Ok(())
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::system()
    }
}

// =============================================================================
// Shrinker Interface
// =============================================================================

/// Parameters of one reclaim request
#[derive(Debug, Clone, Copy)]
pub struct ShrinkControl {
    /// Flags of the allocation that triggered reclaim
    pub gfp_mask: GfpFlags,
    /// Base pages the reclaimer wants back
    pub nr_to_scan: usize,
}

/// A cache the reclaim path can ask to give memory back
pub trait Shrinker {
    /// Base pages that could be released for this request
    fn count_objects(&self, ctx: &dyn TaskContext, sc: &ShrinkControl) -> usize;

    /// Release up to `sc.nr_to_scan` base pages; returns base pages released
    fn scan_objects(&self, ctx: &dyn TaskContext, sc: &ShrinkControl) -> usize;
}

// =============================================================================
// Pool Heap
// =============================================================================

/// Cached and uncached page pools indexed by order
#[derive(Debug)]
pub struct PoolHeap {
    config: HeapConfig,
    uncached: Vec<PagePool>,
    cached: Vec<PagePool>,
}

impl PoolHeap {
    /// Create the pools described by `config`
    pub fn new(allocator: Arc<dyn PageAllocator>, config: HeapConfig) -> PoolResult<Self> {
        Self::with_accounting(allocator, config, global_accounting())
    }

    /// Create the pools, accounted in `accounting`
    pub fn with_accounting(
        allocator: Arc<dyn PageAllocator>,
        config: HeapConfig,
        accounting: &'static PoolAccounting,
    ) -> PoolResult<Self> {
        config.validate()?;

        let make = |cached: bool| -> Vec<PagePool> {
            config
                .orders
                .iter()
                .map(|&order| {
                    PagePool::with_accounting(
                        allocator.clone(),
                        config.gfp_for(order),
                        order,
                        cached,
                        accounting,
                    )
                })
                .collect()
        };
        let uncached = make(false);
        let cached = make(true);

        log::info!("PoolHeap: {} orders {:?}", config.orders.len(), config.orders);

        Ok(Self {
            config,
            uncached,
            cached,
        })
    }

    /// Heap configuration
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    fn pools(&self, cached: bool) -> &[PagePool] {
        if cached {
            &self.cached
        } else {
            &self.uncached
        }
    }

    /// The pool serving `order`
    pub fn pool(&self, order: u32, cached: bool) -> PoolResult<&PagePool> {
        self.pools(cached)
            .iter()
            .find(|p| p.order() == order)
            .ok_or(PoolError::InvalidPool)
    }

    /// Allocate one block of `order`
    pub fn alloc(
        &self,
        ctx: &dyn TaskContext,
        order: u32,
        cached: bool,
        from_pool: bool,
    ) -> PoolResult<Allocation> {
        self.pool(order, cached)?.alloc(ctx, from_pool)
    }

    /// Allocate one pooled block of `order`, never a fresh one
    pub fn alloc_pool_only(&self, order: u32, cached: bool) -> PoolResult<Page> {
        self.pool(order, cached)?.alloc_pool_only()
    }

    /// Allocate the largest block not exceeding `size` bytes nor `max_order`
    pub fn alloc_largest_available(
        &self,
        ctx: &dyn TaskContext,
        size: usize,
        max_order: u32,
        cached: bool,
    ) -> PoolResult<Allocation> {
        for pool in self.pools(cached) {
            if size < order_to_size(pool.order()) || max_order < pool.order() {
                continue;
            }
            match pool.alloc(ctx, true) {
                Ok(allocation) => return Ok(allocation),
                Err(PoolError::OutOfMemory) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(PoolError::OutOfMemory)
    }

    /// Give a block back to its pool
    pub fn free(&self, page: Page, cached: bool) -> PoolResult<()> {
        self.pool(page.order(), cached)?.free(page);
        Ok(())
    }

    /// Pooled base pages across every pool of this heap
    pub fn total_pages(&self) -> usize {
        self.uncached
            .iter()
            .chain(self.cached.iter())
            .map(|pool| pool.total(true))
            .sum()
    }
}

impl Shrinker for PoolHeap {
    fn count_objects(&self, ctx: &dyn TaskContext, sc: &ShrinkControl) -> usize {
        self.uncached
            .iter()
            .chain(self.cached.iter())
            .map(|pool| pool.shrink(ctx, sc.gfp_mask, 0))
            .sum()
    }

    fn scan_objects(&self, ctx: &dyn TaskContext, sc: &ShrinkControl) -> usize {
        if sc.nr_to_scan == 0 {
            return 0;
        }

        let mut remaining = sc.nr_to_scan;
        let mut freed = 0;
        for pool in self.uncached.iter().chain(self.cached.iter()) {
            let released = pool.shrink(ctx, sc.gfp_mask, remaining);
            freed += released;
            remaining = remaining.saturating_sub(released);
            if remaining == 0 {
                break;
            }
        }

        log::debug!("PoolHeap: shrink released {} of {} pages", freed, sc.nr_to_scan);
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{KernelTask, ReclaimWorker};
    use crate::testing::{DyingTask, FakeAllocator};
    use alloc::boxed::Box;

    fn heap() -> (Arc<FakeAllocator>, PoolHeap) {
        let alloc = Arc::new(FakeAllocator::new());
        let acct: &'static PoolAccounting = Box::leak(Box::new(PoolAccounting::new()));
        let heap = PoolHeap::with_accounting(alloc.clone(), HeapConfig::system(), acct).unwrap();
        (alloc, heap)
    }

    #[test]
    fn test_gfp_per_order() {
        let config = HeapConfig::system();
        let high = config.gfp_for(8);
        assert!(high.contains(GfpFlags::NORETRY | GfpFlags::COMP));
        assert!(!high.intersects(GfpFlags::RECLAIM));

        let low = config.gfp_for(0);
        assert!(low.contains(GfpFlags::ZERO | GfpFlags::HIGHMEM));
        assert!(!low.contains(GfpFlags::COMP));
    }

    #[test]
    fn test_invalid_config_rejected() {
        static UNSORTED: [u32; 2] = [0, 4];
        let config = HeapConfig {
            orders: &UNSORTED,
            ..HeapConfig::system()
        };
        let alloc = Arc::new(FakeAllocator::new());
        assert_eq!(PoolHeap::new(alloc, config).unwrap_err(), PoolError::InvalidPool);
    }

    #[test]
    fn test_missing_pool_is_invalid() {
        let (_, heap) = heap();
        assert_eq!(heap.alloc_pool_only(3, false).unwrap_err(), PoolError::InvalidPool);
        assert!(heap.pool(4, true).unwrap().is_cached());
    }

    #[test]
    fn test_alloc_largest_available() {
        let (alloc, heap) = heap();
        let got = heap
            .alloc_largest_available(&KernelTask, order_to_size(8), 8, false)
            .unwrap();
        assert_eq!(got.page.order(), 8);

        let got = heap
            .alloc_largest_available(&KernelTask, order_to_size(8), 4, false)
            .unwrap();
        assert_eq!(got.page.order(), 4);

        let got = heap
            .alloc_largest_available(&KernelTask, order_to_size(2), 8, false)
            .unwrap();
        assert_eq!(got.page.order(), 0);

        assert_eq!(
            heap.alloc_largest_available(&DyingTask, order_to_size(8), 8, false)
                .unwrap_err(),
            PoolError::Interrupted
        );
        assert_eq!(alloc.allocated(), 3);
    }

    #[test]
    fn test_alloc_largest_prefers_pooled() {
        let (alloc, heap) = heap();
        heap.free(alloc.page(4, false), false).unwrap();

        let got = heap
            .alloc_largest_available(&KernelTask, order_to_size(4), 8, false)
            .unwrap();
        assert!(got.from_pool);
        assert_eq!(alloc.allocated(), 0);
    }

    #[test]
    fn test_shrinker_count_and_scan() {
        let (alloc, heap) = heap();
        heap.free(alloc.page(4, false), false).unwrap();
        heap.free(alloc.page(0, false), true).unwrap();
        heap.free(alloc.page(0, true), true).unwrap();

        let query = ShrinkControl {
            gfp_mask: GfpFlags::KERNEL,
            nr_to_scan: 0,
        };
        assert_eq!(heap.count_objects(&KernelTask, &query), 17);
        assert_eq!(heap.count_objects(&ReclaimWorker, &query), 18);
        assert_eq!(heap.scan_objects(&KernelTask, &query), 0);

        let scan = ShrinkControl {
            gfp_mask: GfpFlags::KERNEL,
            nr_to_scan: 17,
        };
        assert_eq!(heap.scan_objects(&KernelTask, &scan), 17);
        assert_eq!(heap.total_pages(), 1);

        assert_eq!(heap.scan_objects(&ReclaimWorker, &scan), 1);
        assert_eq!(heap.total_pages(), 0);
    }
}
