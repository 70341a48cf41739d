//! # Pool Accounting
//!
//! Process-wide count of pages sitting in page pools, shared by pools of
//! every order.
//!
//! `nr_total_pages` is updated with a plain load followed by a store rather
//! than an atomic read-modify-write, so it never bounces a locked cache line
//! between CPUs. Concurrent updates from pools on other CPUs can be lost;
//! the resulting drift is tolerated, and a negative value is clamped to zero
//! when read. The reclaimable byte counter feeds reclaim decisions and is
//! kept exact.

use core::sync::atomic::{AtomicIsize, Ordering};

use crate::page::order_to_size;

/// Pooled memory counters
#[derive(Debug)]
pub struct PoolAccounting {
    /// Pooled base pages (advisory, may drift)
    nr_total_pages: AtomicIsize,
    /// Pooled bytes visible to the reclaim path
    reclaimable_bytes: AtomicIsize,
}

impl PoolAccounting {
    /// Create zeroed counters
    pub const fn new() -> Self {
        Self {
            nr_total_pages: AtomicIsize::new(0),
            reclaimable_bytes: AtomicIsize::new(0),
        }
    }

    /// Account one block of `order` entering a pool
    pub(crate) fn add_block(&self, order: u32) {
        let pages = self.nr_total_pages.load(Ordering::Relaxed);
        self.nr_total_pages
            .store(pages.wrapping_add(1 << order), Ordering::Relaxed);
        self.reclaimable_bytes
            .fetch_add(order_to_size(order) as isize, Ordering::Relaxed);
    }

    /// Account one block of `order` leaving a pool
    pub(crate) fn remove_block(&self, order: u32) {
        let pages = self.nr_total_pages.load(Ordering::Relaxed);
        self.nr_total_pages
            .store(pages.wrapping_sub(1 << order), Ordering::Relaxed);
        self.reclaimable_bytes
            .fetch_sub(order_to_size(order) as isize, Ordering::Relaxed);
    }

    /// Pooled base pages
    ///
    /// A negative count left behind by racing writers is reset to zero.
    pub fn nr_pages(&self) -> usize {
        let pages = self.nr_total_pages.load(Ordering::Relaxed);
        if pages < 0 {
            self.nr_total_pages.store(0, Ordering::Relaxed);
            return 0;
        }
        pages as usize
    }

    /// Pooled bytes reported to the reclaim path
    pub fn reclaimable_bytes(&self) -> usize {
        self.reclaimable_bytes.load(Ordering::Relaxed).max(0) as usize
    }
}

impl Default for PoolAccounting {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_ACCOUNTING: PoolAccounting = PoolAccounting::new();

/// Accounting shared by every pool created without an explicit instance
pub fn global_accounting() -> &'static PoolAccounting {
    &GLOBAL_ACCOUNTING
}

/// Base pages currently held by all pools (advisory)
pub fn pooled_page_count() -> usize {
    GLOBAL_ACCOUNTING.nr_pages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_SIZE;

    #[test]
    fn test_add_remove() {
        let acct = PoolAccounting::new();
        acct.add_block(4);
        acct.add_block(0);
        assert_eq!(acct.nr_pages(), 17);
        assert_eq!(acct.reclaimable_bytes(), 17 * PAGE_SIZE);

        acct.remove_block(4);
        assert_eq!(acct.nr_pages(), 1);
        assert_eq!(acct.reclaimable_bytes(), PAGE_SIZE);
    }

    #[test]
    fn test_negative_count_clamped_on_read() {
        let acct = PoolAccounting::new();
        acct.remove_block(2);
        assert_eq!(acct.nr_pages(), 0);

        // The clamp is written back, so later adds start from zero
        acct.add_block(0);
        assert_eq!(acct.nr_pages(), 1);
    }
}
