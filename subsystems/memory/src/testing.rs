//! Test doubles for the page allocator and task context.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use spin::Mutex;

use crate::context::TaskContext;
use crate::page::{GfpFlags, Page, PageAllocator};

/// Allocator handing out increasing pfns
pub(crate) struct FakeAllocator {
    next_pfn: AtomicU64,
    highmem: AtomicBool,
    fail: AtomicBool,
    allocated: AtomicUsize,
    freed: Mutex<Vec<u64>>,
    last_gfp: Mutex<Option<GfpFlags>>,
}

impl FakeAllocator {
    pub(crate) fn new() -> Self {
        Self {
            next_pfn: AtomicU64::new(0x1000),
            highmem: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            allocated: AtomicUsize::new(0),
            freed: Mutex::new(Vec::new()),
            last_gfp: Mutex::new(None),
        }
    }

    /// Classify subsequently allocated blocks as highmem
    pub(crate) fn set_highmem(&self, highmem: bool) {
        self.highmem.store(highmem, Ordering::SeqCst);
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub(crate) fn freed(&self) -> Vec<u64> {
        self.freed.lock().clone()
    }

    pub(crate) fn last_gfp(&self) -> Option<GfpFlags> {
        *self.last_gfp.lock()
    }

    /// Block owned by the test, not counted as an allocation
    pub(crate) fn page(&self, order: u32, highmem: bool) -> Page {
        let pfn = self.next_pfn.fetch_add(1 << order, Ordering::SeqCst);
        Page::new(pfn, order, highmem)
    }
}

impl PageAllocator for FakeAllocator {
    fn alloc_pages(&self, gfp: GfpFlags, order: u32) -> Option<Page> {
        *self.last_gfp.lock() = Some(gfp);
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        self.allocated.fetch_add(1, Ordering::SeqCst);
        let highmem = self.highmem.load(Ordering::SeqCst);
        Some(self.page(order, highmem))
    }

    fn free_pages(&self, page: Page, order: u32) {
        assert_eq!(page.order(), order);
        self.freed.lock().push(page.pfn());
    }
}

/// Task with a pending fatal signal
pub(crate) struct DyingTask;

impl TaskContext for DyingTask {
    fn fatal_signal_pending(&self) -> bool {
        true
    }

    fn is_kswapd(&self) -> bool {
        false
    }
}
