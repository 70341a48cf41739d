//! # Page Blocks
//!
//! The unit the page pools trade in, and the allocator seam they sit on.

use static_assertions::const_assert_eq;

/// log2 of the base page size
pub const PAGE_SHIFT: u32 = 12;

/// Base page size in bytes
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Highest order a block may have
pub const MAX_ORDER: u32 = 11;

const_assert_eq!(PAGE_SIZE, 4096);

// ============================================================================
// Allocation Flags
// ============================================================================

bitflags::bitflags! {
    /// Allocation hints handed to the page allocator
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GfpFlags: u32 {
        /// ISA DMA zone
        const DMA = 1 << 0;
        /// High memory zone allowed
        const HIGHMEM = 1 << 1;
        /// 32-bit DMA zone
        const DMA32 = 1 << 2;
        /// Movable allocation
        const MOVABLE = 1 << 3;
        /// Reclaimable allocation
        const RECLAIMABLE = 1 << 4;
        /// High priority, may use emergency reserves
        const HIGH = 1 << 5;
        /// May start physical I/O
        const IO = 1 << 6;
        /// May call into the filesystem layer
        const FS = 1 << 7;
        /// Zero the block before returning it
        const ZERO = 1 << 8;
        /// Suppress allocation failure reports
        const NOWARN = 1 << 9;
        /// Fail instead of retrying hard
        const NORETRY = 1 << 10;
        /// Compound page
        const COMP = 1 << 11;
        /// May enter direct reclaim
        const DIRECT_RECLAIM = 1 << 12;
        /// May wake the reclaim worker
        const KSWAPD_RECLAIM = 1 << 13;

        /// Any form of reclaim
        const RECLAIM = Self::DIRECT_RECLAIM.bits() | Self::KSWAPD_RECLAIM.bits();
        /// Regular kernel allocation
        const KERNEL = Self::RECLAIM.bits() | Self::IO.bits() | Self::FS.bits();
        /// User allocation that may live in high memory
        const HIGHUSER = Self::KERNEL.bits() | Self::HIGHMEM.bits();
    }
}

// ============================================================================
// Page
// ============================================================================

/// A block of `1 << order` contiguous base pages.
///
/// Holding a `Page` means owning the block; it is handed back to a pool or
/// to the allocator by value.
#[derive(Debug, PartialEq, Eq)]
pub struct Page {
    pfn: u64,
    order: u32,
    highmem: bool,
}

impl Page {
    /// Wrap a block handed out by the page allocator
    pub const fn new(pfn: u64, order: u32, highmem: bool) -> Self {
        Self {
            pfn,
            order,
            highmem,
        }
    }

    /// Page frame number of the first base page
    #[inline]
    pub const fn pfn(&self) -> u64 {
        self.pfn
    }

    /// Block order
    #[inline]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Whether the block lives in high memory (not permanently mapped)
    #[inline]
    pub const fn is_highmem(&self) -> bool {
        self.highmem
    }

    /// Physical address of the block
    #[inline]
    pub const fn phys_addr(&self) -> u64 {
        self.pfn << PAGE_SHIFT
    }

    /// Number of base pages in the block
    #[inline]
    pub const fn nr_pages(&self) -> usize {
        1 << self.order
    }

    /// Size of the block in bytes
    #[inline]
    pub const fn size(&self) -> usize {
        PAGE_SIZE << self.order
    }
}

/// Block size in bytes for `order`
#[inline]
pub const fn order_to_size(order: u32) -> usize {
    PAGE_SIZE << order
}

// ============================================================================
// Page Allocator
// ============================================================================

/// The physical page allocator the pools fall back to
pub trait PageAllocator: Send + Sync {
    /// Allocate a block of `1 << order` base pages
    fn alloc_pages(&self, gfp: GfpFlags, order: u32) -> Option<Page>;

    /// Return a block to the allocator
    fn free_pages(&self, page: Page, order: u32);
}
