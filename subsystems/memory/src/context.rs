//! # Task Context
//!
//! What the pools need to know about the task calling into them.

/// Properties of the calling task
pub trait TaskContext {
    /// A fatal signal is pending for the task; allocation paths must bail out
    fn fatal_signal_pending(&self) -> bool;

    /// The task is the dedicated background reclaim worker
    fn is_kswapd(&self) -> bool;
}

/// A plain kernel task with no signal pending
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelTask;

impl TaskContext for KernelTask {
    fn fatal_signal_pending(&self) -> bool {
        false
    }

    fn is_kswapd(&self) -> bool {
        false
    }
}

/// The background reclaim worker
#[derive(Debug, Clone, Copy, Default)]
pub struct ReclaimWorker;

impl TaskContext for ReclaimWorker {
    fn fatal_signal_pending(&self) -> bool {
        false
    }

    fn is_kswapd(&self) -> bool {
        true
    }
}
