//! Error types for page pool operations.

use core::fmt;

/// Result type for page pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Page pool errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// A fatal signal is pending for the caller; abort, do not retry
    Interrupted,
    /// Nothing pooled and the fallback allocation failed (or was not allowed)
    OutOfMemory,
    /// No pool exists for the requested order
    InvalidPool,
}

impl PoolError {
    /// Kernel errno equivalent (negative)
    pub const fn to_errno(self) -> i32 {
        match self {
            PoolError::Interrupted => -4,
            PoolError::OutOfMemory => -12,
            PoolError::InvalidPool => -22,
        }
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Interrupted => write!(f, "interrupted by fatal signal"),
            PoolError::OutOfMemory => write!(f, "out of memory"),
            PoolError::InvalidPool => write!(f, "invalid page pool"),
        }
    }
}
