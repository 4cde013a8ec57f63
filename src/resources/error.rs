//! Allocation errors.

use thiserror::Error;

use crate::mdspan::MemoryType;

/// The memory resource could not satisfy a request.
///
/// Propagated to the caller as-is; no retry happens at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Request would push usage past the configured budget.
    #[error("allocating {requested} bytes of {space} memory would exceed the budget ({used}/{budget} bytes used)")]
    BudgetExceeded {
        requested: usize,
        used: usize,
        budget: usize,
        space: MemoryType,
    },

    /// The underlying allocator returned no memory.
    #[error("out of {space} memory allocating {bytes} bytes")]
    OutOfMemory { bytes: usize, space: MemoryType },

    /// Element count times element size does not fit in `usize`/`isize`.
    #[error("{elements} elements of {elem_size} bytes overflow the address space")]
    SizeOverflow { elements: usize, elem_size: usize },

    /// Requested alignment is not a power of two.
    #[error("invalid alignment {align}")]
    InvalidAlignment { align: usize },

    /// Bookkeeping lock poisoned by a panicking thread.
    #[error("memory resource lock poisoned")]
    LockPoisoned,
}
