//! Precondition errors raised while constructing views.

use thiserror::Error;

/// A view could not be constructed from the supplied address and mapping.
///
/// All of these are detected before any element is read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// Extents and strides have different lengths.
    #[error("rank mismatch: {extents} extents vs {strides} strides")]
    RankMismatch { extents: usize, strides: usize },

    /// The requested rank does not match the number of extents supplied.
    #[error("expected {expected} extents, got {actual}")]
    WrongRank { expected: usize, actual: usize },

    /// Base address does not satisfy the alignment of an aligned view.
    #[error("address {addr:#x} is not aligned to {alignment} bytes")]
    Misaligned { addr: usize, alignment: usize },

    /// Element size does not evenly divide the view alignment, so padded rows
    /// cannot all start on an aligned boundary.
    #[error("element size {size} does not divide the {alignment}-byte alignment")]
    UnsupportedElementSize { size: usize, alignment: usize },

    /// Null base address for a non-empty view.
    #[error("null base address for a view of {len} elements")]
    NullPointer { len: usize },

    /// Backing storage is shorter than the mapping requires.
    #[error("mapping spans {required} elements but only {available} are available")]
    SpanTooSmall { required: usize, available: usize },

    /// Extents/strides overflow `usize` when computing the span.
    #[error("span of extents {extents:?} with strides {strides:?} overflows")]
    SpanOverflow {
        extents: Vec<usize>,
        strides: Vec<usize>,
    },

    /// Host data supplied for a copy has the wrong number of elements.
    #[error("length mismatch: view holds {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}
