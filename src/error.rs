//! Error types for pqspan.

use thiserror::Error;

use crate::mdspan::ViewError;
use crate::resources::AllocError;

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Index parameters or array shapes violate a layout invariant.
    StructuralInvariant,
    /// A view was constructed from an unusable address or mapping.
    Precondition,
    /// The memory resource could not satisfy a request.
    Allocation,
}

/// Errors raised by index construction, allocation and view construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// `pq_bits` outside `[4, 8]`.
    #[error("`pq_bits` must be within closed range [4,8], but got {pq_bits}")]
    PqBitsOutOfRange { pq_bits: u32 },

    /// A packed PQ code would not end on a byte boundary.
    #[error("`pq_bits * pq_dim` must be a multiple of 8, but got {pq_bits} * {pq_dim} = {product}")]
    PqCodeNotByteAligned { pq_bits: u32, pq_dim: u32, product: u64 },

    /// `indices` and `pq_dataset` disagree on the index size.
    #[error("size mismatch: indices has {indices} rows, pq_dataset has {pq_dataset}")]
    SizeMismatch { indices: usize, pq_dataset: usize },

    /// An index array does not have the extents its parameters imply.
    #[error("`{array}` has extents {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        array: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// `list_offsets` does not have `n_lists + 1` entries.
    #[error("list_offsets has {actual} entries, expected n_lists + 1 = {expected}")]
    ListOffsetsLength { expected: usize, actual: usize },

    /// `list_offsets` decreases between two consecutive lists.
    #[error("list_offsets decreases at list {list}: {start} > {end}")]
    ListOffsetsNotMonotonic { list: usize, start: u64, end: u64 },

    /// `list_offsets` does not start at 0 or end at the index size.
    #[error("list_offsets must run from 0 to {size}, but runs from {first} to {last}")]
    ListOffsetsBounds { first: u64, last: u64, size: u64 },

    /// An id does not fit the index id type.
    #[error("value {value} does not fit the index id type")]
    IdOverflow { value: u64 },

    /// A scalar parameter is out of its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::View(_) => ErrorKind::Precondition,
            Error::Alloc(_) => ErrorKind::Allocation,
            Error::PqBitsOutOfRange { .. }
            | Error::PqCodeNotByteAligned { .. }
            | Error::SizeMismatch { .. }
            | Error::ShapeMismatch { .. }
            | Error::ListOffsetsLength { .. }
            | Error::ListOffsetsNotMonotonic { .. }
            | Error::ListOffsetsBounds { .. }
            | Error::IdOverflow { .. }
            | Error::InvalidParameter { .. } => ErrorKind::StructuralInvariant,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
