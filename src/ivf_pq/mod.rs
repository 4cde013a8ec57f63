//! IVF-PQ: Inverted File with Product Quantization.
//!
//! Two ideas combined:
//!
//! 1. **IVF (Inverted File)**: partition space into `n_lists` Voronoi cells
//!    and only search the `n_probes` cells nearest the query.
//! 2. **PQ (Product Quantization)**: split each (rotated) vector into
//!    `pq_dim` subvectors of `pq_len` components and store, per subvector, the
//!    `pq_bits`-bit index of its nearest codebook entry.
//!
//! This module holds the *container* a trainer fills in and a searcher reads:
//! parameters, derived dimensions, and the device arrays, kept mutually
//! consistent. Training and search are separate concerns.
//!
//! ## Rotation
//!
//! PQ needs `pq_dim` to divide the dimensionality. When it does not, vectors
//! are rotated (and zero-extended) into `rot_dim = pq_len * pq_dim`
//! dimensions first:
//!
//! ```text
//! dim = 100, pq_dim = 32  ->  pq_len = ceil(100 / 32) = 4,  rot_dim = 128
//!
//!   x[0..100] --rotation_matrix[128 x 100]--> x'[0..128]
//!             └─┬─┘ └─┬─┘       ...      └─┬─┘
//!              c₀    c₁                   c₃₁     (32 codes of 4 bits = 16 bytes)
//! ```
//!
//! ## Storage
//!
//! Encoded vectors are grouped by list: list `l` owns rows
//! `list_offsets[l]..list_offsets[l + 1]` of `pq_dataset`, and `indices`
//! maps each row back to its source id.
//!
//! ## Usage
//!
//! ```rust
//! use pqspan::ivf_pq::{Index, IndexParams};
//! use pqspan::Resources;
//!
//! let res = Resources::new();
//! let params = IndexParams { n_lists: 16, ..Default::default() };
//!
//! let mut index: Index<u64> = Index::from_params(&res, &params, 128, 0)?;
//! assert_eq!(index.pq_dim(), 64);
//! assert_eq!(index.rot_dim(), 128);
//!
//! index.allocate(&res, 1000)?;
//! assert_eq!(index.pq_dataset().extents(), [1000, 64]);
//! # Ok::<(), pqspan::Error>(())
//! ```
//!
//! ## Trade-offs
//!
//! | Parameter | ↑ Effect |
//! |-----------|----------|
//! | n_probes | Better recall, slower search |
//! | n_lists | Better partitioning, slower training |
//! | pq_dim | Larger codes, better accuracy |
//! | pq_bits | Larger codebooks, better accuracy |
//!
//! ## References
//!
//! - Jégou, Douze, Schmid (2011). "Product Quantization for Nearest Neighbor Search."
//! - Ge et al. (2014). "Optimized Product Quantization."

pub mod index;
pub mod params;

pub use index::{calculate_pq_dim, Index, IndexId};
pub use params::{
    CodebookGen, IndexParams, InternalDistanceDtype, LutDtype, SearchParams, THREAD_BLOCK_SIZES,
};
