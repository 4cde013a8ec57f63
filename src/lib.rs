//! pqspan: IVF-PQ index storage over memory-space-aware array views.
//!
//! Organized bottom-up:
//!
//! - `mdspan/`: non-owning strided views tagged with a memory space and a layout
//! - `resources/`: memory resources, streams, host/device copies
//! - `mdarray/`: owned arrays allocated through a [`Resources`] handle
//! - `ivf_pq/`: the IVF-PQ index container and its parameters
//!
//! # Critical Nuances
//!
//! ## Memory Spaces Are Types
//!
//! A [`mdspan::DeviceView`] cannot be indexed on the host, and a read-only
//! [`mdspan::View`] cannot be written through. Both mistakes are compile
//! errors, not runtime checks. Device contents reach the host only through an
//! explicit copy ([`Resources::copy_to_host`]).
//!
//! ## Contents Are Unspecified After (Re)allocation
//!
//! Constructing an index or calling [`ivf_pq::Index::allocate`] yields arrays
//! of the right shape whose contents are whatever the memory resource handed
//! out. Filling them is the trainer's job; nothing is preserved across a
//! resize.
//!
//! ## The Reference Backend
//!
//! [`SystemMemoryResource`] serves every memory space from zeroed host memory.
//! It enforces the same alignment and budget rules an accelerator allocator
//! would, so code written against it ports by swapping the
//! [`MemoryResource`](resources::MemoryResource).

pub mod distance;
pub mod error;
pub mod ivf_pq;
pub mod mdarray;
pub mod mdspan;
pub mod resources;

// Re-exports
pub use distance::DistanceMetric;
pub use error::{Error, ErrorKind, Result};
pub use ivf_pq::{CodebookGen, Index, IndexParams, SearchParams};
pub use mdarray::{DeviceArray, HostArray, MdArray};
pub use mdspan::{Device, Host, Managed, MemoryType, View, ViewError, ViewMut};
pub use resources::{AllocError, Resources, ResourcesConfig, SystemMemoryResource};
