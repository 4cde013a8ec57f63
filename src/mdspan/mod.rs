//! Memory-space-aware multidimensional views.
//!
//! A view is a non-owning handle over `T` elements laid out with a given set
//! of extents and strides. Three things are encoded in its type:
//!
//! - **Capability**: [`View`] (read-only) vs [`ViewMut`] (read-write).
//! - **Memory space**: [`Host`], [`Device`] or [`Managed`]. Host element
//!   access exists only for [`HostAccessible`] spaces, raw kernel pointers only
//!   for [`DeviceAccessible`] ones.
//! - **Layout**: [`RowMajor`], [`ColMajor`], [`Strided`], or the padded
//!   layouts whose base address and row starts are 128-byte aligned.
//!
//! ```text
//!   extents [3, 5], RowMajorPadded<f32>       row stride = 32 elements
//!
//!   base (128-aligned)
//!   |
//!   v
//!   [x x x x x . . . ... .][x x x x x . . . ... .][x x x x x]
//!    \_______ 32 _______/   \_______ 32 _______/
//! ```
//!
//! Everything that can be checked at construction time is: rank agreement,
//! alignment, null addresses and span overflow all surface as [`ViewError`]
//! before a single element is touched.

pub mod error;
pub mod factory;
pub mod layout;
pub mod space;
pub mod view;

pub use error::ViewError;
pub use factory::{
    aligned_matrix_view, aligned_matrix_view_col_major, aligned_matrix_view_mut, matrix_view,
    matrix_view_col_major, matrix_view_mut, scalar_view, strided_view, strided_view_mut,
    vector_view, vector_view_mut, vector_view_strided,
};
pub use layout::{
    ColMajor, ColMajorPadded, DerivedLayout, Layout, LayoutKind, RowMajor, RowMajorPadded,
    Strided, ALIGNMENT,
};
pub use space::{
    Device, DeviceAccessible, Host, HostAccessible, Managed, MemorySpace, MemoryType,
};
pub use view::{View, ViewMut};

pub type DeviceView<'a, T, const R: usize, L = RowMajor> = View<'a, T, R, Device, L>;
pub type DeviceViewMut<'a, T, const R: usize, L = RowMajor> = ViewMut<'a, T, R, Device, L>;
pub type HostView<'a, T, const R: usize, L = RowMajor> = View<'a, T, R, Host, L>;
pub type HostViewMut<'a, T, const R: usize, L = RowMajor> = ViewMut<'a, T, R, Host, L>;
pub type ManagedView<'a, T, const R: usize, L = RowMajor> = View<'a, T, R, Managed, L>;
pub type ManagedViewMut<'a, T, const R: usize, L = RowMajor> = ViewMut<'a, T, R, Managed, L>;

pub type DeviceScalarView<'a, T> = View<'a, T, 0, Device>;
pub type DeviceVectorView<'a, T> = View<'a, T, 1, Device>;
pub type DeviceMatrixView<'a, T> = View<'a, T, 2, Device>;
pub type DeviceAlignedMatrixView<'a, T> = View<'a, T, 2, Device, RowMajorPadded>;
