//! Owned multidimensional arrays.
//!
//! [`MdArray`] owns a [`Buffer`] in a memory space and hands out [`View`] /
//! [`ViewMut`] over it. Reallocation replaces the buffer wholesale: nothing
//! is copied across, and callers that need the old contents must copy them
//! out first.

pub mod buffer;

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

pub use buffer::Buffer;

use crate::error::Result;
use crate::mdspan::{
    layout, Device, DerivedLayout, Host, Managed, MemorySpace, MemoryType, RowMajor, View, ViewMut,
};
use crate::resources::Resources;

/// An owned array of rank `R` in memory space `M` with layout `L`.
pub struct MdArray<T: Pod, const R: usize, M: MemorySpace, L: DerivedLayout = RowMajor> {
    buffer: Buffer<T, M>,
    extents: [usize; R],
    strides: [usize; R],
    len: usize,
    _layout: PhantomData<L>,
}

pub type DeviceArray<T, const R: usize, L = RowMajor> = MdArray<T, R, Device, L>;
pub type HostArray<T, const R: usize, L = RowMajor> = MdArray<T, R, Host, L>;
pub type ManagedArray<T, const R: usize, L = RowMajor> = MdArray<T, R, Managed, L>;

pub type DeviceVector<T> = DeviceArray<T, 1>;
pub type DeviceMatrix<T> = DeviceArray<T, 2>;

impl<T: Pod, const R: usize, M: MemorySpace, L: DerivedLayout> MdArray<T, R, M, L> {
    /// Allocate an array of the given extents. Contents are unspecified.
    ///
    /// # Errors
    ///
    /// [`Error::View`](crate::Error::View) if the extents overflow,
    /// [`Error::Alloc`](crate::Error::Alloc) if the resource refuses.
    pub fn new(res: &Resources, extents: [usize; R]) -> Result<Self> {
        let strides = L::strides::<T, R>(&extents)?;
        let span = layout::required_span(&extents, &strides)?;
        let len = layout::element_count(&extents)?;
        let buffer = Buffer::new(res, span)?;
        Ok(Self {
            buffer,
            extents,
            strides,
            len,
            _layout: PhantomData,
        })
    }

    /// Allocate and fill from host data in logical row-major order.
    pub fn from_host(res: &Resources, extents: [usize; R], data: &[T]) -> Result<Self> {
        let mut array = Self::new(res, extents)?;
        res.copy_from_host(&mut array.view_mut(), data)?;
        Ok(array)
    }

    /// Replace the storage with a fresh buffer of `extents`.
    ///
    /// The new buffer is allocated before the old one is released; on error
    /// the array is unchanged. Contents are not preserved.
    pub fn allocate(&mut self, res: &Resources, extents: [usize; R]) -> Result<()> {
        *self = Self::new(res, extents)?;
        Ok(())
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        self.extents[axis]
    }

    #[inline]
    pub fn extents(&self) -> [usize; R] {
        self.extents
    }

    #[inline]
    pub fn strides(&self) -> [usize; R] {
        self.strides
    }

    /// Logical element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes owned, including padding.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.buffer.bytes()
    }

    #[inline]
    pub fn memory_type(&self) -> MemoryType {
        M::TYPE
    }

    #[inline]
    pub fn view(&self) -> View<'_, T, R, M, L> {
        // SAFETY: the buffer was sized from this mapping and is aligned to
        // `BUFFER_ALIGNMENT`, which covers every layout's base alignment.
        unsafe {
            View::from_validated(
                self.buffer.ptr(),
                self.extents,
                self.strides,
                self.buffer.len(),
                self.len,
            )
        }
    }

    #[inline]
    pub fn view_mut(&mut self) -> ViewMut<'_, T, R, M, L> {
        // SAFETY: as `view`, and `&mut self` guarantees exclusivity.
        unsafe {
            ViewMut::from_validated(
                self.buffer.ptr(),
                self.extents,
                self.strides,
                self.buffer.len(),
                self.len,
            )
        }
    }

    /// Copy the contents to a host `Vec` in logical row-major order.
    pub fn to_host(&self, res: &Resources) -> Vec<T> {
        res.copy_to_host(self.view())
    }
}

impl<T: Pod, const R: usize, M: MemorySpace, L: DerivedLayout> fmt::Debug for MdArray<T, R, M, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MdArray")
            .field("space", &M::TYPE)
            .field("layout", &L::KIND)
            .field("extents", &self.extents)
            .field("bytes", &self.bytes())
            .finish()
    }
}
