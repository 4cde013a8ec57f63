//! Non-owning multidimensional views.
//!
//! [`View`] is read-only and [`ViewMut`] is read-write. Both are typed by
//! element `T`, rank `R`, memory space `M` and layout `L`.
//!
//! Capability is part of the type: a [`View`] has no write path at all, so a
//! write through a read-only view does not compile:
//!
//! ```compile_fail
//! use pqspan::mdspan::{Host, View};
//!
//! let data = [1.0f32, 2.0, 3.0];
//! let view: View<'_, f32, 1, Host> = View::from_slice(&data, [3]).unwrap();
//! view[[0]] = 4.0;
//! ```
//!
//! Memory space is part of the type too. Element access is only implemented
//! for [`HostAccessible`] spaces, so host code cannot dereference a device view:
//!
//! ```compile_fail
//! use pqspan::mdspan::{Device, View};
//!
//! let data = [1.0f32, 2.0, 3.0];
//! let view: View<'_, f32, 1, Device> = unsafe { View::from_raw(data.as_ptr(), [3]) }.unwrap();
//! let _first = view[[0]];
//! ```
//!
//! Device views instead expose [`View::as_ptr`] for kernels, and host copies
//! go through [`Resources::copy_to_host`](crate::resources::Resources::copy_to_host).
//!
//! Only [`Host`] views can be built from a safe slice. A managed view comes
//! from a [`ManagedArray`](crate::mdarray::ManagedArray) or the `unsafe`
//! constructors, so ordinary host memory cannot be retagged as device memory:
//!
//! ```compile_fail
//! use pqspan::mdspan::{Managed, View};
//!
//! let data = vec![1.0f32, 2.0, 3.0];
//! let managed: View<'_, f32, 1, Managed> = View::from_slice(&data, [3]).unwrap();
//! let _device = managed.into_device();
//! ```
//!
//! The same holds for the arrays of an index: code that only holds `&Index`
//! gets read-only views and cannot reach the mutable accessors:
//!
//! ```compile_fail
//! use pqspan::ivf_pq::Index;
//! use pqspan::Resources;
//!
//! fn overwrite(res: &Resources, index: &Index<u64>) {
//!     res.copy_from_host(&mut index.pq_centers_mut(), &[0.0]).unwrap();
//! }
//! ```
//!
//! ```compile_fail
//! use pqspan::ivf_pq::Index;
//!
//! fn overwrite(index: &Index<u64>) {
//!     let mut ids = index.indices();
//!     ids.as_mut_ptr();
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::mem::align_of;
use std::ptr::NonNull;

use super::error::ViewError;
use super::layout::{self, DerivedLayout, Layout, LayoutKind, RowMajor, Strided};
use super::space::{Device, DeviceAccessible, Host, HostAccessible, Managed, MemorySpace, MemoryType};

/// Validated pointer + mapping shared by both view flavours.
struct Raw<T, const R: usize> {
    ptr: NonNull<T>,
    extents: [usize; R],
    strides: [usize; R],
    span: usize,
    len: usize,
}

impl<T, const R: usize> Clone for Raw<T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const R: usize> Copy for Raw<T, R> {}

impl<T, const R: usize> Raw<T, R> {
    /// Validate the mapping and the base address. Touches no memory.
    fn new(
        ptr: *const T,
        extents: [usize; R],
        strides: [usize; R],
        base_alignment: usize,
    ) -> Result<Self, ViewError> {
        let span = layout::required_span(&extents, &strides)?;
        let len = layout::element_count(&extents)?;

        // A null base is only acceptable when nothing is addressed. Any other
        // base is checked and kept, even for an empty view.
        let ptr = match NonNull::new(ptr as *mut T) {
            Some(ptr) => {
                let alignment = base_alignment.max(align_of::<T>());
                let addr = ptr.as_ptr() as usize;
                if addr % alignment != 0 {
                    return Err(ViewError::Misaligned { addr, alignment });
                }
                ptr
            }
            None if span == 0 => NonNull::dangling(),
            None => return Err(ViewError::NullPointer { len }),
        };

        Ok(Self {
            ptr,
            extents,
            strides,
            span,
            len,
        })
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    #[inline]
    fn offset(&self, idx: [usize; R]) -> Option<usize> {
        let mut off = 0usize;
        for axis in 0..R {
            if idx[axis] >= self.extents[axis] {
                return None;
            }
            off += idx[axis] * self.strides[axis];
        }
        Some(off)
    }

    /// Offset of the `linear`-th element in logical row-major order.
    #[inline]
    fn linear_offset(&self, mut linear: usize) -> usize {
        let mut off = 0usize;
        for axis in (0..R).rev() {
            let e = self.extents[axis];
            off += (linear % e) * self.strides[axis];
            linear /= e;
        }
        off
    }

    /// Dense in logical row-major order.
    #[inline]
    fn is_row_major_dense(&self) -> bool {
        let mut expected = 1usize;
        for axis in (0..R).rev() {
            if self.extents[axis] > 1 && self.strides[axis] != expected {
                return false;
            }
            expected *= self.extents[axis];
        }
        true
    }
}

/// Read-only view over `T` elements in memory space `M`.
pub struct View<'a, T, const R: usize, M: MemorySpace, L: Layout = RowMajor> {
    raw: Raw<T, R>,
    _marker: PhantomData<(&'a [T], M, L)>,
}

/// Read-write view over `T` elements in memory space `M`.
pub struct ViewMut<'a, T, const R: usize, M: MemorySpace, L: Layout = RowMajor> {
    raw: Raw<T, R>,
    _marker: PhantomData<(&'a mut [T], M, L)>,
}

// SAFETY: a `View` behaves like `&[T]`.
unsafe impl<T: Sync, const R: usize, M: MemorySpace, L: Layout> Send for View<'_, T, R, M, L> {}
// SAFETY: a `View` behaves like `&[T]`.
unsafe impl<T: Sync, const R: usize, M: MemorySpace, L: Layout> Sync for View<'_, T, R, M, L> {}
// SAFETY: a `ViewMut` behaves like `&mut [T]`.
unsafe impl<T: Send, const R: usize, M: MemorySpace, L: Layout> Send for ViewMut<'_, T, R, M, L> {}
// SAFETY: a `ViewMut` behaves like `&mut [T]`.
unsafe impl<T: Sync, const R: usize, M: MemorySpace, L: Layout> Sync for ViewMut<'_, T, R, M, L> {}

impl<T, const R: usize, M: MemorySpace, L: Layout> Clone for View<'_, T, R, M, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const R: usize, M: MemorySpace, L: Layout> Copy for View<'_, T, R, M, L> {}

impl<T, const R: usize, M: MemorySpace, L: Layout> fmt::Debug for View<'_, T, R, M, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("space", &M::TYPE)
            .field("layout", &L::KIND)
            .field("extents", &self.raw.extents)
            .field("strides", &self.raw.strides)
            .finish()
    }
}

impl<T, const R: usize, M: MemorySpace, L: Layout> fmt::Debug for ViewMut<'_, T, R, M, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewMut")
            .field("space", &M::TYPE)
            .field("layout", &L::KIND)
            .field("extents", &self.raw.extents)
            .field("strides", &self.raw.strides)
            .finish()
    }
}

macro_rules! shape_queries {
    () => {
        /// Number of axes.
        #[inline]
        pub const fn rank(&self) -> usize {
            R
        }

        /// Extent of `axis`.
        ///
        /// # Panics
        ///
        /// If `axis >= R`.
        #[inline]
        pub fn extent(&self, axis: usize) -> usize {
            self.raw.extents[axis]
        }

        #[inline]
        pub fn extents(&self) -> [usize; R] {
            self.raw.extents
        }

        /// Stride of `axis`, in elements.
        ///
        /// # Panics
        ///
        /// If `axis >= R`.
        #[inline]
        pub fn stride(&self, axis: usize) -> usize {
            self.raw.strides[axis]
        }

        #[inline]
        pub fn strides(&self) -> [usize; R] {
            self.raw.strides
        }

        /// Number of logical elements (product of the extents).
        #[inline]
        pub fn len(&self) -> usize {
            self.raw.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Elements covered by the mapping, including padding.
        #[inline]
        pub fn required_span(&self) -> usize {
            self.raw.span
        }

        /// True when every element in the span is addressed exactly once.
        #[inline]
        pub fn is_contiguous(&self) -> bool {
            self.raw.span == self.len()
        }

        #[inline]
        pub fn memory_type(&self) -> MemoryType {
            M::TYPE
        }

        #[inline]
        pub fn layout_kind(&self) -> LayoutKind {
            L::KIND
        }

        /// Base address. Usable for alignment checks in any space.
        #[inline]
        pub fn addr(&self) -> usize {
            self.raw.ptr.as_ptr() as usize
        }
    };
}

impl<'a, T, const R: usize, M: MemorySpace, L: Layout> View<'a, T, R, M, L> {
    shape_queries!();

    #[inline]
    fn from_raw_mapping(raw: Raw<T, R>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Retag the layout. The mapping must already satisfy `L2`.
    #[inline]
    fn relayout<L2: Layout>(self) -> View<'a, T, R, M, L2> {
        View::from_raw_mapping(self.raw)
    }

    /// Forget the layout tag, keeping the strides.
    #[inline]
    pub fn into_strided(self) -> View<'a, T, R, M, Strided> {
        self.relayout()
    }

    /// # Safety
    ///
    /// The mapping must have been validated for `ptr` (as by [`View::from_raw`]),
    /// `len` must be the checked product of `extents` and `ptr` must be valid
    /// for `span` elements.
    #[inline]
    pub(crate) unsafe fn from_validated(
        ptr: NonNull<T>,
        extents: [usize; R],
        strides: [usize; R],
        span: usize,
        len: usize,
    ) -> Self {
        Self::from_raw_mapping(Raw {
            ptr,
            extents,
            strides,
            span,
            len,
        })
    }

    /// Pointer to the first element and the element count of the span.
    #[inline]
    pub(crate) fn raw_span(&self) -> (*const T, usize) {
        (self.raw.ptr.as_ptr() as *const T, self.raw.span)
    }

    #[inline]
    pub(crate) fn linear_offset(&self, linear: usize) -> usize {
        self.raw.linear_offset(linear)
    }

    #[inline]
    pub(crate) fn is_row_major_dense(&self) -> bool {
        self.raw.is_row_major_dense()
    }
}

impl<'a, T, const R: usize, M: MemorySpace, L: DerivedLayout> View<'a, T, R, M, L> {
    /// Construct a view over `ptr` with strides derived from `L`.
    ///
    /// # Errors
    ///
    /// [`ViewError`] if the base address is null, misaligned for `L` or `T`,
    /// or the mapping overflows. Nothing is read.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of [`required_span`](Self::required_span)
    /// elements in memory space `M` for `'a`, and must not be written through
    /// any other path while the view is alive.
    pub unsafe fn from_raw(ptr: *const T, extents: [usize; R]) -> Result<Self, ViewError> {
        let strides = L::strides::<T, R>(&extents)?;
        Raw::new(ptr, extents, strides, L::BASE_ALIGNMENT).map(Self::from_raw_mapping)
    }
}

impl<'a, T, const R: usize, L: DerivedLayout> View<'a, T, R, Host, L> {
    /// Construct a view over a host slice.
    ///
    /// # Errors
    ///
    /// [`ViewError::SpanTooSmall`] if `data` is shorter than the mapping,
    /// plus the address checks of [`from_raw`](Self::from_raw).
    pub fn from_slice(data: &'a [T], extents: [usize; R]) -> Result<Self, ViewError> {
        let strides = L::strides::<T, R>(&extents)?;
        let raw = Raw::new(data.as_ptr(), extents, strides, L::BASE_ALIGNMENT)?;
        check_len(raw.span, data.len())?;
        Ok(Self::from_raw_mapping(raw))
    }
}

impl<'a, T, const R: usize, M: MemorySpace> View<'a, T, R, M, Strided> {
    /// Construct a view over `ptr` with explicit strides.
    ///
    /// # Safety
    ///
    /// As [`View::from_raw`].
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        extents: [usize; R],
        strides: [usize; R],
    ) -> Result<Self, ViewError> {
        Raw::new(ptr, extents, strides, Strided::BASE_ALIGNMENT).map(Self::from_raw_mapping)
    }
}

impl<'a, T, const R: usize> View<'a, T, R, Host, Strided> {
    /// Construct a strided view over a host slice.
    pub fn from_slice_strided(
        data: &'a [T],
        extents: [usize; R],
        strides: [usize; R],
    ) -> Result<Self, ViewError> {
        let raw = Raw::new(data.as_ptr(), extents, strides, Strided::BASE_ALIGNMENT)?;
        check_len(raw.span, data.len())?;
        Ok(Self::from_raw_mapping(raw))
    }
}

impl<'a, T, const R: usize, M: HostAccessible, L: Layout> View<'a, T, R, M, L> {
    /// Element at `idx`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, idx: [usize; R]) -> Option<&'a T> {
        let off = self.raw.offset(idx)?;
        // SAFETY: `off` is within the validated span and the space is host-accessible.
        Some(unsafe { &*self.raw.ptr.as_ptr().add(off) })
    }

    /// The elements as a slice, when the view is dense in row-major order.
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if !self.raw.is_row_major_dense() {
            return None;
        }
        let len = self.len();
        // SAFETY: dense row-major means `len` consecutive valid elements from the base.
        Some(unsafe { std::slice::from_raw_parts(self.raw.ptr.as_ptr(), len) })
    }

    /// Iterate the elements in logical row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &'a T> + 'a
    where
        T: 'a,
    {
        let raw = self.raw;
        (0..raw.len()).map(move |i| {
            // SAFETY: every linear index below `len` maps inside the span.
            unsafe { &*raw.ptr.as_ptr().add(raw.linear_offset(i)) }
        })
    }

    /// Copy the elements out in logical row-major order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Copy,
    {
        self.iter().copied().collect()
    }
}

impl<'a, T, const R: usize, M: DeviceAccessible, L: Layout> View<'a, T, R, M, L> {
    /// Base pointer for handing to accelerator kernels.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.raw.ptr.as_ptr()
    }
}

impl<'a, T, const R: usize, L: Layout> View<'a, T, R, Managed, L> {
    /// The same memory seen as host memory.
    #[inline]
    pub fn into_host(self) -> View<'a, T, R, Host, L> {
        View::from_raw_mapping(self.raw)
    }

    /// The same memory seen as device memory.
    #[inline]
    pub fn into_device(self) -> View<'a, T, R, Device, L> {
        View::from_raw_mapping(self.raw)
    }
}

impl<T, const R: usize, M: HostAccessible, L: Layout> std::ops::Index<[usize; R]>
    for View<'_, T, R, M, L>
{
    type Output = T;

    fn index(&self, idx: [usize; R]) -> &T {
        match self.get(idx) {
            Some(v) => v,
            None => panic!(
                "index {:?} out of bounds for extents {:?}",
                idx, self.raw.extents
            ),
        }
    }
}

impl<'a, T, const R: usize, M: MemorySpace, L: Layout> ViewMut<'a, T, R, M, L> {
    shape_queries!();

    #[inline]
    fn from_raw_mapping(raw: Raw<T, R>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Borrow as a read-only view.
    #[inline]
    pub fn as_view(&self) -> View<'_, T, R, M, L> {
        View::from_raw_mapping(self.raw)
    }

    /// Give up write access for the rest of `'a`.
    #[inline]
    pub fn into_view(self) -> View<'a, T, R, M, L> {
        View::from_raw_mapping(self.raw)
    }

    /// Reborrow for a shorter lifetime.
    #[inline]
    pub fn reborrow(&mut self) -> ViewMut<'_, T, R, M, L> {
        ViewMut::from_raw_mapping(self.raw)
    }

    /// # Safety
    ///
    /// As [`View::from_validated`], plus exclusive access for `'a`.
    #[inline]
    pub(crate) unsafe fn from_validated(
        ptr: NonNull<T>,
        extents: [usize; R],
        strides: [usize; R],
        span: usize,
        len: usize,
    ) -> Self {
        Self::from_raw_mapping(Raw {
            ptr,
            extents,
            strides,
            span,
            len,
        })
    }

    #[inline]
    pub(crate) fn raw_span_mut(&mut self) -> (*mut T, usize) {
        (self.raw.ptr.as_ptr(), self.raw.span)
    }

    #[inline]
    pub(crate) fn linear_offset(&self, linear: usize) -> usize {
        self.raw.linear_offset(linear)
    }

    #[inline]
    pub(crate) fn is_row_major_dense(&self) -> bool {
        self.raw.is_row_major_dense()
    }
}

impl<'a, T, const R: usize, M: MemorySpace, L: DerivedLayout> ViewMut<'a, T, R, M, L> {
    /// Construct a mutable view over `ptr` with strides derived from `L`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of the required span in
    /// memory space `M` for `'a`, with no other access while the view lives.
    pub unsafe fn from_raw(ptr: *mut T, extents: [usize; R]) -> Result<Self, ViewError> {
        let strides = L::strides::<T, R>(&extents)?;
        Raw::new(ptr, extents, strides, L::BASE_ALIGNMENT).map(Self::from_raw_mapping)
    }
}

impl<'a, T, const R: usize, L: DerivedLayout> ViewMut<'a, T, R, Host, L> {
    /// Construct a mutable view over a host slice.
    pub fn from_slice_mut(data: &'a mut [T], extents: [usize; R]) -> Result<Self, ViewError> {
        let strides = L::strides::<T, R>(&extents)?;
        let raw = Raw::new(data.as_mut_ptr(), extents, strides, L::BASE_ALIGNMENT)?;
        check_len(raw.span, data.len())?;
        Ok(Self::from_raw_mapping(raw))
    }
}

impl<'a, T, const R: usize, M: MemorySpace> ViewMut<'a, T, R, M, Strided> {
    /// Construct a mutable view over `ptr` with explicit strides.
    ///
    /// # Safety
    ///
    /// As [`ViewMut::from_raw`]. Strides must not map two indices to the same
    /// element.
    pub unsafe fn from_raw_parts(
        ptr: *mut T,
        extents: [usize; R],
        strides: [usize; R],
    ) -> Result<Self, ViewError> {
        Raw::new(ptr, extents, strides, Strided::BASE_ALIGNMENT).map(Self::from_raw_mapping)
    }
}

impl<'a, T, const R: usize, M: HostAccessible, L: Layout> ViewMut<'a, T, R, M, L> {
    #[inline]
    pub fn get(&self, idx: [usize; R]) -> Option<&T> {
        let off = self.raw.offset(idx)?;
        // SAFETY: in-bounds offset, host-accessible space.
        Some(unsafe { &*self.raw.ptr.as_ptr().add(off) })
    }

    #[inline]
    pub fn get_mut(&mut self, idx: [usize; R]) -> Option<&mut T> {
        let off = self.raw.offset(idx)?;
        // SAFETY: in-bounds offset, host-accessible space, exclusive via `&mut self`.
        Some(unsafe { &mut *self.raw.ptr.as_ptr().add(off) })
    }

    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        if !self.raw.is_row_major_dense() {
            return None;
        }
        let len = self.len();
        // SAFETY: dense row-major, exclusive via `&mut self`.
        Some(unsafe { std::slice::from_raw_parts_mut(self.raw.ptr.as_ptr(), len) })
    }

    /// Set every logical element to `value`. Padding is left untouched.
    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        let raw = self.raw;
        for i in 0..raw.len() {
            // SAFETY: in-span offset, exclusive via `&mut self`.
            unsafe { *raw.ptr.as_ptr().add(raw.linear_offset(i)) = value };
        }
    }

    /// Overwrite the elements, in logical row-major order, from `src`.
    pub fn copy_from_slice(&mut self, src: &[T]) -> Result<(), ViewError>
    where
        T: Copy,
    {
        let raw = self.raw;
        if src.len() != raw.len() {
            return Err(ViewError::LengthMismatch {
                expected: raw.len(),
                actual: src.len(),
            });
        }
        for (i, &v) in src.iter().enumerate() {
            // SAFETY: in-span offset, exclusive via `&mut self`.
            unsafe { *raw.ptr.as_ptr().add(raw.linear_offset(i)) = v };
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Copy,
    {
        self.as_view().to_vec()
    }
}

impl<'a, T, const R: usize, M: DeviceAccessible, L: Layout> ViewMut<'a, T, R, M, L> {
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.raw.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.raw.ptr.as_ptr()
    }
}

impl<'a, T, const R: usize, L: Layout> ViewMut<'a, T, R, Managed, L> {
    #[inline]
    pub fn into_host(self) -> ViewMut<'a, T, R, Host, L> {
        ViewMut::from_raw_mapping(self.raw)
    }

    #[inline]
    pub fn into_device(self) -> ViewMut<'a, T, R, Device, L> {
        ViewMut::from_raw_mapping(self.raw)
    }
}

impl<T, const R: usize, M: HostAccessible, L: Layout> std::ops::Index<[usize; R]>
    for ViewMut<'_, T, R, M, L>
{
    type Output = T;

    fn index(&self, idx: [usize; R]) -> &T {
        match self.get(idx) {
            Some(v) => v,
            None => panic!(
                "index {:?} out of bounds for extents {:?}",
                idx, self.raw.extents
            ),
        }
    }
}

impl<T, const R: usize, M: HostAccessible, L: Layout> std::ops::IndexMut<[usize; R]>
    for ViewMut<'_, T, R, M, L>
{
    fn index_mut(&mut self, idx: [usize; R]) -> &mut T {
        let extents = self.raw.extents;
        match self.get_mut(idx) {
            Some(v) => v,
            None => panic!("index {:?} out of bounds for extents {:?}", idx, extents),
        }
    }
}

fn check_len(required: usize, available: usize) -> Result<(), ViewError> {
    if required > available {
        return Err(ViewError::SpanTooSmall {
            required,
            available,
        });
    }
    Ok(())
}
