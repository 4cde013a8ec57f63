//! Named constructors for the common view shapes.
//!
//! All factories are generic over the memory space and take raw addresses, so
//! they work for accelerator pointers handed out by an external allocator.
//! They validate the mapping and address up front and never touch memory.

use super::error::ViewError;
use super::layout::{ColMajor, ColMajorPadded, RowMajor, RowMajorPadded, Strided};
use super::space::MemorySpace;
use super::view::{View, ViewMut};

/// 0-dimensional view of a single element.
///
/// # Safety
///
/// `ptr` must be valid for reads of one `T` in space `M` for `'a`.
pub unsafe fn scalar_view<'a, T, M: MemorySpace>(
    ptr: *const T,
) -> Result<View<'a, T, 0, M>, ViewError> {
    View::from_raw(ptr, [])
}

/// Contiguous vector of `n` elements.
///
/// # Safety
///
/// `ptr` must be valid for reads of `n` elements in space `M` for `'a`.
pub unsafe fn vector_view<'a, T, M: MemorySpace>(
    ptr: *const T,
    n: usize,
) -> Result<View<'a, T, 1, M>, ViewError> {
    View::from_raw(ptr, [n])
}

/// Mutable contiguous vector of `n` elements.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of `n` elements in space `M`,
/// exclusively, for `'a`.
pub unsafe fn vector_view_mut<'a, T, M: MemorySpace>(
    ptr: *mut T,
    n: usize,
) -> Result<ViewMut<'a, T, 1, M>, ViewError> {
    ViewMut::from_raw(ptr, [n])
}

/// Vector of `n` elements spaced `stride` apart.
///
/// # Safety
///
/// `ptr` must be valid for reads of `(n - 1) * stride + 1` elements.
pub unsafe fn vector_view_strided<'a, T, M: MemorySpace>(
    ptr: *const T,
    n: usize,
    stride: usize,
) -> Result<View<'a, T, 1, M, Strided>, ViewError> {
    View::from_raw_parts(ptr, [n], [stride])
}

/// Row-major `n_rows x n_cols` matrix.
///
/// # Safety
///
/// `ptr` must be valid for reads of `n_rows * n_cols` elements.
pub unsafe fn matrix_view<'a, T, M: MemorySpace>(
    ptr: *const T,
    n_rows: usize,
    n_cols: usize,
) -> Result<View<'a, T, 2, M>, ViewError> {
    View::<T, 2, M, RowMajor>::from_raw(ptr, [n_rows, n_cols])
}

/// Mutable row-major `n_rows x n_cols` matrix.
///
/// # Safety
///
/// `ptr` must be valid for exclusive reads and writes of `n_rows * n_cols` elements.
pub unsafe fn matrix_view_mut<'a, T, M: MemorySpace>(
    ptr: *mut T,
    n_rows: usize,
    n_cols: usize,
) -> Result<ViewMut<'a, T, 2, M>, ViewError> {
    ViewMut::<T, 2, M, RowMajor>::from_raw(ptr, [n_rows, n_cols])
}

/// Column-major `n_rows x n_cols` matrix.
///
/// # Safety
///
/// `ptr` must be valid for reads of `n_rows * n_cols` elements.
pub unsafe fn matrix_view_col_major<'a, T, M: MemorySpace>(
    ptr: *const T,
    n_rows: usize,
    n_cols: usize,
) -> Result<View<'a, T, 2, M, ColMajor>, ViewError> {
    View::from_raw(ptr, [n_rows, n_cols])
}

/// Row-major matrix whose rows start on 128-byte boundaries.
///
/// The row stride is `n_cols` rounded up to a multiple of `128 / size_of::<T>()`.
///
/// # Errors
///
/// [`ViewError::Misaligned`] when `ptr` is not 128-byte aligned and
/// [`ViewError::UnsupportedElementSize`] when `size_of::<T>()` does not divide 128.
///
/// # Safety
///
/// `ptr` must be valid for reads of the padded span.
pub unsafe fn aligned_matrix_view<'a, T, M: MemorySpace>(
    ptr: *const T,
    n_rows: usize,
    n_cols: usize,
) -> Result<View<'a, T, 2, M, RowMajorPadded>, ViewError> {
    View::from_raw(ptr, [n_rows, n_cols])
}

/// Mutable variant of [`aligned_matrix_view`].
///
/// # Safety
///
/// `ptr` must be valid for exclusive reads and writes of the padded span.
pub unsafe fn aligned_matrix_view_mut<'a, T, M: MemorySpace>(
    ptr: *mut T,
    n_rows: usize,
    n_cols: usize,
) -> Result<ViewMut<'a, T, 2, M, RowMajorPadded>, ViewError> {
    ViewMut::from_raw(ptr, [n_rows, n_cols])
}

/// Column-major matrix whose columns start on 128-byte boundaries.
///
/// # Safety
///
/// `ptr` must be valid for reads of the padded span.
pub unsafe fn aligned_matrix_view_col_major<'a, T, M: MemorySpace>(
    ptr: *const T,
    n_rows: usize,
    n_cols: usize,
) -> Result<View<'a, T, 2, M, ColMajorPadded>, ViewError> {
    View::from_raw(ptr, [n_rows, n_cols])
}

/// General explicit-stride view from runtime extents and strides.
///
/// # Errors
///
/// [`ViewError::RankMismatch`] when `extents` and `strides` differ in length,
/// [`ViewError::WrongRank`] when they do not match `R`.
///
/// # Safety
///
/// `ptr` must be valid for reads of the span implied by `extents` and `strides`.
pub unsafe fn strided_view<'a, T, const R: usize, M: MemorySpace>(
    ptr: *const T,
    extents: &[usize],
    strides: &[usize],
) -> Result<View<'a, T, R, M, Strided>, ViewError> {
    let (extents, strides) = fixed_rank::<R>(extents, strides)?;
    View::from_raw_parts(ptr, extents, strides)
}

/// Mutable variant of [`strided_view`].
///
/// # Safety
///
/// `ptr` must be valid for exclusive reads and writes of the span, and no two
/// indices may map to the same element.
pub unsafe fn strided_view_mut<'a, T, const R: usize, M: MemorySpace>(
    ptr: *mut T,
    extents: &[usize],
    strides: &[usize],
) -> Result<ViewMut<'a, T, R, M, Strided>, ViewError> {
    let (extents, strides) = fixed_rank::<R>(extents, strides)?;
    ViewMut::from_raw_parts(ptr, extents, strides)
}

fn fixed_rank<const R: usize>(
    extents: &[usize],
    strides: &[usize],
) -> Result<([usize; R], [usize; R]), ViewError> {
    if extents.len() != strides.len() {
        return Err(ViewError::RankMismatch {
            extents: extents.len(),
            strides: strides.len(),
        });
    }
    let wrong_rank = || ViewError::WrongRank {
        expected: R,
        actual: extents.len(),
    };
    let extents: [usize; R] = extents.try_into().map_err(|_| wrong_rank())?;
    let strides: [usize; R] = strides.try_into().map_err(|_| wrong_rank())?;
    Ok((extents, strides))
}
