//! Layout mappings from multidimensional indices to element offsets.
//!
//! A layout turns extents into strides. Contiguous layouts ([`RowMajor`],
//! [`ColMajor`]) and padded layouts ([`RowMajorPadded`], [`ColMajorPadded`])
//! derive strides from extents alone; [`Strided`] carries explicit strides
//! supplied at construction.
//!
//! Padded layouts round the innermost extent up so that every row (or
//! column) starts on an [`ALIGNMENT`]-byte boundary, which is what vectorized
//! kernels assume. They also require the base address itself to be aligned.

use std::fmt;
use std::mem::size_of;

use serde::{Deserialize, Serialize};

use super::error::ViewError;

/// Byte alignment required by padded layouts.
pub const ALIGNMENT: usize = 128;

/// Runtime mirror of a layout tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutKind {
    RowMajor,
    ColMajor,
    Strided,
    RowMajorPadded,
    ColMajorPadded,
}

impl LayoutKind {
    /// Whether this layout requires an [`ALIGNMENT`]-aligned base address.
    #[inline]
    #[must_use]
    pub const fn is_padded(self) -> bool {
        matches!(self, LayoutKind::RowMajorPadded | LayoutKind::ColMajorPadded)
    }
}

/// A layout tag.
pub trait Layout: Copy + Default + fmt::Debug + Send + Sync + 'static {
    const KIND: LayoutKind;

    /// Required alignment of the base address, in bytes.
    const BASE_ALIGNMENT: usize = 1;
}

/// A layout whose strides are a function of the extents (and element size).
pub trait DerivedLayout: Layout {
    /// Compute the strides, in elements, for `extents`.
    fn strides<T, const R: usize>(extents: &[usize; R]) -> Result<[usize; R], ViewError>;
}

/// C-contiguous: the last axis varies fastest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RowMajor;

/// Fortran-contiguous: the first axis varies fastest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColMajor;

/// Explicit per-axis strides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Strided;

/// Row-major with the last extent padded to a multiple of [`ALIGNMENT`] bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RowMajorPadded;

/// Column-major with the first extent padded to a multiple of [`ALIGNMENT`] bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColMajorPadded;

impl Layout for RowMajor {
    const KIND: LayoutKind = LayoutKind::RowMajor;
}

impl Layout for ColMajor {
    const KIND: LayoutKind = LayoutKind::ColMajor;
}

impl Layout for Strided {
    const KIND: LayoutKind = LayoutKind::Strided;
}

impl Layout for RowMajorPadded {
    const KIND: LayoutKind = LayoutKind::RowMajorPadded;
    const BASE_ALIGNMENT: usize = ALIGNMENT;
}

impl Layout for ColMajorPadded {
    const KIND: LayoutKind = LayoutKind::ColMajorPadded;
    const BASE_ALIGNMENT: usize = ALIGNMENT;
}

impl DerivedLayout for RowMajor {
    fn strides<T, const R: usize>(extents: &[usize; R]) -> Result<[usize; R], ViewError> {
        row_major_strides(extents, None)
    }
}

impl DerivedLayout for ColMajor {
    fn strides<T, const R: usize>(extents: &[usize; R]) -> Result<[usize; R], ViewError> {
        col_major_strides(extents, None)
    }
}

impl DerivedLayout for RowMajorPadded {
    fn strides<T, const R: usize>(extents: &[usize; R]) -> Result<[usize; R], ViewError> {
        row_major_strides(extents, Some(padding_elements::<T>()?))
    }
}

impl DerivedLayout for ColMajorPadded {
    fn strides<T, const R: usize>(extents: &[usize; R]) -> Result<[usize; R], ViewError> {
        col_major_strides(extents, Some(padding_elements::<T>()?))
    }
}

/// Number of `T` elements per [`ALIGNMENT`] bytes.
pub fn padding_elements<T>() -> Result<usize, ViewError> {
    let size = size_of::<T>();
    if size == 0 || ALIGNMENT % size != 0 {
        return Err(ViewError::UnsupportedElementSize {
            size,
            alignment: ALIGNMENT,
        });
    }
    Ok(ALIGNMENT / size)
}

fn overflow<const R: usize>(extents: &[usize; R], strides: &[usize; R]) -> ViewError {
    ViewError::SpanOverflow {
        extents: extents.to_vec(),
        strides: strides.to_vec(),
    }
}

/// Row-major strides, optionally padding the innermost extent to a multiple of `pad`.
pub fn row_major_strides<const R: usize>(
    extents: &[usize; R],
    pad: Option<usize>,
) -> Result<[usize; R], ViewError> {
    let mut strides = [0usize; R];
    let mut acc = 1usize;
    for axis in (0..R).rev() {
        strides[axis] = acc;
        let mut extent = extents[axis];
        if axis + 1 == R && R >= 2 {
            if let Some(pad) = pad {
                extent = extent
                    .checked_next_multiple_of(pad)
                    .ok_or_else(|| overflow(extents, &strides))?;
            }
        }
        acc = acc
            .checked_mul(extent)
            .ok_or_else(|| overflow(extents, &strides))?;
    }
    Ok(strides)
}

/// Column-major strides, optionally padding the outermost-fastest extent to a multiple of `pad`.
pub fn col_major_strides<const R: usize>(
    extents: &[usize; R],
    pad: Option<usize>,
) -> Result<[usize; R], ViewError> {
    let mut strides = [0usize; R];
    let mut acc = 1usize;
    for axis in 0..R {
        strides[axis] = acc;
        let mut extent = extents[axis];
        if axis == 0 && R >= 2 {
            if let Some(pad) = pad {
                extent = extent
                    .checked_next_multiple_of(pad)
                    .ok_or_else(|| overflow(extents, &strides))?;
            }
        }
        acc = acc
            .checked_mul(extent)
            .ok_or_else(|| overflow(extents, &strides))?;
    }
    Ok(strides)
}

/// Number of elements from the base address to one past the furthest reachable element.
///
/// Zero when any extent is zero.
pub fn required_span<const R: usize>(
    extents: &[usize; R],
    strides: &[usize; R],
) -> Result<usize, ViewError> {
    if extents.iter().any(|&e| e == 0) {
        return Ok(0);
    }
    let mut span = 1usize;
    for (&e, &s) in extents.iter().zip(strides.iter()) {
        let reach = (e - 1)
            .checked_mul(s)
            .ok_or_else(|| overflow(extents, strides))?;
        span = span
            .checked_add(reach)
            .ok_or_else(|| overflow(extents, strides))?;
    }
    Ok(span)
}

/// Product of the extents.
pub fn element_count<const R: usize>(extents: &[usize; R]) -> Result<usize, ViewError> {
    extents.iter().try_fold(1usize, |acc, &e| {
        acc.checked_mul(e).ok_or_else(|| ViewError::SpanOverflow {
            extents: extents.to_vec(),
            strides: Vec::new(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_col_major_strides() {
        assert_eq!(RowMajor::strides::<f32, 3>(&[2, 3, 4]).unwrap(), [12, 4, 1]);
        assert_eq!(ColMajor::strides::<f32, 3>(&[2, 3, 4]).unwrap(), [1, 2, 6]);
        assert_eq!(RowMajor::strides::<f32, 0>(&[]).unwrap(), [0usize; 0]);
    }

    #[test]
    fn padded_rows_start_on_alignment() {
        // 128 bytes / 4 bytes = 32 floats per aligned chunk.
        let strides = RowMajorPadded::strides::<f32, 2>(&[5, 33]).unwrap();
        assert_eq!(strides, [64, 1]);
        assert_eq!((strides[0] * size_of::<f32>()) % ALIGNMENT, 0);

        let strides = ColMajorPadded::strides::<u8, 2>(&[3, 7]).unwrap();
        assert_eq!(strides, [1, 128]);
    }

    #[test]
    fn padding_rejects_odd_element_sizes() {
        assert!(matches!(
            padding_elements::<[u8; 3]>(),
            Err(ViewError::UnsupportedElementSize { size: 3, .. })
        ));
        assert_eq!(padding_elements::<f64>().unwrap(), 16);
    }

    #[test]
    fn span_accounts_for_strides_and_empty_axes() {
        assert_eq!(required_span(&[2, 3], &[3, 1]).unwrap(), 6);
        assert_eq!(required_span(&[2, 3], &[64, 1]).unwrap(), 67);
        assert_eq!(required_span(&[0, 3], &[3, 1]).unwrap(), 0);
        assert_eq!(required_span::<0>(&[], &[]).unwrap(), 1);
        assert!(required_span(&[usize::MAX, 2], &[2, 1]).is_err());
    }
}
