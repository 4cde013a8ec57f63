//! Execution context: memory resource plus ordering stream.
//!
//! Every owned array is created and reallocated through a [`Resources`]
//! handle. The handle is cheap to clone and can be shared across threads;
//! the memory resource behind it decides where bytes actually live.
//!
//! Allocation calls are synchronous. Memory they return is only safe for
//! asynchronous users once earlier work on the same [`Stream`] has finished;
//! enforcing that order is the caller's job ([`Resources::sync_stream`]).

pub mod config;
pub mod error;
pub mod memory;
pub mod stream;

use std::mem::size_of;
use std::sync::Arc;

use bytemuck::Pod;

pub use config::ResourcesConfig;
pub use error::AllocError;
pub use memory::{MemoryResource, MemoryStats, SystemMemoryResource, BUFFER_ALIGNMENT};
pub use stream::Stream;

use crate::error::Result;
use crate::mdspan::{Host, Layout, MemorySpace, View, ViewError, ViewMut};

/// Allocator + stream handle passed to every allocating operation.
#[derive(Debug, Clone)]
pub struct Resources {
    memory: Arc<dyn MemoryResource>,
    stream: Stream,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

impl Resources {
    /// Reference resources: unlimited [`SystemMemoryResource`] and a new stream.
    pub fn new() -> Self {
        Self::with_memory_resource(Arc::new(SystemMemoryResource::default()))
    }

    /// Reference resources with a configured budget.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn with_config(config: ResourcesConfig) -> Result<Self> {
        Ok(Self::with_memory_resource(Arc::new(
            SystemMemoryResource::new(config)?,
        )))
    }

    /// Use a caller-supplied memory resource.
    pub fn with_memory_resource(memory: Arc<dyn MemoryResource>) -> Self {
        Self {
            memory,
            stream: Stream::new(),
        }
    }

    /// Same memory resource, different stream.
    #[must_use]
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    #[inline]
    pub fn memory_resource(&self) -> &Arc<dyn MemoryResource> {
        &self.memory
    }

    #[inline]
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Wait for all work on this handle's stream.
    pub fn sync_stream(&self) {
        self.memory.synchronize(&self.stream);
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.memory.stats()
    }

    /// Copy a view from any memory space into a host `Vec`, in logical
    /// row-major order. Padding is skipped.
    ///
    /// Synchronizes the stream before returning.
    pub fn copy_to_host<T: Pod, const R: usize, M: MemorySpace, L: Layout>(
        &self,
        src: View<'_, T, R, M, L>,
    ) -> Vec<T> {
        let len = src.len();
        if len == 0 {
            return Vec::new();
        }
        let (ptr, span) = src.raw_span();

        if src.is_row_major_dense() {
            let mut out = vec![T::zeroed(); len];
            // SAFETY: the view covers `len` valid elements in space `M`; `out` is host memory of the same size.
            unsafe {
                self.memory.copy(
                    out.as_mut_ptr().cast(),
                    Host::TYPE,
                    ptr.cast(),
                    M::TYPE,
                    len * size_of::<T>(),
                    &self.stream,
                );
            }
            self.sync_stream();
            return out;
        }

        let mut staging = vec![T::zeroed(); span];
        // SAFETY: the view's span is valid for reads in space `M`.
        unsafe {
            self.memory.copy(
                staging.as_mut_ptr().cast(),
                Host::TYPE,
                ptr.cast(),
                M::TYPE,
                span * size_of::<T>(),
                &self.stream,
            );
        }
        self.sync_stream();
        (0..len).map(|i| staging[src.linear_offset(i)]).collect()
    }

    /// Overwrite a view in any memory space from host data given in logical
    /// row-major order. Padding is preserved.
    ///
    /// # Errors
    ///
    /// [`ViewError::LengthMismatch`] if `src.len() != dst.len()`.
    pub fn copy_from_host<T: Pod, const R: usize, M: MemorySpace, L: Layout>(
        &self,
        dst: &mut ViewMut<'_, T, R, M, L>,
        src: &[T],
    ) -> Result<()> {
        let len = dst.len();
        if src.len() != len {
            return Err(ViewError::LengthMismatch {
                expected: len,
                actual: src.len(),
            }
            .into());
        }
        if len == 0 {
            return Ok(());
        }
        let dense = dst.is_row_major_dense();
        let (ptr, span) = dst.raw_span_mut();

        if dense {
            // SAFETY: the view is exclusively borrowed and covers `len` elements in space `M`.
            unsafe {
                self.memory.copy(
                    ptr.cast(),
                    M::TYPE,
                    src.as_ptr().cast(),
                    Host::TYPE,
                    len * size_of::<T>(),
                    &self.stream,
                );
            }
            self.sync_stream();
            return Ok(());
        }

        // Read-modify-write through a staging copy of the whole span.
        let mut staging = vec![T::zeroed(); span];
        // SAFETY: span valid for reads and writes in space `M`, exclusively borrowed.
        unsafe {
            self.memory.copy(
                staging.as_mut_ptr().cast(),
                Host::TYPE,
                ptr.cast_const().cast(),
                M::TYPE,
                span * size_of::<T>(),
                &self.stream,
            );
        }
        for (i, &v) in src.iter().enumerate() {
            staging[dst.linear_offset(i)] = v;
        }
        // SAFETY: as above.
        unsafe {
            self.memory.copy(
                ptr.cast(),
                M::TYPE,
                staging.as_ptr().cast(),
                Host::TYPE,
                span * size_of::<T>(),
                &self.stream,
            );
        }
        self.sync_stream();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdspan::{matrix_view_col_major, Device, RowMajorPadded};

    #[repr(C, align(128))]
    struct Aligned([f32; 128]);

    #[test]
    fn copies_dense_and_col_major_views() {
        let res = Resources::new();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let dev = unsafe { View::<f32, 2, Device>::from_raw(data.as_ptr(), [2, 3]) }.unwrap();
        assert_eq!(res.copy_to_host(dev), data.to_vec());

        let cm = unsafe { matrix_view_col_major::<f32, Device>(data.as_ptr(), 2, 3) }.unwrap();
        assert_eq!(res.copy_to_host(cm), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn copy_from_host_keeps_padding() {
        let res = Resources::new();
        let mut storage = Aligned([-1.0; 128]);
        let mut view =
            unsafe { ViewMut::<f32, 2, Device, RowMajorPadded>::from_raw(storage.0.as_mut_ptr(), [2, 2]) }
                .unwrap();
        res.copy_from_host(&mut view, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(res.copy_to_host(view.as_view()), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(storage.0[2], -1.0);
        assert_eq!(storage.0[32], 3.0);
    }

    #[test]
    fn copy_from_host_checks_length() {
        let res = Resources::new();
        let mut data = [0u8; 4];
        let mut view = unsafe { ViewMut::<u8, 1, Device>::from_raw(data.as_mut_ptr(), [4]) }.unwrap();
        let err = res.copy_from_host(&mut view, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::View(ViewError::LengthMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }
}
