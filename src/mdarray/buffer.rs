//! Typed allocation in a memory space.

use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use std::sync::Arc;

use bytemuck::Pod;

use crate::mdspan::MemorySpace;
use crate::resources::{AllocError, MemoryResource, Resources, BUFFER_ALIGNMENT};

/// `len` elements of `T` owned in memory space `M`.
///
/// Released through the allocating resource on drop. Not `Clone`: duplicating
/// an accelerator buffer must be an explicit copy.
pub struct Buffer<T: Pod, M: MemorySpace> {
    ptr: NonNull<T>,
    len: usize,
    memory: Arc<dyn MemoryResource>,
    _marker: PhantomData<(T, M)>,
}

// SAFETY: `Buffer` uniquely owns its allocation, like `Box<[T]>`.
unsafe impl<T: Pod + Send, M: MemorySpace> Send for Buffer<T, M> {}
// SAFETY: shared access only hands out `&T`-equivalent views.
unsafe impl<T: Pod + Sync, M: MemorySpace> Sync for Buffer<T, M> {}

impl<T: Pod, M: MemorySpace> Buffer<T, M> {
    /// Allocate `len` elements. Contents are unspecified.
    pub fn new(res: &Resources, len: usize) -> Result<Self, AllocError> {
        let bytes = byte_len::<T>(len)?;
        let memory = Arc::clone(res.memory_resource());
        if bytes == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len,
                memory,
                _marker: PhantomData,
            });
        }
        let ptr = memory.allocate(bytes, Self::align(), M::TYPE)?;
        Ok(Self {
            ptr: ptr.cast(),
            len,
            memory,
            _marker: PhantomData,
        })
    }

    #[inline]
    fn align() -> usize {
        BUFFER_ALIGNMENT.max(align_of::<T>())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the allocation in bytes.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.len * size_of::<T>()
    }

    #[inline]
    pub(crate) fn ptr(&self) -> NonNull<T> {
        self.ptr
    }
}

impl<T: Pod, M: MemorySpace> Drop for Buffer<T, M> {
    fn drop(&mut self) {
        let bytes = self.bytes();
        if bytes > 0 {
            // SAFETY: allocated in `new` with exactly these arguments, released once.
            unsafe {
                self.memory
                    .deallocate(self.ptr.cast(), bytes, Self::align(), M::TYPE)
            };
        }
    }
}

impl<T: Pod, M: MemorySpace> fmt::Debug for Buffer<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("space", &M::TYPE)
            .field("len", &self.len)
            .field("addr", &(self.ptr.as_ptr() as usize))
            .finish()
    }
}

fn byte_len<T>(len: usize) -> Result<usize, AllocError> {
    len.checked_mul(size_of::<T>())
        .filter(|&b| b <= isize::MAX as usize)
        .ok_or(AllocError::SizeOverflow {
            elements: len,
            elem_size: size_of::<T>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdspan::{Device, MemoryType};

    #[test]
    fn drop_releases_allocation() {
        let res = Resources::new();
        {
            let buf = Buffer::<f32, Device>::new(&res, 100).unwrap();
            assert_eq!(buf.bytes(), 400);
            assert_eq!(buf.ptr().as_ptr() as usize % BUFFER_ALIGNMENT, 0);
            assert_eq!(res.memory_stats().space_usage[&MemoryType::Device], 400);
        }
        assert_eq!(res.memory_stats().total_allocated, 0);
    }

    #[test]
    fn empty_buffer_does_not_allocate() {
        let res = Resources::new();
        let buf = Buffer::<u64, Device>::new(&res, 0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(res.memory_stats().allocation_count, 0);
    }

    #[test]
    fn overflowing_length_is_an_allocation_error() {
        let res = Resources::new();
        let err = Buffer::<u64, Device>::new(&res, usize::MAX / 4).unwrap_err();
        assert!(matches!(err, AllocError::SizeOverflow { elem_size: 8, .. }));
    }
}
