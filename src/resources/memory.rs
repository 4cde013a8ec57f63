//! Memory resources: the allocator half of an execution context.
//!
//! [`MemoryResource`] is the seam where a real accelerator runtime plugs in.
//! [`SystemMemoryResource`] is the reference implementation: it serves every
//! memory space from zeroed, 256-byte-aligned host memory, so accelerator
//! memory is simulated, and it keeps usage statistics against an optional
//! byte budget.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::config::ResourcesConfig;
use super::error::AllocError;
use super::stream::Stream;
use crate::error::Result;
use crate::mdspan::MemoryType;

/// Base alignment of every buffer handed out by owned arrays.
pub const BUFFER_ALIGNMENT: usize = 256;

/// Allocator and copy engine for one or more memory spaces.
pub trait MemoryResource: Send + Sync + fmt::Debug {
    /// Allocate `bytes` (non-zero) aligned to `align` in `space`.
    ///
    /// Contents are unspecified.
    fn allocate(
        &self,
        bytes: usize,
        align: usize,
        space: MemoryType,
    ) -> std::result::Result<NonNull<u8>, AllocError>;

    /// Release memory obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `self.allocate(bytes, align, space)` and not have
    /// been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize, space: MemoryType);

    /// Copy `bytes` from `src` to `dst`, ordered on `stream`.
    ///
    /// # Safety
    ///
    /// `src` must be valid for reads and `dst` for writes of `bytes` in their
    /// respective spaces, and the regions must not overlap.
    unsafe fn copy(
        &self,
        dst: *mut u8,
        dst_space: MemoryType,
        src: *const u8,
        src_space: MemoryType,
        bytes: usize,
        stream: &Stream,
    );

    /// Block until all work queued on `stream` has completed.
    fn synchronize(&self, _stream: &Stream) {}

    /// Usage statistics, if the resource tracks them.
    fn stats(&self) -> MemoryStats {
        MemoryStats::default()
    }
}

/// Memory usage snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Bytes currently allocated.
    pub total_allocated: usize,
    /// High-water mark of `total_allocated`.
    pub peak_usage: usize,
    /// Live allocations.
    pub allocation_count: usize,
    /// Configured budget, if any.
    pub budget: Option<usize>,
    /// Bytes currently allocated per memory space.
    pub space_usage: HashMap<MemoryType, usize>,
}

impl MemoryStats {
    /// Bytes left before the budget is hit.
    pub fn available(&self) -> Option<usize> {
        self.budget
            .map(|b| b.saturating_sub(self.total_allocated))
    }

    /// Usage as a fraction of the budget (0.0 when unlimited).
    pub fn usage_fraction(&self) -> f32 {
        match self.budget {
            Some(b) if b > 0 => self.total_allocated as f32 / b as f32,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct Usage {
    total_allocated: usize,
    peak_usage: usize,
    allocation_count: usize,
    space_usage: HashMap<MemoryType, usize>,
}

/// Reference [`MemoryResource`] backed by the global allocator.
#[derive(Debug)]
pub struct SystemMemoryResource {
    config: ResourcesConfig,
    usage: Mutex<Usage>,
}

impl Default for SystemMemoryResource {
    fn default() -> Self {
        Self {
            config: ResourcesConfig::default(),
            usage: Mutex::new(Usage::default()),
        }
    }
}

impl SystemMemoryResource {
    /// Create a resource with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: ResourcesConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            usage: Mutex::new(Usage::default()),
        })
    }

    pub fn config(&self) -> &ResourcesConfig {
        &self.config
    }
}

impl MemoryResource for SystemMemoryResource {
    fn allocate(
        &self,
        bytes: usize,
        align: usize,
        space: MemoryType,
    ) -> std::result::Result<NonNull<u8>, AllocError> {
        if !align.is_power_of_two() {
            return Err(AllocError::InvalidAlignment { align });
        }
        let layout = Layout::from_size_align(bytes.max(1), align).map_err(|_| {
            AllocError::SizeOverflow {
                elements: bytes,
                elem_size: 1,
            }
        })?;

        let mut usage = self.usage.lock().map_err(|_| AllocError::LockPoisoned)?;

        if let Some(budget) = self.config.memory_budget {
            let new_total = usage.total_allocated.saturating_add(bytes);
            if new_total > budget {
                return Err(AllocError::BudgetExceeded {
                    requested: bytes,
                    used: usage.total_allocated,
                    budget,
                    space,
                });
            }
        }

        // SAFETY: `layout` has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { bytes, space })?;

        usage.total_allocated += bytes;
        usage.peak_usage = usage.peak_usage.max(usage.total_allocated);
        usage.allocation_count += 1;
        *usage.space_usage.entry(space).or_insert(0) += bytes;

        trace!(bytes, align, %space, total = usage.total_allocated, "allocated buffer");

        if let Some(budget) = self.config.memory_budget {
            let fraction = usage.total_allocated as f32 / budget as f32;
            if fraction > self.config.low_memory_threshold {
                warn!(
                    used = usage.total_allocated,
                    budget,
                    threshold = self.config.low_memory_threshold,
                    "memory usage above low-memory threshold"
                );
            }
        }

        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize, align: usize, space: MemoryType) {
        // SAFETY: `allocate` built the same layout from these arguments.
        let layout = Layout::from_size_align_unchecked(bytes.max(1), align);
        alloc::dealloc(ptr.as_ptr(), layout);

        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        usage.total_allocated = usage.total_allocated.saturating_sub(bytes);
        usage.allocation_count = usage.allocation_count.saturating_sub(1);
        if let Some(used) = usage.space_usage.get_mut(&space) {
            *used = used.saturating_sub(bytes);
        }
        trace!(bytes, %space, total = usage.total_allocated, "released buffer");
    }

    unsafe fn copy(
        &self,
        dst: *mut u8,
        _dst_space: MemoryType,
        src: *const u8,
        _src_space: MemoryType,
        bytes: usize,
        _stream: &Stream,
    ) {
        // Every space is host memory here, so a plain memcpy is synchronous.
        std::ptr::copy_nonoverlapping(src, dst, bytes);
    }

    fn stats(&self) -> MemoryStats {
        let usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        MemoryStats {
            total_allocated: usage.total_allocated,
            peak_usage: usage.peak_usage,
            allocation_count: usage.allocation_count,
            budget: self.config.memory_budget,
            space_usage: usage.space_usage.clone(),
        }
    }
}
