//! Ordering tokens for asynchronous work.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// Opaque ordering token.
///
/// Work queued on the same stream executes in submission order. The core never
/// inspects streams; it only forwards them to the memory resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stream {
    id: u64,
}

impl Stream {
    /// A fresh stream with a process-unique id.
    pub fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}
