//! Pinned buffer views.
//!
//! A [`BufferPin`] is an RAII pin on a block handle: while it exists the
//! handle's reader count is positive and the buffer cannot be unloaded.
//! Dropping the pin releases the reader count and, on the last release,
//! offers the handle to the eviction queue.

use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use strata_common::memory::AlignedBuffer;
use strata_common::types::BlockId;

use super::handle::BlockHandle;

/// A pinned view over a resident buffer.
///
/// The view caches a pointer to the buffer's bytes so data access never
/// crosses the buffer manager. The pointer stays valid for the lifetime
/// of the pin: unloading is excluded while `readers > 0`, and
/// reallocation goes through [`crate::buffer::BufferManager::reallocate`],
/// which requires the unique pin by `&mut` and refreshes the cached view.
///
/// Concurrent pins of the same handle alias the same bytes; writers
/// must coordinate with other pin holders, as with any shared buffer.
pub struct BufferPin {
    handle: Arc<BlockHandle>,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the pin owns a reader count on the handle; the pointed-to
// buffer is kept alive by that count, independent of threads.
unsafe impl Send for BufferPin {}
unsafe impl Sync for BufferPin {}

impl BufferPin {
    /// Creates a pin view over the handle's resident buffer.
    ///
    /// The caller must already have incremented the handle's reader
    /// count; this constructor only captures the view.
    pub(crate) fn new(handle: Arc<BlockHandle>, buffer: &mut AlignedBuffer) -> Self {
        let ptr = NonNull::new(buffer.as_mut_ptr()).expect("buffer pointer is null");
        let len = buffer.len();
        Self { handle, ptr, len }
    }

    /// Returns the pinned block's id.
    #[inline]
    #[must_use]
    pub fn block_id(&self) -> BlockId {
        self.handle.block_id()
    }

    /// Returns the handle this pin refers to.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &Arc<BlockHandle> {
        &self.handle
    }

    /// Returns the buffer length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the buffer contents.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the reader count keeps the buffer resident and its
        // allocation stable for the lifetime of the pin.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the buffer contents mutably.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; exclusivity among pins of the same
        // handle is the caller's contract.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Refreshes the cached view after the buffer was reallocated.
    pub(crate) fn update_view(&mut self, buffer: &mut AlignedBuffer) {
        self.ptr = NonNull::new(buffer.as_mut_ptr()).expect("buffer pointer is null");
        self.len = buffer.len();
    }
}

impl Drop for BufferPin {
    fn drop(&mut self) {
        BlockHandle::unpin(&self.handle);
    }
}

impl std::fmt::Debug for BufferPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPin")
            .field("block_id", &self.block_id())
            .field("len", &self.len)
            .finish()
    }
}
