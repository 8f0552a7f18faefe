//! Block handle - the per-block state container.
//!
//! A [`BlockHandle`] tracks one block's load state, pin count, memory
//! charge, and eviction epoch. Handles are jointly owned (`Arc`) by all
//! outstanding pins and references; the manager's registry only holds
//! weak references, so a handle is destroyed the moment its last owner
//! drops, which in turn unregisters it.
//!
//! Metadata (state, readers, memory usage, epoch) lives in atomics so
//! eviction candidates can be staleness-checked without locking; every
//! mutation happens while holding the buffer mutex, which doubles as the
//! per-handle lock for compound transitions.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use strata_common::constants::{BLOCK_ALLOC_SIZE, BLOCK_HEADER_SIZE};
use strata_common::memory::AlignedBuffer;
use strata_common::types::BlockId;

use super::error::{BufferError, BufferResult};
use super::manager::BufferCore;
use super::pin::BufferPin;
use super::queue::EvictionNode;
use crate::block::Block;

/// Load state of a block handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockState {
    /// No buffer is resident; the next pin re-reads the contents.
    Unloaded = 0,
    /// The buffer is resident and charged against the memory budget.
    Loaded = 1,
}

/// Per-block state container.
pub struct BlockHandle {
    /// Shared manager state, kept alive by every outstanding handle.
    core: Arc<BufferCore>,
    /// Block identity.
    block_id: BlockId,
    /// When true, eviction discards the buffer instead of spilling it.
    can_destroy: bool,
    /// Load state. Mutated under the buffer lock.
    state: AtomicU8,
    /// Pin count. Mutated under the buffer lock.
    readers: AtomicU32,
    /// Bytes charged against the memory budget while resident.
    memory_usage: AtomicU64,
    /// Eviction epoch, bumped each time the pin count drops to zero.
    eviction_timestamp: AtomicU64,
    /// The resident buffer. The mutex is the per-handle lock.
    buffer: Mutex<Option<AlignedBuffer>>,
}

impl BlockHandle {
    /// Creates an unloaded handle for a persistent block.
    pub(crate) fn new_unloaded(core: Arc<BufferCore>, block_id: BlockId) -> Self {
        debug_assert!(block_id.is_persistent());
        Self {
            core,
            block_id,
            can_destroy: false,
            state: AtomicU8::new(BlockState::Unloaded as u8),
            readers: AtomicU32::new(0),
            memory_usage: AtomicU64::new(BLOCK_ALLOC_SIZE as u64),
            eviction_timestamp: AtomicU64::new(0),
            buffer: Mutex::new(None),
        }
    }

    /// Creates a loaded handle that takes ownership of a transient buffer.
    pub(crate) fn new_loaded(
        core: Arc<BufferCore>,
        block_id: BlockId,
        buffer: AlignedBuffer,
        can_destroy: bool,
    ) -> Self {
        debug_assert!(block_id.is_transient());
        let memory_usage = (buffer.len() + BLOCK_HEADER_SIZE) as u64;
        Self {
            core,
            block_id,
            can_destroy,
            state: AtomicU8::new(BlockState::Loaded as u8),
            readers: AtomicU32::new(0),
            memory_usage: AtomicU64::new(memory_usage),
            eviction_timestamp: AtomicU64::new(0),
            buffer: Mutex::new(Some(buffer)),
        }
    }

    /// Returns the block id.
    #[inline]
    #[must_use]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Returns true if eviction may discard this buffer without spilling.
    #[inline]
    #[must_use]
    pub fn can_destroy(&self) -> bool {
        self.can_destroy
    }

    /// Returns the load state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> BlockState {
        if self.state.load(Ordering::Acquire) == BlockState::Loaded as u8 {
            BlockState::Loaded
        } else {
            BlockState::Unloaded
        }
    }

    /// Returns true if a buffer is resident.
    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state() == BlockState::Loaded
    }

    /// Returns the current pin count.
    #[inline]
    #[must_use]
    pub fn readers(&self) -> u32 {
        self.readers.load(Ordering::Acquire)
    }

    /// Returns the bytes charged against the memory budget while resident.
    #[inline]
    #[must_use]
    pub fn memory_usage(&self) -> u64 {
        self.memory_usage.load(Ordering::Acquire)
    }

    /// Returns the current eviction epoch.
    #[inline]
    #[must_use]
    pub fn eviction_timestamp(&self) -> u64 {
        self.eviction_timestamp.load(Ordering::Acquire)
    }

    /// Returns true if this handle is currently a valid eviction target.
    ///
    /// False when unloaded, pinned, or when the handle is a
    /// non-destroyable transient and no spill directory is configured.
    #[must_use]
    pub fn can_unload(&self) -> bool {
        if self.state() == BlockState::Unloaded {
            return false;
        }
        if self.readers() > 0 {
            return false;
        }
        if self.block_id.is_transient()
            && !self.can_destroy
            && !self.core.has_temp_directory()
        {
            // unloading would require a spill and there is nowhere to spill to
            return false;
        }
        true
    }

    /// Locks the per-handle mutex.
    pub(crate) fn lock_buffer(&self) -> MutexGuard<'_, Option<AlignedBuffer>> {
        self.buffer.lock()
    }

    /// Increments the pin count. Caller holds the buffer lock.
    pub(crate) fn add_reader(&self) {
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    /// Sets the pin count. Caller holds the buffer lock.
    pub(crate) fn set_readers(&self, readers: u32) {
        self.readers.store(readers, Ordering::Release);
    }

    /// Updates the memory charge. Caller holds the buffer lock.
    pub(crate) fn set_memory_usage(&self, memory_usage: u64) {
        self.memory_usage.store(memory_usage, Ordering::Release);
    }

    /// Materializes the buffer and returns a pin view over it.
    ///
    /// Idempotent: when already loaded, just returns another view. The
    /// caller holds the buffer lock, has accounted a reader, and has
    /// reserved memory for the load. On failure the handle is left
    /// unloaded; the caller unwinds its reader and reservation.
    pub(crate) fn load(
        self: &Arc<Self>,
        buffer: &mut Option<AlignedBuffer>,
    ) -> BufferResult<BufferPin> {
        if self.state() == BlockState::Loaded {
            let buf = buffer.as_mut().expect("loaded handle without buffer");
            return Ok(BufferPin::new(Arc::clone(self), buf));
        }

        let loaded = if self.block_id.is_persistent() {
            let mut block = Block::new(self.block_id);
            self.core.block_manager().read(&mut block)?;
            block.into_buffer()
        } else if self.can_destroy {
            // evicted without a spill: the contents are gone for good
            return Err(BufferError::BufferDiscarded {
                block_id: self.block_id,
            });
        } else {
            self.core.read_temporary_buffer(self.block_id)?
        };

        *buffer = Some(loaded);
        self.state.store(BlockState::Loaded as u8, Ordering::Release);
        let buf = buffer.as_mut().expect("buffer was just stored");
        Ok(BufferPin::new(Arc::clone(self), buf))
    }

    /// Drops the resident buffer, spilling it first when required.
    ///
    /// Caller holds the buffer lock and has verified `can_unload`. On a
    /// failed spill write the handle stays loaded with its buffer intact
    /// and no spill file is left behind.
    pub(crate) fn unload(&self, buffer: &mut Option<AlignedBuffer>) -> BufferResult<()> {
        if self.state() == BlockState::Unloaded {
            return Ok(());
        }
        debug_assert_eq!(self.readers(), 0);

        if self.block_id.is_transient() && !self.can_destroy {
            let buf = buffer.as_ref().expect("loaded handle without buffer");
            self.core.write_temporary_buffer(self.block_id, buf)?;
        }

        *buffer = None;
        self.state
            .store(BlockState::Unloaded as u8, Ordering::Release);
        self.core.release_memory(self.memory_usage());
        Ok(())
    }

    /// Releases one pin. On the last release, bumps the eviction epoch
    /// and offers the handle to the eviction queue.
    pub(crate) fn unpin(self: &Arc<Self>) {
        let _buffer = self.buffer.lock();
        let old = self.readers.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "unpinned handle with readers = 0");
        if old == 1 {
            let timestamp = self.eviction_timestamp.fetch_add(1, Ordering::AcqRel) + 1;
            self.core
                .queue()
                .push(EvictionNode::new(Arc::downgrade(self), timestamp));
        }
    }
}

impl Drop for BlockHandle {
    fn drop(&mut self) {
        // No references remain; release the buffer and its charge
        if self.state() == BlockState::Loaded {
            let _buffer = self.buffer.get_mut().take();
            self.core.release_memory(self.memory_usage());
        }
        self.core.unregister_block(self.block_id, self.can_destroy);
    }
}

impl std::fmt::Debug for BlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockHandle")
            .field("block_id", &self.block_id)
            .field("state", &self.state())
            .field("readers", &self.readers())
            .field("memory_usage", &self.memory_usage())
            .field("can_destroy", &self.can_destroy)
            .finish()
    }
}
