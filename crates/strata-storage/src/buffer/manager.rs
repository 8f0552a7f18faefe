//! Buffer manager implementation.
//!
//! The buffer manager mediates between on-disk blocks and a bounded
//! in-memory working set. It owns the handle registry, the eviction
//! queue, the memory budget, and the temporary spill area.
//!
//! Shared state lives in [`BufferCore`], jointly owned by the manager
//! façade and every outstanding [`BlockHandle`], so handle destructors
//! can release memory and unregister themselves no matter when the last
//! reference drops.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use strata_common::constants::{BLOCK_HEADER_SIZE, MAXIMUM_BLOCK, SPILL_FILE_SUFFIX, SPILL_HEADER_SIZE};
use strata_common::memory::{AlignedBuffer, IO_ALIGNMENT};
use strata_common::types::BlockId;

use super::config::BufferConfig;
use super::error::{BufferError, BufferResult};
use super::handle::BlockHandle;
use super::pin::BufferPin;
use super::queue::EvictionQueue;
use super::temp::TemporaryDirectoryHandle;
use super::BufferStats;
use crate::block::BlockManager;
use crate::file::{FileHandle, FileManager, IoResult, OpenOptions};

/// Shared manager state.
///
/// Lock order: the registry, limit, and temp-handle mutexes are never
/// held while acquiring a handle lock; handle locks may acquire the
/// temp-handle mutex (spill) and the temp-directory read lock
/// (`can_unload`), both of which are leaves.
pub(crate) struct BufferCore {
    /// Registry of persistent block handles, by id. Non-owning: a handle
    /// dies with its last pin/reference and erases its own entry.
    registry: Mutex<HashMap<BlockId, Weak<BlockHandle>>>,
    /// Eviction candidates.
    queue: EvictionQueue,
    /// Bytes currently charged against the budget.
    current_memory: AtomicU64,
    /// The memory budget.
    maximum_memory: AtomicU64,
    /// Next transient block id.
    temporary_id: AtomicU64,
    /// Configured spill directory, if any.
    temp_directory: RwLock<Option<PathBuf>>,
    /// Lazily created spill directory handle.
    temp_handle: Mutex<Option<TemporaryDirectoryHandle>>,
    /// Serializes `set_limit` critical sections.
    limit_lock: Mutex<()>,
    /// Filesystem operations for the spill path.
    file_manager: FileManager,
    /// Block I/O for persistent blocks.
    block_manager: BlockManager,
    // Statistics
    eviction_count: AtomicU64,
    spill_write_count: AtomicU64,
    spill_read_count: AtomicU64,
}

impl BufferCore {
    /// Returns the block I/O layer.
    pub(crate) fn block_manager(&self) -> &BlockManager {
        &self.block_manager
    }

    /// Returns the eviction queue.
    pub(crate) fn queue(&self) -> &EvictionQueue {
        &self.queue
    }

    /// Returns the memory budget.
    pub(crate) fn max_memory(&self) -> u64 {
        self.maximum_memory.load(Ordering::Acquire)
    }

    /// Returns the bytes currently charged against the budget.
    pub(crate) fn current_memory(&self) -> u64 {
        self.current_memory.load(Ordering::Acquire)
    }

    /// Credits `bytes` back to the budget.
    pub(crate) fn release_memory(&self, bytes: u64) {
        self.current_memory.fetch_sub(bytes, Ordering::AcqRel);
    }

    /// Returns true if a spill directory is configured.
    pub(crate) fn has_temp_directory(&self) -> bool {
        self.temp_directory.read().is_some()
    }

    /// Charges `extra_memory` and evicts buffers until the budget drops
    /// to `memory_limit`.
    ///
    /// Returns `Ok(false)` and undoes the charge when the queue drains
    /// before the budget is met. I/O failures during spill propagate
    /// after undoing the charge. Reservation and eviction share the
    /// same counter; this function both charges and evicts.
    pub(crate) fn evict_blocks(&self, extra_memory: u64, memory_limit: u64) -> BufferResult<bool> {
        self.current_memory.fetch_add(extra_memory, Ordering::AcqRel);
        while self.current_memory.load(Ordering::Acquire) > memory_limit {
            // get an eviction candidate from the queue
            let Some(node) = self.queue.pop() else {
                self.current_memory.fetch_sub(extra_memory, Ordering::AcqRel);
                return Ok(false);
            };
            let Some(handle) = node.upgrade() else {
                continue;
            };
            if !node.can_unload(&handle) {
                // early out: stale candidate, no need to take the lock
                continue;
            }
            let mut buffer = handle.lock_buffer();
            if !node.can_unload(&handle) {
                // re-pinned or superseded in the meantime, bail out
                continue;
            }
            if let Err(err) = handle.unload(&mut buffer) {
                drop(buffer);
                self.current_memory.fetch_sub(extra_memory, Ordering::AcqRel);
                return Err(err);
            }
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(block_id = %handle.block_id(), "evicted buffer");
        }
        Ok(true)
    }

    /// Called from a handle's destructor.
    pub(crate) fn unregister_block(&self, block_id: BlockId, can_destroy: bool) {
        if block_id.is_transient() {
            // in-memory buffer: remove any spill file left behind
            if !can_destroy {
                self.delete_temporary_file(block_id);
            }
        } else {
            let mut registry = self.registry.lock();
            // only erase if the entry still refers to the dead handle; a
            // concurrent register may have replaced it with a live one
            if let Some(entry) = registry.get(&block_id) {
                if entry.upgrade().is_none() {
                    registry.remove(&block_id);
                }
            }
        }
    }

    /// Ensures the spill directory exists, creating it on first use.
    pub(crate) fn require_temporary_directory(&self) -> BufferResult<()> {
        let configured = self.temp_directory.read().clone();
        let Some(path) = configured else {
            return Err(BufferError::NoTemporaryDirectory);
        };
        let mut handle = self.temp_handle.lock();
        if handle.is_none() {
            *handle = Some(TemporaryDirectoryHandle::new(
                self.file_manager.clone(),
                path,
            )?);
        }
        Ok(())
    }

    fn temporary_path(&self, id: BlockId) -> PathBuf {
        let dir = self.temp_directory.read();
        let dir = dir.as_ref().expect("temporary directory not configured");
        dir.join(format!("{id}{SPILL_FILE_SUFFIX}"))
    }

    /// Writes a transient buffer to its spill file.
    ///
    /// The file holds an 8-byte little-endian payload size followed by
    /// the payload. A failed write removes the partial file so later
    /// pins never observe a half-spilled state.
    pub(crate) fn write_temporary_buffer(
        &self,
        id: BlockId,
        buffer: &AlignedBuffer,
    ) -> BufferResult<()> {
        self.require_temporary_directory()?;
        let path = self.temporary_path(id);
        let result: IoResult<()> = (|| {
            let file = self
                .file_manager
                .open(&path, OpenOptions::create().truncate())?;
            let size = buffer.len() as u64;
            file.write_all_at(&size.to_le_bytes(), 0)?;
            file.write_all_at(buffer.as_slice(), SPILL_HEADER_SIZE as u64)?;
            Ok(())
        })();
        if let Err(err) = result {
            let _ = self.file_manager.remove(&path);
            return Err(err.into());
        }
        self.spill_write_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(block_id = %id, bytes = buffer.len(), "spilled buffer");
        Ok(())
    }

    /// Reads a spilled transient buffer back into memory.
    pub(crate) fn read_temporary_buffer(&self, id: BlockId) -> BufferResult<AlignedBuffer> {
        let path = self.temporary_path(id);
        let file = self.file_manager.open(&path, OpenOptions::read())?;
        let mut size_bytes = [0u8; SPILL_HEADER_SIZE];
        file.read_exact_at(&mut size_bytes, 0)?;
        let size = u64::from_le_bytes(size_bytes) as usize;
        let mut buffer = AlignedBuffer::new(size, IO_ALIGNMENT);
        file.read_exact_at(buffer.as_mut_slice(), SPILL_HEADER_SIZE as u64)?;
        self.spill_read_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(block_id = %id, bytes = size, "read spilled buffer");
        Ok(buffer)
    }

    /// Best-effort removal of a spill file.
    pub(crate) fn delete_temporary_file(&self, id: BlockId) {
        if self.temp_directory.read().is_none() || self.temp_handle.lock().is_none() {
            return;
        }
        let path = self.temporary_path(id);
        if self.file_manager.exists(&path) {
            match self.file_manager.remove(&path) {
                Ok(()) => tracing::debug!(block_id = %id, "deleted spill file"),
                Err(err) => {
                    tracing::warn!(block_id = %id, error = %err, "failed to delete spill file");
                }
            }
        }
    }
}

impl std::fmt::Debug for BufferCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCore")
            .field("current_memory", &self.current_memory())
            .field("maximum_memory", &self.max_memory())
            .field("queue", &self.queue)
            .finish()
    }
}

/// The buffer manager.
///
/// Coordinates registration, pinning, eviction, spill, and reclamation
/// of block buffers against a hard memory budget.
///
/// # Usage
///
/// ```rust,no_run
/// use strata_storage::block::BlockManager;
/// use strata_storage::buffer::{BufferConfig, BufferManager};
/// use strata_storage::file::FileManager;
/// use strata_common::types::BlockId;
///
/// fn example() -> strata_storage::buffer::BufferResult<()> {
///     let blocks = BlockManager::open(&FileManager::new(), "data.db")?;
///     let manager = BufferManager::new(blocks, BufferConfig::default())?;
///
///     // Pin a persistent block; the pin keeps it resident
///     let handle = manager.register_block(BlockId::new(42));
///     let pin = manager.pin(&handle)?;
///     let _first_byte = pin.as_slice()[0];
///
///     // Dropping the pin makes the block an eviction candidate
///     drop(pin);
///     Ok(())
/// }
/// ```
pub struct BufferManager {
    core: Arc<BufferCore>,
}

impl BufferManager {
    /// Creates a buffer manager over the given block I/O layer.
    pub fn new(block_manager: BlockManager, config: BufferConfig) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        let core = Arc::new(BufferCore {
            registry: Mutex::new(HashMap::new()),
            queue: EvictionQueue::new(),
            current_memory: AtomicU64::new(0),
            maximum_memory: AtomicU64::new(config.maximum_memory),
            temporary_id: AtomicU64::new(MAXIMUM_BLOCK),
            temp_directory: RwLock::new(config.temp_directory),
            temp_handle: Mutex::new(None),
            limit_lock: Mutex::new(()),
            file_manager: FileManager::new(),
            block_manager,
            eviction_count: AtomicU64::new(0),
            spill_write_count: AtomicU64::new(0),
            spill_read_count: AtomicU64::new(0),
        });
        Ok(Self { core })
    }

    /// Returns the shared handle for a persistent block, registering it
    /// on first reference.
    ///
    /// All concurrent callers observe the same handle; a fresh one is
    /// created only when no live handle exists for the id.
    pub fn register_block(&self, block_id: BlockId) -> Arc<BlockHandle> {
        debug_assert!(block_id.is_persistent());
        let mut registry = self.core.registry.lock();
        // check if the block already has a live handle
        if let Some(entry) = registry.get(&block_id) {
            if let Some(existing) = entry.upgrade() {
                return existing;
            }
        }
        let handle = Arc::new(BlockHandle::new_unloaded(Arc::clone(&self.core), block_id));
        registry.insert(block_id, Arc::downgrade(&handle));
        handle
    }

    /// Creates a loaded transient handle owning a fresh buffer of
    /// `alloc_size` bytes.
    ///
    /// Reserves `alloc_size` plus header against the budget first,
    /// evicting as needed.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfMemory`] when the reservation cannot be met.
    pub fn register_memory(
        &self,
        alloc_size: usize,
        can_destroy: bool,
    ) -> BufferResult<Arc<BlockHandle>> {
        // first evict blocks until there is room for this buffer
        let required = (alloc_size + BLOCK_HEADER_SIZE) as u64;
        if !self.core.evict_blocks(required, self.core.max_memory())? {
            return Err(BufferError::out_of_memory(required));
        }

        let buffer = AlignedBuffer::new(alloc_size, IO_ALIGNMENT);
        let temp_id = BlockId::new(self.core.temporary_id.fetch_add(1, Ordering::Relaxed));
        Ok(Arc::new(BlockHandle::new_loaded(
            Arc::clone(&self.core),
            temp_id,
            buffer,
            can_destroy,
        )))
    }

    /// Allocates and pins a destroyable transient buffer.
    pub fn allocate(&self, alloc_size: usize) -> BufferResult<BufferPin> {
        let handle = self.register_memory(alloc_size, true)?;
        self.pin(&handle)
    }

    /// Resizes the buffer behind the caller's pin to `alloc_size` bytes.
    ///
    /// The caller must hold exactly one pin on the handle. Growth
    /// reserves the difference via eviction; shrinking credits the
    /// surplus back. The pin's view is refreshed in place.
    pub fn reallocate(&self, pin: &mut BufferPin, alloc_size: usize) -> BufferResult<()> {
        let handle = Arc::clone(pin.handle());
        let mut buffer = handle.lock_buffer();
        debug_assert_eq!(handle.readers(), 1, "reallocate requires exactly one pin");

        let total_size = (alloc_size + BLOCK_HEADER_SIZE) as u64;
        let current = handle.memory_usage();
        if total_size > current {
            // evict blocks until there is space to grow this buffer;
            // candidates pointing at this handle are filtered out by the
            // readers check before their lock is taken
            let required = total_size - current;
            if !self.core.evict_blocks(required, self.core.max_memory())? {
                return Err(BufferError::out_of_memory(required));
            }
        } else {
            self.core.release_memory(current - total_size);
        }

        let buf = buffer.as_mut().expect("reallocate on an unloaded handle");
        buf.resize(alloc_size);
        handle.set_memory_usage(total_size);
        pin.update_view(buf);
        Ok(())
    }

    /// Pins a handle, loading its buffer if necessary.
    ///
    /// The load path releases the handle lock while reserving memory, so
    /// two concurrent pinners of the same unloaded handle may both
    /// reserve; the loser of the race credits its reservation back, and
    /// the budget may transiently overshoot in between.
    ///
    /// # Errors
    ///
    /// [`BufferError::OutOfMemory`] when the reservation cannot be met;
    /// [`BufferError::BufferDiscarded`] when pinning a destroyable
    /// transient whose contents were evicted.
    pub fn pin(&self, handle: &Arc<BlockHandle>) -> BufferResult<BufferPin> {
        let required_memory;
        {
            let mut buffer = handle.lock_buffer();
            if handle.is_loaded() {
                // already resident: count the reader and hand out a view
                handle.add_reader();
                return handle.load(&mut buffer);
            }
            required_memory = handle.memory_usage();
        }

        // evict blocks until there is space for this buffer
        if !self.core.evict_blocks(required_memory, self.core.max_memory())? {
            return Err(BufferError::out_of_memory(required_memory));
        }

        // retake the lock and repeat the check (somebody may have loaded
        // the block in the meantime)
        let mut buffer = handle.lock_buffer();
        if handle.is_loaded() {
            // the loader charged for the buffer as well: return the
            // duplicate reservation. The overshoot between the two points
            // is tolerated.
            self.core.release_memory(required_memory);
            handle.add_reader();
            return handle.load(&mut buffer);
        }

        debug_assert_eq!(handle.readers(), 0);
        handle.set_readers(1);
        match handle.load(&mut buffer) {
            Ok(pin) => Ok(pin),
            Err(err) => {
                // leave the handle unloaded and return the reservation
                handle.set_readers(0);
                self.core.release_memory(required_memory);
                Err(err)
            }
        }
    }

    /// Changes the memory budget, evicting down to the new limit.
    ///
    /// Two-phase: evict to the proposed limit, install it, then evict
    /// again to absorb any allocation that slipped in during the
    /// transition. A failed second pass restores the previous limit.
    pub fn set_limit(&self, new_limit: u64) -> BufferResult<()> {
        let _guard = self.core.limit_lock.lock();
        if !self.core.evict_blocks(0, new_limit)? {
            return Err(BufferError::LimitChangeFailed { limit: new_limit });
        }
        let old_limit = self.core.maximum_memory.swap(new_limit, Ordering::AcqRel);
        if !self.core.evict_blocks(0, new_limit)? {
            self.core.maximum_memory.store(old_limit, Ordering::Release);
            return Err(BufferError::LimitChangeFailed { limit: new_limit });
        }
        tracing::debug!(limit = new_limit, "memory limit changed");
        Ok(())
    }

    /// Configures the spill directory.
    ///
    /// # Errors
    ///
    /// [`BufferError::TemporaryDirectoryInUse`] once a spill has
    /// occurred; the directory cannot be switched afterwards.
    pub fn set_temporary_directory(&self, path: impl Into<PathBuf>) -> BufferResult<()> {
        let temp_handle = self.core.temp_handle.lock();
        if temp_handle.is_some() {
            return Err(BufferError::TemporaryDirectoryInUse);
        }
        *self.core.temp_directory.write() = Some(path.into());
        Ok(())
    }

    /// Returns the bytes currently charged against the budget.
    #[must_use]
    pub fn memory_usage(&self) -> u64 {
        self.core.current_memory()
    }

    /// Returns the memory budget.
    #[must_use]
    pub fn max_memory(&self) -> u64 {
        self.core.max_memory()
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            current_memory: self.core.current_memory(),
            maximum_memory: self.core.max_memory(),
            evictions: self.core.eviction_count.load(Ordering::Relaxed),
            spill_writes: self.core.spill_write_count.load(Ordering::Relaxed),
            spill_reads: self.core.spill_read_count.load(Ordering::Relaxed),
            eviction_queue_len: self.core.queue.len(),
        }
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use rand::RngCore;
    use std::path::Path;
    use std::thread;
    use strata_common::constants::{BLOCK_ALLOC_SIZE, BLOCK_SIZE};
    use tempfile::tempdir;

    const ALLOC: u64 = BLOCK_ALLOC_SIZE as u64;

    fn seed_blocks(block_manager: &BlockManager, count: u64) {
        for i in 0..count {
            let mut block = Block::new(BlockId::new(i));
            block.data_mut().fill(i as u8 + 1);
            block_manager.write(&block).unwrap();
        }
    }

    fn test_block_manager(dir: &Path) -> BlockManager {
        let block_manager = BlockManager::create(&FileManager::new(), dir.join("data.db")).unwrap();
        seed_blocks(&block_manager, 8);
        block_manager
    }

    fn create_test_manager(maximum_memory: u64) -> (BufferManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let block_manager = test_block_manager(dir.path());
        let manager = BufferManager::new(block_manager, BufferConfig::new(maximum_memory)).unwrap();
        (manager, dir)
    }

    fn create_spill_manager(maximum_memory: u64) -> (BufferManager, PathBuf, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let spill = dir.path().join("spill");
        let block_manager = test_block_manager(dir.path());
        let config = BufferConfig::new(maximum_memory).with_temp_directory(&spill);
        let manager = BufferManager::new(block_manager, config).unwrap();
        (manager, spill, dir)
    }

    fn spill_files(spill: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(spill)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let block_manager = test_block_manager(dir.path());
        let result = BufferManager::new(block_manager, BufferConfig::new(0));
        assert!(matches!(result, Err(BufferError::Config { .. })));
    }

    #[test]
    fn test_register_block_returns_same_handle() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let first = manager.register_block(BlockId::new(42));
        let second = manager.register_block(BlockId::new(42));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_register_block_after_drop_creates_new_handle() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let first = manager.register_block(BlockId::new(1));
        drop(first);

        // the registry entry was erased by the destructor
        let second = manager.register_block(BlockId::new(1));
        assert!(!second.is_loaded());
    }

    #[test]
    fn test_pin_reads_block_from_disk() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let handle = manager.register_block(BlockId::new(2));
        assert!(!handle.is_loaded());

        let pin = manager.pin(&handle).unwrap();
        assert!(handle.is_loaded());
        assert_eq!(handle.readers(), 1);
        // block 2 was seeded with the fill byte 3
        assert!(pin.as_slice().iter().all(|&b| b == 3));
        assert_eq!(manager.memory_usage(), ALLOC);
    }

    #[test]
    fn test_pin_missing_block_fails_cleanly() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        // block 100 was never written to the data file
        let handle = manager.register_block(BlockId::new(100));
        assert!(manager.pin(&handle).is_err());

        // the failed load returned its reservation and reader count
        assert_eq!(manager.memory_usage(), 0);
        assert_eq!(handle.readers(), 0);
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_eviction_under_memory_pressure() {
        let (manager, _dir) = create_test_manager(3 * ALLOC);

        let handles: Vec<_> = (0..3)
            .map(|i| manager.register_block(BlockId::new(i)))
            .collect();
        for handle in &handles {
            let _pin = manager.pin(handle).unwrap();
        }
        assert_eq!(manager.memory_usage(), 3 * ALLOC);

        // a fourth block forces one of the first three out
        let fourth = manager.register_block(BlockId::new(3));
        let _pin = manager.pin(&fourth).unwrap();

        assert!(manager.memory_usage() <= manager.max_memory());
        assert_eq!(manager.memory_usage(), 3 * ALLOC);
        assert_eq!(manager.stats().evictions, 1);
        let unloaded = handles.iter().filter(|h| !h.is_loaded()).count();
        assert_eq!(unloaded, 1);
    }

    #[test]
    fn test_pinned_blocks_are_not_evicted() {
        let (manager, _dir) = create_test_manager(2 * ALLOC);

        let h0 = manager.register_block(BlockId::new(0));
        let h1 = manager.register_block(BlockId::new(1));
        let _pin0 = manager.pin(&h0).unwrap();
        let _pin1 = manager.pin(&h1).unwrap();

        // both pinned: the third pin cannot reclaim anything
        let h2 = manager.register_block(BlockId::new(2));
        let result = manager.pin(&h2);
        assert!(matches!(result, Err(BufferError::OutOfMemory { .. })));

        // the failed reservation was undone
        assert_eq!(manager.memory_usage(), 2 * ALLOC);
        assert!(h0.is_loaded());
        assert!(h1.is_loaded());
    }

    #[test]
    fn test_transient_oom_without_temp_dir() {
        let (manager, _dir) = create_test_manager(2 * ALLOC);

        let h1 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h1).unwrap());
        let h2 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h2).unwrap());
        assert_eq!(manager.memory_usage(), 2 * ALLOC);

        // both candidates are un-unloadable: spilling is impossible
        let result = manager.register_memory(BLOCK_SIZE, false);
        assert!(matches!(result, Err(BufferError::OutOfMemory { .. })));

        assert!(h1.is_loaded());
        assert!(h2.is_loaded());
        assert_eq!(manager.memory_usage(), 2 * ALLOC);
    }

    #[test]
    fn test_spill_roundtrip() {
        let (manager, spill, _dir) = create_spill_manager(2 * ALLOC);

        let mut payload = vec![0u8; BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut payload);

        let h1 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        let h1_id = h1.block_id();
        {
            let mut pin = manager.pin(&h1).unwrap();
            pin.as_mut_slice().copy_from_slice(&payload);
        }
        let h2 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h2).unwrap());

        // the spill directory is created lazily, on first need
        assert!(!spill.exists());

        // the third buffer forces h1 out through the spill path
        let _h3 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        assert!(!h1.is_loaded());
        assert_eq!(manager.stats().spill_writes, 1);
        assert_eq!(spill_files(&spill), vec![format!("{h1_id}.block")]);

        // reading it back is bit-identical
        {
            let pin = manager.pin(&h1).unwrap();
            assert_eq!(pin.as_slice(), &payload[..]);
        }
        assert_eq!(manager.stats().spill_reads, 1);

        // destroying the handle removes its spill file
        drop(h1);
        assert!(!spill.join(format!("{h1_id}.block")).exists());
    }

    #[test]
    fn test_spill_directory_removed_on_teardown() {
        let (manager, spill, _dir) = create_spill_manager(ALLOC);

        let h1 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h1).unwrap());

        // force a spill so the directory exists
        let h2 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        assert!(spill.exists());

        drop(h1);
        drop(h2);
        drop(manager);
        assert!(!spill.exists());
    }

    #[test]
    fn test_pin_discarded_destroyable_transient() {
        let (manager, _dir) = create_test_manager(2 * ALLOC);

        let pin1 = manager.allocate(BLOCK_SIZE).unwrap();
        let h1 = Arc::clone(pin1.handle());
        drop(pin1);
        let pin2 = manager.allocate(BLOCK_SIZE).unwrap();
        drop(pin2);

        // h1 is evicted without a spill: destroyable buffers are discarded
        let _pin3 = manager.allocate(BLOCK_SIZE).unwrap();
        assert!(!h1.is_loaded());

        let result = manager.pin(&h1);
        assert!(matches!(result, Err(BufferError::BufferDiscarded { .. })));
        assert_eq!(h1.readers(), 0);
        // pin3's buffer is the only charge left
        assert_eq!(manager.memory_usage(), ALLOC);
    }

    #[test]
    fn test_concurrent_register_returns_one_handle() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);
        let manager = Arc::new(manager);

        let mut threads = vec![];
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            threads.push(thread::spawn(move || {
                manager.register_block(BlockId::new(42))
            }));
        }

        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }

    #[test]
    fn test_set_limit_fails_when_pinned() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let handle = manager.register_block(BlockId::new(7));
        let pin = manager.pin(&handle).unwrap();

        let result = manager.set_limit(0);
        assert!(matches!(result, Err(BufferError::LimitChangeFailed { .. })));

        // the limit is unchanged and the pin stays valid
        assert_eq!(manager.max_memory(), 4 * ALLOC);
        assert!(pin.as_slice().iter().all(|&b| b == 8));
    }

    #[test]
    fn test_set_limit_evicts_down_to_new_limit() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let handles: Vec<_> = (0..3)
            .map(|i| manager.register_block(BlockId::new(i)))
            .collect();
        for handle in &handles {
            drop(manager.pin(handle).unwrap());
        }
        assert_eq!(manager.memory_usage(), 3 * ALLOC);

        manager.set_limit(ALLOC).unwrap();
        assert_eq!(manager.max_memory(), ALLOC);
        assert!(manager.memory_usage() <= ALLOC);
    }

    #[test]
    fn test_stale_queue_entries_are_filtered() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);
        let manager = Arc::new(manager);

        let handle = manager.register_block(BlockId::new(0));

        // hammer the same handle from two threads; every release enqueues
        // a fresh candidate and strands the previous one
        let writer = {
            let manager = Arc::clone(&manager);
            let handle = Arc::clone(&handle);
            thread::spawn(move || {
                for _ in 0..500 {
                    drop(manager.pin(&handle).unwrap());
                }
            })
        };
        for _ in 0..500 {
            drop(manager.pin(&handle).unwrap());
        }
        writer.join().unwrap();

        assert_eq!(handle.readers(), 0);
        assert!(handle.is_loaded());
        assert!(manager.stats().eviction_queue_len >= 1);

        // draining to zero filters every stale entry and unloads exactly once
        manager.set_limit(0).unwrap();
        assert_eq!(manager.memory_usage(), 0);
        assert!(!handle.is_loaded());
        assert_eq!(manager.stats().evictions, 1);
    }

    #[test]
    fn test_concurrent_pins_never_unload_pinned_handle() {
        let (manager, _dir) = create_test_manager(2 * ALLOC);
        let manager = Arc::new(manager);

        let target = manager.register_block(BlockId::new(0));

        // a competing thread cycles other blocks through the remaining
        // budget, constantly producing eviction candidates
        let churn = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..200 {
                    let handle = manager.register_block(BlockId::new(1 + (i % 4)));
                    if let Ok(pin) = manager.pin(&handle) {
                        assert!(pin.as_slice().iter().all(|&b| b == (2 + i % 4) as u8));
                    }
                }
            })
        };

        for _ in 0..200 {
            let pin = manager.pin(&target).unwrap();
            // while this pin exists the contents must stay intact
            assert!(pin.as_slice().iter().all(|&b| b == 1));
        }
        churn.join().unwrap();
    }

    #[test]
    fn test_reallocate_grow_and_shrink() {
        let (manager, _dir) = create_test_manager(8 * ALLOC);

        let mut pin = manager.allocate(1024).unwrap();
        pin.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(manager.memory_usage(), 1024 + BLOCK_HEADER_SIZE as u64);

        manager.reallocate(&mut pin, 4096).unwrap();
        assert_eq!(pin.len(), 4096);
        assert_eq!(&pin.as_slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(manager.memory_usage(), 4096 + BLOCK_HEADER_SIZE as u64);

        manager.reallocate(&mut pin, 512).unwrap();
        assert_eq!(pin.len(), 512);
        assert_eq!(&pin.as_slice()[..4], &[1, 2, 3, 4]);
        assert_eq!(manager.memory_usage(), 512 + BLOCK_HEADER_SIZE as u64);
    }

    #[test]
    fn test_memory_accounting_at_quiescence() {
        let (manager, _dir) = create_test_manager(6 * ALLOC);

        let persistent: Vec<_> = (0..3)
            .map(|i| manager.register_block(BlockId::new(i)))
            .collect();
        for handle in &persistent {
            drop(manager.pin(handle).unwrap());
        }
        let transient = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&transient).unwrap());
        let _discarded = manager.allocate(1000).unwrap();

        let expected: u64 = persistent
            .iter()
            .map(|h| if h.is_loaded() { h.memory_usage() } else { 0 })
            .sum::<u64>()
            + transient.memory_usage()
            + (1000 + BLOCK_HEADER_SIZE) as u64;
        assert_eq!(manager.memory_usage(), expected);
    }

    #[test]
    fn test_set_temporary_directory_after_spill_fails() {
        let (manager, _spill, dir) = create_spill_manager(ALLOC);

        let h1 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h1).unwrap());

        // trigger the first spill
        let _h2 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        assert_eq!(manager.stats().spill_writes, 1);

        let result = manager.set_temporary_directory(dir.path().join("elsewhere"));
        assert!(matches!(
            result,
            Err(BufferError::TemporaryDirectoryInUse)
        ));
    }

    #[test]
    fn test_set_temporary_directory_enables_spill() {
        let (manager, dir) = create_test_manager(ALLOC);

        let h1 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        drop(manager.pin(&h1).unwrap());

        // without a spill directory the handle is un-evictable
        assert!(!h1.can_unload());
        assert!(manager.register_memory(BLOCK_SIZE, false).is_err());

        manager
            .set_temporary_directory(dir.path().join("spill"))
            .unwrap();
        assert!(h1.can_unload());
        // re-arm the candidate consumed by the failed reservation
        drop(manager.pin(&h1).unwrap());
        let _h2 = manager.register_memory(BLOCK_SIZE, false).unwrap();
        assert!(!h1.is_loaded());
    }

    #[test]
    fn test_can_unload_transitions() {
        let (manager, _dir) = create_test_manager(4 * ALLOC);

        let handle = manager.register_block(BlockId::new(0));
        // unloaded handles are not eviction targets
        assert!(!handle.can_unload());

        let pin = manager.pin(&handle).unwrap();
        assert!(!handle.can_unload());

        drop(pin);
        assert!(handle.can_unload());
    }

    #[test]
    fn test_transient_ids_are_monotonic() {
        let (manager, _dir) = create_test_manager(8 * ALLOC);

        let a = manager.register_memory(1024, true).unwrap();
        let b = manager.register_memory(1024, true).unwrap();
        assert!(a.block_id().is_transient());
        assert!(b.block_id().is_transient());
        assert!(b.block_id().as_u64() > a.block_id().as_u64());
    }
}
