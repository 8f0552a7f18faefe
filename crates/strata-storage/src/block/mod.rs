//! Block I/O layer for StrataDB.
//!
//! Persistent blocks are fixed-size units of database storage, addressed
//! by [`BlockId`] and stored back to back in a single data file. The
//! [`BlockManager`] reads and writes whole blocks; caching and memory
//! accounting live a layer above, in [`crate::buffer`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_common::constants::BLOCK_SIZE;
use strata_common::memory::{AlignedBuffer, IO_ALIGNMENT};
use strata_common::types::BlockId;

use crate::file::{FileHandle, FileManager, IoResult, OpenOptions, StandardFile};

/// A fixed-size database block: an id plus an aligned data buffer.
///
/// The buffer is always exactly [`BLOCK_SIZE`] bytes and page-aligned so
/// it can move to and from the data file without intermediate copies.
pub struct Block {
    id: BlockId,
    data: AlignedBuffer,
}

impl Block {
    /// Creates a zeroed block for the given id.
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        debug_assert!(id.is_persistent(), "block ids must be persistent");
        Self {
            id,
            data: AlignedBuffer::new(BLOCK_SIZE, IO_ALIGNMENT),
        }
    }

    /// Returns the block id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the block contents.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Returns the block contents mutably.
    #[inline]
    #[must_use]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// Consumes the block, returning its buffer.
    #[must_use]
    pub fn into_buffer(self) -> AlignedBuffer {
        self.data
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block").field("id", &self.id).finish()
    }
}

/// Reads and writes fixed-size blocks against the data file.
pub struct BlockManager {
    file: Arc<StandardFile>,
    path: PathBuf,
}

impl BlockManager {
    /// Creates a new data file, failing if one already exists.
    pub fn create(file_manager: &FileManager, path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = file_manager.open(&path, OpenOptions::create_new())?;
        Ok(Self { file, path })
    }

    /// Opens an existing data file.
    pub fn open(file_manager: &FileManager, path: impl AsRef<Path>) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = file_manager.open(&path, OpenOptions::write())?;
        Ok(Self { file, path })
    }

    /// Returns the data file path.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the block's contents from the data file into its buffer.
    pub fn read(&self, block: &mut Block) -> IoResult<()> {
        let offset = Self::block_offset(block.id());
        self.file.read_exact_at(block.data_mut(), offset)
    }

    /// Writes the block's contents to the data file.
    pub fn write(&self, block: &Block) -> IoResult<()> {
        let offset = Self::block_offset(block.id());
        self.file.write_all_at(block.data(), offset)
    }

    /// Syncs the data file to disk.
    pub fn sync(&self) -> IoResult<()> {
        self.file.sync()
    }

    #[inline]
    fn block_offset(id: BlockId) -> u64 {
        id.as_u64() * BLOCK_SIZE as u64
    }
}

impl std::fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockManager")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_manager() -> (BlockManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let manager = BlockManager::create(&FileManager::new(), &path).unwrap();
        (manager, dir)
    }

    #[test]
    fn test_block_creation() {
        let block = Block::new(BlockId::new(3));
        assert_eq!(block.id(), BlockId::new(3));
        assert_eq!(block.data().len(), BLOCK_SIZE);
        assert!(block.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (manager, _dir) = create_test_manager();

        let mut block = Block::new(BlockId::new(2));
        block.data_mut()[0] = 0xAB;
        block.data_mut()[BLOCK_SIZE - 1] = 0xCD;
        manager.write(&block).unwrap();

        let mut read_back = Block::new(BlockId::new(2));
        manager.read(&mut read_back).unwrap();
        assert_eq!(read_back.data()[0], 0xAB);
        assert_eq!(read_back.data()[BLOCK_SIZE - 1], 0xCD);
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        let (manager, _dir) = create_test_manager();

        for i in 0..3u64 {
            let mut block = Block::new(BlockId::new(i));
            block.data_mut().fill(i as u8 + 1);
            manager.write(&block).unwrap();
        }

        for i in 0..3u64 {
            let mut block = Block::new(BlockId::new(i));
            manager.read(&mut block).unwrap();
            assert!(block.data().iter().all(|&b| b == i as u8 + 1));
        }
    }

    #[test]
    fn test_read_missing_block_fails() {
        let (manager, _dir) = create_test_manager();

        let mut block = Block::new(BlockId::new(9));
        assert!(manager.read(&mut block).is_err());
    }

    #[test]
    fn test_create_fails_on_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.db");
        let fm = FileManager::new();

        let _first = BlockManager::create(&fm, &path).unwrap();
        assert!(BlockManager::create(&fm, &path).is_err());
    }
}
