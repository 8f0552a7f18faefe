//! Standard file I/O implementation.
//!
//! This is the default cross-platform implementation. Positional reads
//! and writes are implemented as seek + read/write under a mutex, which
//! keeps the handle shareable between threads on every platform.

use std::fs::File as StdFile;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::error::{IoError, IoResult};
use super::handle::FileHandle;
use super::options::OpenOptions;

/// Standard file implementation.
///
/// Wraps a `std::fs::File` behind a mutex so that positional operations
/// from multiple threads never interleave their seek and transfer steps.
pub struct StandardFile {
    /// The underlying file, wrapped in a mutex for thread-safe access.
    file: Mutex<StdFile>,
    /// The file path.
    path: PathBuf,
    /// Whether the file was opened with write access.
    writable: bool,
}

impl StandardFile {
    /// Opens a file with the specified options.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> IoResult<Self> {
        let path = path.as_ref().to_path_buf();

        let file = options
            .to_std()
            .open(&path)
            .map_err(|e| IoError::file("open", &path, e))?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            writable: options.is_writable(),
        })
    }

    /// Returns true if the file was opened with write access.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl FileHandle for StandardFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> IoResult<u64> {
        let file = self.file.lock();
        Ok(file.metadata()?.len())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.write(buf)?)
    }

    fn sync(&self) -> IoResult<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }

    fn set_len(&self, size: u64) -> IoResult<()> {
        let file = self.file.lock();
        file.set_len(size)?;
        Ok(())
    }
}

impl std::fmt::Debug for StandardFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardFile")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .finish()
    }
}
