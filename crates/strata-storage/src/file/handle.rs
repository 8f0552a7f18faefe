//! File handle trait and file manager.

use std::path::Path;
use std::sync::Arc;

use super::error::{IoError, IoResult};
use super::options::OpenOptions;
use super::std_io::StandardFile;

/// Trait for synchronous file operations.
///
/// All operations are position-based (pread/pwrite style) so handles can
/// be shared between threads without external seek coordination.
pub trait FileHandle: Send + Sync {
    /// Returns the file path.
    fn path(&self) -> &Path;

    /// Returns the current file size.
    fn size(&self) -> IoResult<u64>;

    /// Reads data from the file at the specified offset.
    ///
    /// Returns the number of bytes read. May return less than the buffer
    /// size if EOF is reached.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> IoResult<usize>;

    /// Reads exactly `buf.len()` bytes from the file at the specified offset.
    ///
    /// Returns an error if EOF is reached before the buffer is filled.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> IoResult<()> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let n = self.read_at(&mut buf[total_read..], offset + total_read as u64)?;
            if n == 0 {
                return Err(IoError::eof_read(buf.len(), total_read, offset));
            }
            total_read += n;
        }
        Ok(())
    }

    /// Writes data to the file at the specified offset.
    ///
    /// Returns the number of bytes written.
    fn write_at(&self, buf: &[u8], offset: u64) -> IoResult<usize>;

    /// Writes all bytes to the file at the specified offset.
    ///
    /// Returns an error if not all bytes could be written.
    fn write_all_at(&self, buf: &[u8], offset: u64) -> IoResult<()> {
        let mut total_written = 0;
        while total_written < buf.len() {
            let n = self.write_at(&buf[total_written..], offset + total_written as u64)?;
            if n == 0 {
                return Err(IoError::eof_write(buf.len(), total_written, offset));
            }
            total_written += n;
        }
        Ok(())
    }

    /// Syncs all data and metadata to disk.
    fn sync(&self) -> IoResult<()>;

    /// Truncates or extends the file to the specified size.
    fn set_len(&self, size: u64) -> IoResult<()>;
}

/// File manager for creating and managing file handles.
///
/// Also carries the directory-level operations the storage layer needs
/// (spill directory creation and teardown).
#[derive(Debug, Clone, Default)]
pub struct FileManager {
    _private: (),
}

impl FileManager {
    /// Creates a new file manager.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Opens a file with the specified options.
    pub fn open(&self, path: impl AsRef<Path>, options: OpenOptions) -> IoResult<Arc<StandardFile>> {
        let file = StandardFile::open(path.as_ref(), &options)?;
        Ok(Arc::new(file))
    }

    /// Opens a file for reading.
    pub fn open_read(&self, path: impl AsRef<Path>) -> IoResult<Arc<StandardFile>> {
        self.open(path, OpenOptions::read())
    }

    /// Opens a file for reading and writing, creating it if necessary.
    pub fn open_write(&self, path: impl AsRef<Path>) -> IoResult<Arc<StandardFile>> {
        self.open(path, OpenOptions::create())
    }

    /// Creates a new file, failing if it already exists.
    pub fn create(&self, path: impl AsRef<Path>) -> IoResult<Arc<StandardFile>> {
        self.open(path, OpenOptions::create_new())
    }

    /// Deletes a file.
    pub fn remove(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        std::fs::remove_file(path).map_err(|e| IoError::file("remove", path, e))
    }

    /// Checks if a file exists.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Creates a directory and all parent directories.
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| IoError::file("create directory", path, e))
    }

    /// Removes an empty directory.
    pub fn remove_dir(&self, path: impl AsRef<Path>) -> IoResult<()> {
        let path = path.as_ref();
        std::fs::remove_dir(path).map_err(|e| IoError::file("remove directory", path, e))
    }
}
