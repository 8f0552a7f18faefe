//! Scoped spill directory.

use std::path::PathBuf;

use crate::file::{FileManager, IoResult};

/// A scoped resource representing the on-disk spill area.
///
/// Construction creates the directory; dropping the handle removes it.
/// By teardown time the directory should be empty again, since every
/// transient handle deletes its own spill file on destruction.
pub(crate) struct TemporaryDirectoryHandle {
    file_manager: FileManager,
    path: PathBuf,
}

impl TemporaryDirectoryHandle {
    /// Creates the spill directory.
    pub(crate) fn new(file_manager: FileManager, path: PathBuf) -> IoResult<Self> {
        file_manager.create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "created temporary directory");
        Ok(Self { file_manager, path })
    }

}

impl Drop for TemporaryDirectoryHandle {
    fn drop(&mut self) {
        if let Err(err) = self.file_manager.remove_dir(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove temporary directory"
            );
        }
    }
}

impl std::fmt::Debug for TemporaryDirectoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryDirectoryHandle")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_directory_lifecycle() {
        let dir = tempdir().unwrap();
        let spill = dir.path().join("spill");
        let fm = FileManager::new();

        {
            let _handle = TemporaryDirectoryHandle::new(fm.clone(), spill.clone()).unwrap();
            assert!(spill.exists());
        }

        // Removed on drop
        assert!(!spill.exists());
    }

    #[test]
    fn test_non_empty_directory_survives_drop() {
        let dir = tempdir().unwrap();
        let spill = dir.path().join("spill");
        let fm = FileManager::new();

        {
            let _handle = TemporaryDirectoryHandle::new(fm.clone(), spill.clone()).unwrap();
            std::fs::write(spill.join("leftover.block"), b"x").unwrap();
        }

        // Removal is best-effort; a non-empty directory is left in place
        assert!(spill.exists());
    }
}
