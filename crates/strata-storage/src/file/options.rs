//! File open modes.

use std::fs;

/// How the storage layer opens a file.
///
/// Only a handful of combinations ever occur: reading existing data
/// (blocks, spill payloads), writing an existing data file, rewriting a
/// spill file, and creating a fresh data file. `OpenOptions` enumerates
/// those modes rather than exposing every flag the OS supports; read
/// access is always granted.
///
/// # Example
///
/// ```rust
/// use strata_storage::file::OpenOptions;
///
/// // overwrite a spill file, creating it on first use
/// let options = OpenOptions::create().truncate();
/// assert!(options.is_writable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    mode: OpenMode,
    truncate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Read,
    Write,
    Create,
    CreateNew,
}

impl OpenOptions {
    /// Read-only access to an existing file.
    #[must_use]
    pub fn read() -> Self {
        Self {
            mode: OpenMode::Read,
            truncate: false,
        }
    }

    /// Read-write access to an existing file.
    #[must_use]
    pub fn write() -> Self {
        Self {
            mode: OpenMode::Write,
            truncate: false,
        }
    }

    /// Read-write access, creating the file when absent.
    #[must_use]
    pub fn create() -> Self {
        Self {
            mode: OpenMode::Create,
            truncate: false,
        }
    }

    /// Read-write access to a file that must not exist yet.
    #[must_use]
    pub fn create_new() -> Self {
        Self {
            mode: OpenMode::CreateNew,
            truncate: false,
        }
    }

    /// Discards any existing contents on open.
    #[must_use]
    pub fn truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// True for every mode except plain reads.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !matches!(self.mode, OpenMode::Read)
    }

    /// Lowers the mode onto `std::fs::OpenOptions`.
    pub(crate) fn to_std(self) -> fs::OpenOptions {
        let mut options = fs::OpenOptions::new();
        options.read(true);
        match self.mode {
            OpenMode::Read => {}
            OpenMode::Write => {
                options.write(true);
            }
            OpenMode::Create => {
                options.write(true).create(true);
            }
            OpenMode::CreateNew => {
                options.write(true).create_new(true);
            }
        }
        if self.truncate {
            options.truncate(true);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_plain_reads_are_read_only() {
        assert!(!OpenOptions::read().is_writable());
        assert!(OpenOptions::write().is_writable());
        assert!(OpenOptions::create().is_writable());
        assert!(OpenOptions::create_new().is_writable());
    }

    #[test]
    fn test_truncate_is_off_by_default() {
        assert_ne!(OpenOptions::create(), OpenOptions::create().truncate());
    }

    #[test]
    fn test_modes_are_distinct() {
        assert_ne!(OpenOptions::create(), OpenOptions::create_new());
        assert_ne!(OpenOptions::read(), OpenOptions::write());
    }
}
