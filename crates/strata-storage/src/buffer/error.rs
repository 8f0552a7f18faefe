//! Buffer manager errors.

use std::io;

use strata_common::types::BlockId;
use thiserror::Error;

/// Result type for buffer manager operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer manager operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// The eviction queue was drained without freeing enough memory.
    #[error("not enough memory to complete operation: could not reserve {requested} bytes")]
    OutOfMemory { requested: u64 },

    /// A transient buffer needs to spill but no temporary directory is
    /// configured.
    #[error(
        "out of memory: cannot spill buffer because no temporary directory is configured; \
         set one with `BufferConfig::with_temp_directory` or \
         `BufferManager::set_temporary_directory`"
    )]
    NoTemporaryDirectory,

    /// `set_temporary_directory` was called after the first spill.
    #[error("cannot switch temporary directory after the current one has been used")]
    TemporaryDirectoryInUse,

    /// A destroyable transient buffer was evicted; its contents are gone
    /// and must be recreated by the caller.
    #[error("transient buffer {block_id} was discarded on eviction")]
    BufferDiscarded { block_id: BlockId },

    /// Not enough memory could be freed to move to the requested limit.
    #[error("could not free up enough memory to change memory limit to {limit} bytes")]
    LimitChangeFailed { limit: u64 },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// I/O error during spill or block read.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// File I/O error.
    #[error("file I/O error: {0}")]
    FileIo(#[from] crate::file::IoError),
}

impl BufferError {
    /// Creates an out-of-memory reservation error.
    pub fn out_of_memory(requested: u64) -> Self {
        Self::OutOfMemory { requested }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried
    /// once memory pressure subsides.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. } | Self::LimitChangeFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BufferError::out_of_memory(4096);
        assert_eq!(
            err.to_string(),
            "not enough memory to complete operation: could not reserve 4096 bytes"
        );
    }

    #[test]
    fn test_no_temp_directory_hint() {
        let err = BufferError::NoTemporaryDirectory;
        assert!(err.to_string().contains("set_temporary_directory"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(BufferError::out_of_memory(1).is_retryable());
        assert!(BufferError::LimitChangeFailed { limit: 0 }.is_retryable());
        assert!(!BufferError::NoTemporaryDirectory.is_retryable());
        assert!(!BufferError::TemporaryDirectoryInUse.is_retryable());
    }
}
