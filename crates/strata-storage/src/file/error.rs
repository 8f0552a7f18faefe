//! Errors for the file layer.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for file layer operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors produced by the file layer.
///
/// Filesystem operations carry the operation and the path they failed
/// on, so a spill or block-read failure surfaced through the buffer
/// manager still names the file it happened to. Positional transfers
/// that come up short report their offset; that is how reading a block
/// that was never written shows up.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum IoError {
    /// A filesystem operation failed on a specific path.
    #[error("could not {op} {path}: {source}")]
    File {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A positional read or write moved fewer bytes than required.
    #[error("{op} of {wanted} bytes at offset {offset} ended after {got}")]
    UnexpectedEof {
        op: &'static str,
        wanted: usize,
        got: usize,
        offset: u64,
    },

    /// An I/O error with no path context.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl IoError {
    /// Wraps a filesystem error with the operation and path it hit.
    pub fn file(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            op,
            path: path.into(),
            source,
        }
    }

    /// Reports a read that ran out of file.
    pub fn eof_read(wanted: usize, got: usize, offset: u64) -> Self {
        Self::UnexpectedEof {
            op: "read",
            wanted,
            got,
            offset,
        }
    }

    /// Reports a write that could not move all bytes.
    pub fn eof_write(wanted: usize, got: usize, offset: u64) -> Self {
        Self::UnexpectedEof {
            op: "write",
            wanted,
            got,
            offset,
        }
    }

    /// True when the underlying cause is a missing file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::File { source, .. } | Self::Io { source } => {
                source.kind() == io::ErrorKind::NotFound
            }
            Self::UnexpectedEof { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_names_op_and_path() {
        let source = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err = IoError::file("open", "/tmp/strata/42.block", source);
        let text = err.to_string();
        assert!(text.contains("open"));
        assert!(text.contains("42.block"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_eof_carries_offset() {
        let err = IoError::eof_read(8, 0, 262_144);
        assert_eq!(
            err.to_string(),
            "read of 8 bytes at offset 262144 ended after 0"
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_bare_io_error_conversion() {
        let err: IoError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, IoError::Io { .. }));
        assert!(!err.is_not_found());
    }
}
