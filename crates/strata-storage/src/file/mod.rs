//! Synchronous file I/O layer for StrataDB.
//!
//! This module provides the filesystem abstraction consumed by the block
//! layer and the buffer manager's spill path:
//!
//! - **Positional I/O**: pread/pwrite-style operations, safe to share
//!   across threads
//! - **Blocking semantics**: every operation runs to completion on the
//!   caller's thread
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_storage::file::{FileManager, FileHandle, OpenOptions};
//!
//! fn example() -> strata_storage::file::IoResult<()> {
//!     let manager = FileManager::new();
//!
//!     let file = manager.open("data.db", OpenOptions::create())?;
//!
//!     // Write data at offset 0
//!     let data = vec![0u8; 8192];
//!     file.write_all_at(&data, 0)?;
//!
//!     // Sync to disk
//!     file.sync()?;
//!
//!     Ok(())
//! }
//! ```

mod error;
mod handle;
mod options;
mod std_io;

pub use error::{IoError, IoResult};
pub use handle::{FileHandle, FileManager};
pub use options::OpenOptions;
pub use std_io::StandardFile;
