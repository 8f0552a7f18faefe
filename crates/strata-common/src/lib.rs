//! # strata-common
//!
//! Common types and utilities for StrataDB.
//!
//! This crate provides the foundational pieces shared across StrataDB
//! components:
//!
//! - **Types**: Core identifiers (`BlockId`)
//! - **Constants**: Block geometry and memory limits
//! - **Memory**: Aligned buffer allocation for block and transient data
//!
//! ## Example
//!
//! ```rust
//! use strata_common::types::BlockId;
//! use strata_common::constants::MAXIMUM_BLOCK;
//!
//! let block = BlockId::new(42);
//! assert!(block.is_persistent());
//!
//! let temp = BlockId::new(MAXIMUM_BLOCK);
//! assert!(temp.is_transient());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod memory;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use memory::AlignedBuffer;
pub use types::BlockId;
