//! Block identifier type.
//!
//! A type-safe wrapper around the numeric block id, preventing accidental
//! mixing with other integer quantities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MAXIMUM_BLOCK;

/// Block identifier - uniquely identifies a block managed by the buffer
/// manager.
///
/// Ids below [`MAXIMUM_BLOCK`] name *persistent* blocks backed by the
/// block I/O layer; ids at or above it name *transient* buffers allocated
/// in-process.
///
/// # Example
///
/// ```rust
/// use strata_common::types::BlockId;
///
/// let block = BlockId::new(42);
/// assert_eq!(block.as_u64(), 42);
/// assert!(block.is_persistent());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(u64);

impl BlockId {
    /// Invalid block ID constant, used as a sentinel value.
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates a new `BlockId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true if this id names a persistent block backed by the
    /// block I/O layer.
    #[inline]
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        self.0 < MAXIMUM_BLOCK
    }

    /// Returns true if this id names a transient in-memory buffer.
    #[inline]
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= MAXIMUM_BLOCK
    }

    /// Checks if this is a valid block ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "BlockId(INVALID)")
        } else {
            write!(f, "BlockId({})", self.0)
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<BlockId> for u64 {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0
    }
}
