//! System-wide constants for StrataDB.
//!
//! This module defines the block geometry and memory limits used across
//! the storage layer.

// =============================================================================
// Block Geometry
// =============================================================================

/// Size of a database block in bytes (256 KB).
///
/// Analytical workloads favor large blocks: fewer seeks, better
/// compression ratios, and sequential scan throughput.
pub const BLOCK_SIZE: usize = 256 * 1024;

/// Per-buffer bookkeeping overhead charged against the memory budget.
pub const BLOCK_HEADER_SIZE: usize = 8;

/// Memory charged for one resident database block.
pub const BLOCK_ALLOC_SIZE: usize = BLOCK_SIZE + BLOCK_HEADER_SIZE;

// =============================================================================
// Block Identifier Space
// =============================================================================

/// First block id reserved for transient in-memory buffers.
///
/// Ids below this value name persistent blocks managed by the block I/O
/// layer; ids at or above it are handed out by the buffer manager's
/// monotonic counter and never touch the data file.
pub const MAXIMUM_BLOCK: u64 = 1 << 62;

// =============================================================================
// Memory Budget
// =============================================================================

/// Default buffer manager memory limit (1 GB).
pub const DEFAULT_MAXIMUM_MEMORY: u64 = 1024 * 1024 * 1024;

/// Smallest sensible memory limit: room for a handful of blocks.
pub const MIN_MAXIMUM_MEMORY: u64 = 4 * BLOCK_ALLOC_SIZE as u64;

// =============================================================================
// Spill Files
// =============================================================================

/// File extension for spilled transient buffers.
pub const SPILL_FILE_SUFFIX: &str = ".block";

/// Size of the length prefix at the start of every spill file.
pub const SPILL_HEADER_SIZE: usize = 8;
