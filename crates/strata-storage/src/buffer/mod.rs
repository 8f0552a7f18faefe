//! Buffer Manager for StrataDB.
//!
//! The buffer manager mediates between fixed-size on-disk blocks (and
//! variable-size transient buffers) and a bounded in-memory working set:
//!
//! - **Shared handles**: one [`BlockHandle`] per block, jointly owned by
//!   all pins and references; destroyed and unregistered the moment the
//!   last owner drops
//! - **Pin/Unpin**: reference counting that keeps a buffer resident
//! - **Memory budget**: a hard byte limit enforced by eviction
//! - **Lock-free eviction queue**: candidates produced on the last
//!   unpin, staleness-filtered at dequeue via per-handle epochs
//! - **Spill-to-disk**: non-destroyable transient buffers are written to
//!   a temporary directory when memory pressure forces them out
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        BufferManager                          │
//! │  ┌─────────────────────────┐  ┌──────────────────────────┐   │
//! │  │        registry         │  │      eviction queue       │   │
//! │  │ BlockId → Weak<Handle>  │  │ (Weak<Handle>, epoch) ... │   │
//! │  └─────────────────────────┘  └──────────────────────────┘   │
//! │               │                           ▲                   │
//! │               ▼                           │ readers → 0       │
//! │  ┌─────────────────────────────────────────────────────────┐ │
//! │  │                  Arc<BlockHandle>                        │ │
//! │  │  state · readers · memory_usage · epoch · buffer        │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! │       │ load                │ unload                          │
//! │       ▼                     ▼                                 │
//! │  ┌──────────────┐      ┌──────────────────────┐               │
//! │  │ BlockManager │      │  spill: <id>.block   │               │
//! │  │  (data file) │      │  (temp directory)    │               │
//! │  └──────────────┘      └──────────────────────┘               │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_storage::block::BlockManager;
//! use strata_storage::buffer::{BufferConfig, BufferManager};
//! use strata_storage::file::FileManager;
//!
//! fn example() -> strata_storage::buffer::BufferResult<()> {
//!     let blocks = BlockManager::open(&FileManager::new(), "data.db")?;
//!     let config = BufferConfig::new(256 * 1024 * 1024)
//!         .with_temp_directory("/tmp/strata_spill");
//!     let manager = BufferManager::new(blocks, config)?;
//!
//!     // Allocate a transient buffer; the pin grants direct byte access
//!     let mut pin = manager.allocate(1024 * 1024)?;
//!     pin.as_mut_slice()[0] = 42;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod handle;
mod manager;
mod pin;
mod queue;
mod temp;

pub use config::BufferConfig;
pub use error::{BufferError, BufferResult};
pub use handle::{BlockHandle, BlockState};
pub use manager::BufferManager;
pub use pin::BufferPin;

/// Statistics for buffer manager monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferStats {
    /// Bytes currently charged against the budget.
    pub current_memory: u64,
    /// The memory budget.
    pub maximum_memory: u64,
    /// Number of buffers evicted.
    pub evictions: u64,
    /// Number of transient buffers spilled to disk.
    pub spill_writes: u64,
    /// Number of spilled buffers read back.
    pub spill_reads: u64,
    /// Queued eviction candidates, stale entries included.
    pub eviction_queue_len: usize,
}

impl BufferStats {
    /// Returns the fraction of the budget currently in use (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.maximum_memory == 0 {
            0.0
        } else {
            self.current_memory as f64 / self.maximum_memory as f64
        }
    }
}
