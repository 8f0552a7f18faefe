//! Lock-free eviction queue.
//!
//! Every time a handle's pin count drops to zero it is offered to the
//! queue as an *eviction candidate*: a weak reference paired with the
//! handle's eviction epoch at enqueue time. Candidates are never removed
//! eagerly; a candidate that no longer matches the handle's current
//! epoch, or whose handle died or became un-unloadable, is simply
//! discarded when an evictor dequeues it.
//!
//! Rapid pin/unpin cycles therefore grow the queue with stale entries.
//! That is accepted: filtering happens at dequeue, and correctness never
//! depends on queue size or strict FIFO order.

use std::sync::{Arc, Weak};

use crossbeam_queue::SegQueue;

use super::handle::BlockHandle;

/// An eviction candidate: a weak handle reference plus the epoch it was
/// enqueued at.
pub(crate) struct EvictionNode {
    handle: Weak<BlockHandle>,
    timestamp: u64,
}

impl EvictionNode {
    pub(crate) fn new(handle: Weak<BlockHandle>, timestamp: u64) -> Self {
        Self { handle, timestamp }
    }

    /// Attempts to upgrade the weak reference.
    pub(crate) fn upgrade(&self) -> Option<Arc<BlockHandle>> {
        self.handle.upgrade()
    }

    /// Returns true if this candidate still refers to the handle's most
    /// recent release and the handle is unloadable.
    ///
    /// An epoch mismatch means the handle was re-pinned and re-released
    /// after this candidate was produced; a fresher candidate supersedes
    /// this one.
    pub(crate) fn can_unload(&self, handle: &BlockHandle) -> bool {
        self.timestamp == handle.eviction_timestamp() && handle.can_unload()
    }
}

/// Unbounded multi-producer multi-consumer queue of eviction candidates.
pub(crate) struct EvictionQueue {
    queue: SegQueue<EvictionNode>,
}

impl EvictionQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    /// Enqueues an eviction candidate.
    pub(crate) fn push(&self, node: EvictionNode) {
        self.queue.push(node);
    }

    /// Dequeues the oldest candidate, if any.
    pub(crate) fn pop(&self) -> Option<EvictionNode> {
        self.queue.pop()
    }

    /// Returns the number of queued candidates, stale entries included.
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for EvictionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionQueue")
            .field("len", &self.len())
            .finish()
    }
}
