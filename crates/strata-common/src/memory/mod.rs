//! Memory utilities for the storage layer.
//!
//! Block and transient buffers are allocated through [`AlignedBuffer`],
//! which fixes both the size and the alignment of the allocation so the
//! bytes can go straight to positional file I/O.

mod aligned;

pub use aligned::{AlignedBuffer, IO_ALIGNMENT};
