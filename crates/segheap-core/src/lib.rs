//! # segheap-core
//!
//! Core of a segmented heap allocator for bounded memory domains:
//!
//! - [`splay`]: a generic self-adjusting ordered index, used for the
//!   heap's free-block bookkeeping and reusable for any key-bearing
//!   owner type.
//! - [`align`]: the closed set of supported alignment classes.
//! - [`heap`]: a multi-segment heap with first-fit allocation,
//!   split/coalesce, and a corruption/double-free/invalid-pointer
//!   status taxonomy.
//! - [`partition`]: a quota-enforcing wrapper routing allocation
//!   between a per-thread local heap and a shared global heap.
//! - [`arena`]: a static-arena segment source for tests and workload
//!   runs.
//!
//! All bookkeeping is out-of-band: the heap manages address ranges and
//! never dereferences them, so this crate is safe Rust. The ABI layer
//! that owns real memory lives in `segheap-abi`.

#![deny(unsafe_code)]

pub mod align;
pub mod arena;
pub mod heap;
pub mod partition;
pub mod splay;
pub mod status;

pub use align::{AlignClass, NATIVE_ALIGNMENT};
pub use arena::ArenaSource;
pub use heap::{Heap, HeapStats, RawSegment, Resized};
pub use partition::{
    PARTITION_OVERHEAD, Partition, PartitionSpec, PartitionStats, SegmentSource,
};
pub use splay::{Keyed, SplayTree};
pub use status::{HeapError, HeapResult};
