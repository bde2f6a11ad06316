//! Process heap over an sbrk segment source.
//!
//! [`SysHeap`] is an explicit handle, not a hidden singleton: tests
//! build independent instances, and the shim routes through the one
//! lazy process-wide instance behind [`global`].

use std::sync::OnceLock;

use segheap_core::{
    AlignClass, HeapError, HeapResult, Partition, PartitionSpec, RawSegment, SegmentSource,
};

/// Default growth granularity for the process heap.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Segment source moving the program break.
pub struct SbrkSource;

impl SegmentSource for SbrkSource {
    fn acquire(&self, len: usize) -> Option<RawSegment> {
        let len = len.max(std::mem::size_of::<usize>());
        // SAFETY: sbrk extends the data segment; failure comes back
        // as (void *)-1 and is mapped to None.
        let addr = unsafe { libc::sbrk(len as libc::intptr_t) };
        if addr as isize == -1 {
            return None;
        }
        Some(RawSegment {
            base: addr as usize,
            size: len,
        })
    }
}

/// Performs the byte copy for moved blocks. Both spans are live,
/// disjoint blocks owned by this allocator when the partition invokes
/// the callback.
fn copy_bytes(from: usize, to: usize, len: usize) {
    // SAFETY: see above; the partition guarantees both spans are valid
    // for `len` bytes and do not overlap.
    unsafe { std::ptr::copy_nonoverlapping(from as *const u8, to as *mut u8, len) }
}

/// Handle over the sbrk-backed partition with the shim's
/// grow-and-retry-once policy.
pub struct SysHeap {
    partition: Partition<SbrkSource>,
}

impl SysHeap {
    /// Builds an independent sbrk-backed heap.
    #[must_use]
    pub fn new(spec: PartitionSpec) -> Self {
        SysHeap {
            partition: Partition::new(SbrkSource, spec),
        }
    }

    /// Effectively unbounded quota with the default chunk size; what
    /// the process-wide instance uses.
    #[must_use]
    pub fn with_defaults() -> Self {
        SysHeap::new(PartitionSpec {
            memory_limit: usize::MAX / 2,
            min_segment_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// The underlying partition.
    #[must_use]
    pub fn partition(&self) -> &Partition<SbrkSource> {
        &self.partition
    }

    /// On `Failed`, grow the global heap once and retry exactly once;
    /// a second failure is final.
    fn with_grow_retry<T>(
        &self,
        required: usize,
        op: impl Fn(&Partition<SbrkSource>) -> HeapResult<T>,
    ) -> HeapResult<T> {
        match op(&self.partition) {
            Err(HeapError::Failed) => {
                if !self.partition.extend_global(required) {
                    return Err(HeapError::Failed);
                }
                op(&self.partition)
            }
            other => other,
        }
    }

    /// Allocates `size` bytes at native alignment.
    pub fn allocate(&self, size: usize) -> HeapResult<usize> {
        self.with_grow_retry(size, |p| p.allocate(size))
    }

    /// Allocates with a raw byte alignment. An alignment outside the
    /// supported class table fails with `Failed` without growing
    /// anything.
    pub fn allocate_aligned(&self, size: usize, alignment: usize) -> HeapResult<usize> {
        let class = AlignClass::from_alignment(alignment).ok_or(HeapError::Failed)?;
        let required = size.saturating_add(class.alignment());
        self.with_grow_retry(required, |p| p.allocate_class(size, class))
    }

    /// Releases a block.
    pub fn release(&self, addr: usize) -> HeapResult<()> {
        self.partition.release(addr)
    }

    /// Resizes a block, copying its bytes when it moves.
    pub fn resize(&self, addr: usize, new_size: usize) -> HeapResult<usize> {
        self.with_grow_retry(new_size, |p| p.resize(addr, new_size, copy_bytes))
    }

    /// Usable bytes behind a live address.
    #[must_use]
    pub fn usable_size(&self, addr: usize) -> Option<usize> {
        self.partition.usable_size(addr)
    }

    /// Whether any of the heap's segments contain `addr`.
    #[must_use]
    pub fn owns(&self, addr: usize) -> bool {
        self.partition.owns(addr)
    }
}

static GLOBAL: OnceLock<SysHeap> = OnceLock::new();

/// The lazy process-wide heap the shim entry points use.
pub fn global() -> &'static SysHeap {
    GLOBAL.get_or_init(SysHeap::with_defaults)
}

/// Stops leak-tracking allocations made from now on; brackets
/// bootstrap allocations that live for the process lifetime.
pub fn suppress_leak_detection() {
    global().partition().suppress_leak_detection();
}

/// Resumes leak-tracking new allocations.
pub fn restore_leak_detection() {
    global().partition().restore_leak_detection();
}
