//! Quota-enforcing partition over two heap tiers.
//!
//! A [`Partition`] is the unit of memory accounting. Raw address
//! ranges enter through its [`SegmentSource`] and only through
//! [`Partition::sysalloc`], which enforces the quota ceiling.
//! Allocation routes to a per-thread local heap first and falls back
//! to a shared global heap guarded by the partition's mutex. Release
//! and resize route to whichever heap owns the address, including
//! local heaps belonging to other threads.
//!
//! Each local heap sits behind its own mutex, held briefly and almost
//! always uncontended since only foreign releases touch another
//! thread's heap. The fast-path handle lives in a thread-local
//! registry keyed by partition id; ids are never reused, so a
//! partition that outlives a thread (or the reverse) cannot alias
//! another partition's heaps.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::align::{AlignClass, NATIVE_ALIGNMENT, round_up};
use crate::heap::{Heap, HeapStats, RawSegment};
use crate::status::{HeapError, HeapResult};

/// The only way raw memory enters the system.
pub trait SegmentSource {
    /// Acquires a fresh address range of at least `len` bytes, or
    /// `None` when the source is exhausted.
    fn acquire(&self, len: usize) -> Option<RawSegment>;
}

/// Construction parameters for a [`Partition`].
#[derive(Debug, Clone, Copy)]
pub struct PartitionSpec {
    /// Total bytes the partition may draw from its source, its own
    /// bookkeeping overhead included.
    pub memory_limit: usize,
    /// Growth granularity for heap segments.
    pub min_segment_size: usize,
}

impl Default for PartitionSpec {
    fn default() -> Self {
        PartitionSpec {
            memory_limit: usize::MAX / 2,
            min_segment_size: 64 * 1024,
        }
    }
}

/// Bookkeeping bytes charged against the quota at construction.
pub const PARTITION_OVERHEAD: usize = std::mem::size_of::<PartitionState>();

struct PartitionState {
    ceiling: usize,
    dying: bool,
    global: Option<Heap>,
}

type LocalHeap = Arc<Mutex<Heap>>;

/// Point-in-time partition snapshot. `local` covers the calling
/// thread's heap; `locals` covers every thread's.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionStats {
    pub id: u64,
    pub ceiling: usize,
    pub dying: bool,
    pub local: Option<HeapStats>,
    pub locals: Vec<HeapStats>,
    pub global: Option<HeapStats>,
}

static NEXT_PARTITION_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LOCAL_HEAPS: RefCell<HashMap<u64, LocalHeap>> = RefCell::new(HashMap::new());
}

/// Quota-enforcing allocator facade with local and global heap tiers.
pub struct Partition<S: SegmentSource> {
    id: u64,
    source: S,
    spec: PartitionSpec,
    track_leaks: AtomicBool,
    state: Mutex<PartitionState>,
    /// Every thread's local heap, for foreign-address routing. Entries
    /// are never removed; heaps are process-lifetime.
    locals: Mutex<Vec<LocalHeap>>,
}

impl<S: SegmentSource> Partition<S> {
    /// Creates a partition. No heap exists until the first allocation.
    ///
    /// The quota ceiling starts at `memory_limit` minus
    /// [`PARTITION_OVERHEAD`].
    pub fn new(source: S, spec: PartitionSpec) -> Self {
        Partition {
            id: NEXT_PARTITION_ID.fetch_add(1, Ordering::Relaxed),
            source,
            spec,
            track_leaks: AtomicBool::new(true),
            state: Mutex::new(PartitionState {
                ceiling: spec.memory_limit.saturating_sub(PARTITION_OVERHEAD),
                dying: false,
                global: None,
            }),
            locals: Mutex::new(Vec::new()),
        }
    }

    /// Stable identifier, unique for the process lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Draws a segment from the source against the quota.
    ///
    /// Succeeds iff the partition is not dying and `required` is
    /// strictly below the remaining ceiling; on success the ceiling
    /// drops by exactly `required`.
    pub fn sysalloc(&self, required: usize) -> Option<RawSegment> {
        let mut state = self.state.lock();
        self.sysalloc_locked(&mut state, required)
    }

    fn sysalloc_locked(&self, state: &mut PartitionState, required: usize) -> Option<RawSegment> {
        if state.dying || required >= state.ceiling {
            return None;
        }
        let segment = self.source.acquire(required)?;
        state.ceiling -= required;
        Some(segment)
    }

    /// Allocates `size` bytes at native alignment.
    pub fn allocate(&self, size: usize) -> HeapResult<usize> {
        self.allocate_class(size, AlignClass::Native)
    }

    /// Allocates with a raw byte alignment. Alignments outside the
    /// supported class table fail with `Failed` before touching any
    /// heap.
    pub fn allocate_aligned(&self, size: usize, alignment: usize) -> HeapResult<usize> {
        let class = AlignClass::from_alignment(alignment).ok_or(HeapError::Failed)?;
        self.allocate_class(size, class)
    }

    /// Allocates at an alignment class: local tier first, then the
    /// global heap, creating either on demand.
    ///
    /// Only `Failed` from the local tier triggers the global fallback;
    /// every other status propagates to the caller unchanged.
    pub fn allocate_class(&self, size: usize, align: AlignClass) -> HeapResult<usize> {
        match self.allocate_local(size, align) {
            Err(HeapError::Failed) => self.allocate_global(size, align),
            result => result,
        }
    }

    /// The calling thread's local heap, if it exists. `None` during
    /// thread storage teardown, when the registry scan takes over.
    fn local_heap(&self) -> Option<LocalHeap> {
        LOCAL_HEAPS
            .try_with(|heaps| heaps.borrow().get(&self.id).cloned())
            .ok()
            .flatten()
    }

    fn allocate_local(&self, size: usize, align: AlignClass) -> HeapResult<usize> {
        let local = match self.local_heap() {
            Some(local) => local,
            None => self.create_local_heap(size, align)?,
        };
        let mut heap = local.lock();
        heap.allocate(size, align)
    }

    fn create_local_heap(&self, size: usize, align: AlignClass) -> HeapResult<LocalHeap> {
        let request = self.segment_request(self.block_need(size, align));
        let created = LOCAL_HEAPS.try_with(|heaps| -> HeapResult<LocalHeap> {
            let Some(segment) = self.sysalloc(request) else {
                return Err(HeapError::Failed);
            };
            let mut heap = Heap::new(segment)?;
            if !self.track_leaks.load(Ordering::Relaxed) {
                heap.suppress_leak_detection();
            }
            let local = Arc::new(Mutex::new(heap));
            heaps.borrow_mut().insert(self.id, Arc::clone(&local));
            self.locals.lock().push(Arc::clone(&local));
            Ok(local)
        });
        // A thread tearing down its storage cannot host a new local
        // heap; the global tier serves it instead.
        created.unwrap_or(Err(HeapError::Failed))
    }

    fn allocate_global(&self, size: usize, align: AlignClass) -> HeapResult<usize> {
        let mut state = self.state.lock();
        if state.global.is_none() {
            let request = self.segment_request(self.block_need(size, align));
            let Some(segment) = self.sysalloc_locked(&mut state, request) else {
                return Err(HeapError::Failed);
            };
            let mut heap = Heap::new(segment)?;
            if !self.track_leaks.load(Ordering::Relaxed) {
                heap.suppress_leak_detection();
            }
            state.global = Some(heap);
        }
        match state.global.as_mut() {
            Some(heap) => heap.allocate(size, align),
            None => Err(HeapError::Failed),
        }
    }

    /// Releases a block through whichever heap owns it. An address
    /// owned by no tier reports `InvalidPointer`.
    pub fn release(&self, addr: usize) -> HeapResult<()> {
        if let Some(local) = self.local_heap() {
            let mut heap = local.lock();
            if heap.owns(addr) {
                return heap.release(addr);
            }
        }
        {
            let mut state = self.state.lock();
            if let Some(heap) = state.global.as_mut()
                && heap.owns(addr)
            {
                let result = heap.release(addr);
                let emptied = heap.stats().live_blocks == 0;
                // Teardown deferred from kill() while blocks were
                // still live.
                if state.dying && emptied {
                    state.global = None;
                }
                return result;
            }
        }
        for entry in self.locals_snapshot() {
            let mut heap = entry.lock();
            if heap.owns(addr) {
                return heap.release(addr);
            }
        }
        Err(HeapError::InvalidPointer)
    }

    /// Resizes a block in its owning heap, falling back to a
    /// cross-tier move when the owning heap has no room.
    ///
    /// When the block moves within its heap, `copy(from, to, len)`
    /// runs before this call returns, while that heap's lock is still
    /// held, so the vacated span cannot be recycled under the copy.
    /// On the cross-tier path the copy runs while the old block is
    /// still live, then the old block is released.
    pub fn resize(
        &self,
        addr: usize,
        new_size: usize,
        copy: impl FnOnce(usize, usize, usize),
    ) -> HeapResult<usize> {
        self.resize_class(addr, new_size, AlignClass::Native, copy)
    }

    /// [`resize`](Self::resize) at an explicit alignment class, kept
    /// when the block moves.
    pub fn resize_class(
        &self,
        addr: usize,
        new_size: usize,
        align: AlignClass,
        copy: impl FnOnce(usize, usize, usize),
    ) -> HeapResult<usize> {
        if let Some(local) = self.local_heap() {
            let mut heap = local.lock();
            if heap.owns(addr) {
                match heap.resize(addr, new_size, align) {
                    Ok(resized) => {
                        if let Some((from, len)) = resized.moved_from {
                            copy(from, resized.addr, len);
                        }
                        return Ok(resized.addr);
                    }
                    Err(HeapError::Failed) => {
                        drop(heap);
                        return self.relocate(addr, new_size, align, copy);
                    }
                    Err(status) => return Err(status),
                }
            }
        }
        let global_full = {
            let mut state = self.state.lock();
            match state.global.as_mut() {
                Some(heap) if heap.owns(addr) => {
                    match heap.resize(addr, new_size, align) {
                        Ok(resized) => {
                            if let Some((from, len)) = resized.moved_from {
                                copy(from, resized.addr, len);
                            }
                            return Ok(resized.addr);
                        }
                        Err(HeapError::Failed) => true,
                        Err(status) => return Err(status),
                    }
                }
                _ => false,
            }
        };
        if global_full {
            return self.relocate(addr, new_size, align, copy);
        }
        for entry in self.locals_snapshot() {
            let mut heap = entry.lock();
            if !heap.owns(addr) {
                continue;
            }
            match heap.resize(addr, new_size, align) {
                Ok(resized) => {
                    if let Some((from, len)) = resized.moved_from {
                        copy(from, resized.addr, len);
                    }
                    return Ok(resized.addr);
                }
                Err(HeapError::Failed) => {
                    drop(heap);
                    return self.relocate(addr, new_size, align, copy);
                }
                Err(status) => return Err(status),
            }
        }
        Err(HeapError::InvalidPointer)
    }

    /// Moves a block to a fresh allocation in any tier: copy while the
    /// old block is still live, then release it. The old block is
    /// untouched when the fresh allocation fails.
    fn relocate(
        &self,
        addr: usize,
        new_size: usize,
        align: AlignClass,
        copy: impl FnOnce(usize, usize, usize),
    ) -> HeapResult<usize> {
        let old_usable = self.usable_size(addr).ok_or(HeapError::Failed)?;
        let moved = self.allocate_class(new_size, align)?;
        copy(addr, moved, old_usable.min(new_size));
        self.release(addr)?;
        Ok(moved)
    }

    /// Grows the global heap by one segment, creating the heap when
    /// absent. Returns whether the heap grew.
    pub fn extend_global(&self, required: usize) -> bool {
        let mut state = self.state.lock();
        let request = self.segment_request(required);
        let Some(segment) = self.sysalloc_locked(&mut state, request) else {
            return false;
        };
        match state.global.as_mut() {
            Some(heap) => heap.add_segment(segment).is_ok(),
            None => match Heap::new(segment) {
                Ok(mut heap) => {
                    if !self.track_leaks.load(Ordering::Relaxed) {
                        heap.suppress_leak_detection();
                    }
                    state.global = Some(heap);
                    true
                }
                Err(_) => false,
            },
        }
    }

    /// Marks the partition dying. Every later `sysalloc` fails
    /// permanently. The global heap is torn down immediately when it
    /// has no live blocks, otherwise on the release of its last one.
    pub fn kill(&self) {
        let mut state = self.state.lock();
        state.dying = true;
        if let Some(heap) = &state.global
            && heap.stats().live_blocks == 0
        {
            state.global = None;
        }
    }

    /// Whether any tier owns `addr`.
    #[must_use]
    pub fn owns(&self, addr: usize) -> bool {
        {
            let state = self.state.lock();
            if state.global.as_ref().is_some_and(|heap| heap.owns(addr)) {
                return true;
            }
        }
        self.locals_snapshot()
            .iter()
            .any(|entry| entry.lock().owns(addr))
    }

    /// Usable bytes behind a live user address, from any tier.
    #[must_use]
    pub fn usable_size(&self, addr: usize) -> Option<usize> {
        {
            let state = self.state.lock();
            if let Some(heap) = state.global.as_ref()
                && let Some(size) = heap.usable_size(addr)
            {
                return Some(size);
            }
        }
        self.locals_snapshot()
            .iter()
            .find_map(|entry| entry.lock().usable_size(addr))
    }

    /// Stops leak-tracking new blocks in every tier, current heaps and
    /// heaps created later alike.
    pub fn suppress_leak_detection(&self) {
        self.track_leaks.store(false, Ordering::Relaxed);
        for entry in self.locals_snapshot() {
            entry.lock().suppress_leak_detection();
        }
        if let Some(heap) = self.state.lock().global.as_mut() {
            heap.suppress_leak_detection();
        }
    }

    /// Resumes leak-tracking new blocks in every tier.
    pub fn restore_leak_detection(&self) {
        self.track_leaks.store(true, Ordering::Relaxed);
        for entry in self.locals_snapshot() {
            entry.lock().restore_leak_detection();
        }
        if let Some(heap) = self.state.lock().global.as_mut() {
            heap.restore_leak_detection();
        }
    }

    /// Snapshot of quota and every tier. `local` is the calling
    /// thread's heap.
    #[must_use]
    pub fn stats(&self) -> PartitionStats {
        let local = self.local_heap().map(|entry| entry.lock().stats());
        let locals = self
            .locals_snapshot()
            .iter()
            .map(|entry| entry.lock().stats())
            .collect();
        let state = self.state.lock();
        PartitionStats {
            id: self.id,
            ceiling: state.ceiling,
            dying: state.dying,
            local,
            locals,
            global: state.global.as_ref().map(Heap::stats),
        }
    }

    /// Dumps quota usage and every heap tier.
    pub fn show(&self, out: &mut dyn fmt::Write, verbose: bool) -> fmt::Result {
        let locals = self.locals_snapshot();
        let state = self.state.lock();
        writeln!(
            out,
            "PARTITION {}: {} bytes of quota remaining{}",
            self.id,
            state.ceiling,
            if state.dying { " (dying)" } else { "" },
        )?;
        writeln!(out, "{}", ".".repeat(60))?;
        if locals.is_empty() {
            writeln!(out, "LOCAL  (no heap)")?;
        }
        for entry in locals {
            write!(out, "LOCAL  ")?;
            entry.lock().show(out, verbose)?;
        }
        match &state.global {
            Some(heap) => {
                write!(out, "GLOBAL ")?;
                heap.show(out, verbose)
            }
            None => writeln!(out, "GLOBAL (no heap)"),
        }
    }

    fn locals_snapshot(&self) -> Vec<LocalHeap> {
        self.locals.lock().clone()
    }

    // Growth sizing: twice the larger of the request and half the
    // segment granularity, so small requests get a full granule and
    // big ones get doubling headroom.
    fn segment_request(&self, needed: usize) -> usize {
        needed.max(self.spec.min_segment_size / 2).saturating_mul(2)
    }

    fn block_need(&self, size: usize, align: AlignClass) -> usize {
        let alignment = align.alignment();
        let slack = if alignment > NATIVE_ALIGNMENT { alignment } else { 0 };
        round_up(size.max(1), NATIVE_ALIGNMENT).saturating_add(slack)
    }
}
