//! Multi-segment heap.
//!
//! A [`Heap`] manages one or more disjoint address segments. All
//! bookkeeping is out-of-band: free spans live in a [`SplayTree`] keyed
//! by address, live blocks in a hash map keyed by the user address, and
//! no address is ever dereferenced here. Layers that own real memory
//! (the ABI shim) perform the byte copies this module reports.
//!
//! Free blocks are coalesced eagerly on release with their
//! address-adjacent neighbors, never across segment boundaries. The
//! accounting invariant `live_bytes + free_bytes == total segment
//! bytes` holds after every operation.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::align::{AlignClass, NATIVE_ALIGNMENT, round_up};
use crate::splay::{Keyed, SplayTree};
use crate::status::{HeapError, HeapResult};

/// Smallest free span worth indexing. Remainders below this are
/// absorbed into the adjacent allocation.
const MIN_FRAGMENT: usize = 2 * NATIVE_ALIGNMENT;

/// Mixed into every block seal.
const BLOCK_SEAL: usize = 0x5EA1_B10C;

/// Retained freed-address history for double-free discrimination.
const RECENT_FREES_CAP: usize = 256;

fn seal_for(user: usize, base: usize, total: usize) -> usize {
    user ^ base.rotate_left(16) ^ total.rotate_left(32) ^ BLOCK_SEAL
}

/// A raw address range handed to a heap by a segment source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSegment {
    pub base: usize,
    pub size: usize,
}

impl RawSegment {
    /// One past the last address of the segment.
    #[must_use]
    pub fn end(&self) -> usize {
        self.base + self.size
    }

    /// Whether `addr` falls inside the segment.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.end()
    }

    fn overlaps(&self, other: &RawSegment) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    base: usize,
    size: usize,
    segment: usize,
}

impl Keyed for FreeBlock {
    type Key = usize;

    fn key(&self) -> usize {
        self.base
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveBlock {
    /// Start of the consumed span; `<=` the user address when
    /// alignment padding was absorbed.
    base: usize,
    /// Consumed bytes, padding and absorbed remainders included.
    total: usize,
    /// Size the caller asked for.
    user_size: usize,
    segment: usize,
    /// Snapshot of the leak-tracking toggle at allocation time.
    tracked: bool,
    seal: usize,
}

/// Outcome of [`Heap::resize`].
///
/// `moved_from` is `Some((old_addr, copy_len))` when the block had to
/// move; the byte copy is the caller's job and must happen before any
/// further mutation of the heap under the same lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resized {
    pub addr: usize,
    pub moved_from: Option<(usize, usize)>,
}

/// Point-in-time accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub segments: usize,
    pub total_bytes: usize,
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub tracked_blocks: usize,
    pub tracked_bytes: usize,
}

/// Multi-segment heap with first-fit allocation and eager coalescing.
pub struct Heap {
    segments: Vec<RawSegment>,
    free: SplayTree<FreeBlock>,
    live: HashMap<usize, LiveBlock>,
    recently_freed: HashSet<usize>,
    live_bytes: usize,
    free_bytes: usize,
    track_new: bool,
}

impl Heap {
    /// Creates a heap over a single segment. The whole segment starts
    /// as one free block.
    pub fn new(segment: RawSegment) -> HeapResult<Self> {
        let mut heap = Heap {
            segments: Vec::new(),
            free: SplayTree::new(),
            live: HashMap::new(),
            recently_freed: HashSet::new(),
            live_bytes: 0,
            free_bytes: 0,
            track_new: true,
        };
        heap.add_segment(segment)?;
        Ok(heap)
    }

    /// Adds a non-contiguous segment. Existing allocations are
    /// unaffected; blocks never coalesce across segments.
    ///
    /// The segment is trimmed to native-word boundaries. A zero-length
    /// or overlapping segment is rejected with `Failed`.
    pub fn add_segment(&mut self, segment: RawSegment) -> HeapResult<()> {
        let base = round_up(segment.base, NATIVE_ALIGNMENT);
        let end = segment.end() & !(NATIVE_ALIGNMENT - 1);
        if end <= base {
            return Err(HeapError::Failed);
        }
        let segment = RawSegment {
            base,
            size: end - base,
        };
        if self.segments.iter().any(|s| s.overlaps(&segment)) {
            return Err(HeapError::Failed);
        }
        let index = self.segments.len();
        self.segments.push(segment);
        self.free
            .insert(FreeBlock {
                base: segment.base,
                size: segment.size,
                segment: index,
            })
            .map_err(|_| HeapError::Corrupted)?;
        self.free_bytes += segment.size;
        Ok(())
    }

    /// Allocates `size` bytes at the given alignment class.
    ///
    /// First fit by ascending address. Returns the user address, or
    /// `Failed` when no free block can satisfy the request.
    pub fn allocate(&mut self, size: usize, align: AlignClass) -> HeapResult<usize> {
        let alignment = align.alignment();
        let need = round_up(size.max(1), NATIVE_ALIGNMENT);

        let mut choice = None;
        for block in self.free.iter() {
            let user = round_up(block.base, alignment);
            let pad = user - block.base;
            // Too-small padding is absorbed into the allocation rather
            // than left as an unusable fragment.
            let take_base = if pad >= MIN_FRAGMENT { user } else { block.base };
            let need_end = user + need;
            if need_end <= block.base + block.size {
                choice = Some((*block, user, take_base, need_end));
                break;
            }
        }
        let Some((block, user, take_base, need_end)) = choice else {
            return Err(HeapError::Failed);
        };
        if self.free.remove(&block.base).is_none() {
            return Err(HeapError::Corrupted);
        }

        if take_base > block.base {
            // The padding prefix goes back to the index. Its left
            // neighbor cannot be free, so no coalescing is needed.
            self.free
                .insert(FreeBlock {
                    base: block.base,
                    size: take_base - block.base,
                    segment: block.segment,
                })
                .map_err(|_| HeapError::Corrupted)?;
        }

        let block_end = block.base + block.size;
        let tail = block_end - need_end;
        let total_end = if tail >= MIN_FRAGMENT {
            self.free
                .insert(FreeBlock {
                    base: need_end,
                    size: tail,
                    segment: block.segment,
                })
                .map_err(|_| HeapError::Corrupted)?;
            need_end
        } else {
            block_end
        };

        let total = total_end - take_base;
        let live = LiveBlock {
            base: take_base,
            total,
            user_size: size,
            segment: block.segment,
            tracked: self.track_new,
            seal: seal_for(user, take_base, total),
        };
        if self.live.insert(user, live).is_some() {
            return Err(HeapError::Corrupted);
        }
        self.free_bytes -= total;
        self.live_bytes += total;
        self.recently_freed.remove(&user);
        Ok(user)
    }

    /// Releases a live block.
    ///
    /// The seal is checked first and a mismatch aborts with
    /// `Corrupted` before any bookkeeping mutation. An address that is
    /// not live reports `DoubleFree` when it was recently released and
    /// `InvalidPointer` otherwise.
    pub fn release(&mut self, user: usize) -> HeapResult<()> {
        let Some(&block) = self.live.get(&user) else {
            return Err(self.classify_unknown(user));
        };
        if block.seal != seal_for(user, block.base, block.total) {
            return Err(HeapError::Corrupted);
        }
        self.live.remove(&user);
        self.insert_coalesced(FreeBlock {
            base: block.base,
            size: block.total,
            segment: block.segment,
        })?;
        self.live_bytes -= block.total;
        self.free_bytes += block.total;
        self.note_freed(user);
        Ok(())
    }

    /// Resizes a live block, in place when possible.
    ///
    /// Shrinking returns the tail to the free index when it is big
    /// enough to stand alone. Growing first tries to absorb the
    /// address-adjacent free successor; otherwise the block moves and
    /// the result carries `moved_from` for the caller's byte copy. The
    /// original block is untouched when the fresh allocation fails.
    pub fn resize(&mut self, user: usize, new_size: usize, align: AlignClass) -> HeapResult<Resized> {
        let Some(&block) = self.live.get(&user) else {
            return Err(self.classify_unknown(user));
        };
        if block.seal != seal_for(user, block.base, block.total) {
            return Err(HeapError::Corrupted);
        }

        let pad = user - block.base;
        let new_total = pad + round_up(new_size.max(1), NATIVE_ALIGNMENT);

        if new_total <= block.total {
            let tail = block.total - new_total;
            if tail >= MIN_FRAGMENT {
                self.insert_coalesced(FreeBlock {
                    base: block.base + new_total,
                    size: tail,
                    segment: block.segment,
                })?;
                self.update_live(user, |b| {
                    b.total = new_total;
                    b.user_size = new_size;
                })?;
                self.live_bytes -= tail;
                self.free_bytes += tail;
            } else {
                self.update_live(user, |b| b.user_size = new_size)?;
            }
            return Ok(Resized {
                addr: user,
                moved_from: None,
            });
        }

        let end = block.base + block.total;
        let delta = new_total - block.total;
        let next = self.free.successor(&block.base).copied();
        if let Some(next) = next
            && next.segment == block.segment
            && next.base == end
            && next.size >= delta
        {
            if self.free.remove(&next.base).is_none() {
                return Err(HeapError::Corrupted);
            }
            let consumed = if next.size - delta >= MIN_FRAGMENT {
                self.free
                    .insert(FreeBlock {
                        base: next.base + delta,
                        size: next.size - delta,
                        segment: next.segment,
                    })
                    .map_err(|_| HeapError::Corrupted)?;
                delta
            } else {
                next.size
            };
            self.update_live(user, |b| {
                b.total += consumed;
                b.user_size = new_size;
            })?;
            self.live_bytes += consumed;
            self.free_bytes -= consumed;
            return Ok(Resized {
                addr: user,
                moved_from: None,
            });
        }

        let moved = self.allocate(new_size, align)?;
        let copy_len = block.user_size.min(new_size);
        self.release(user)?;
        Ok(Resized {
            addr: moved,
            moved_from: Some((user, copy_len)),
        })
    }

    /// Stops counting new blocks in the leak report. Blocks already
    /// live keep the tracking state they were allocated with.
    pub fn suppress_leak_detection(&mut self) {
        self.track_new = false;
    }

    /// Resumes counting new blocks in the leak report.
    pub fn restore_leak_detection(&mut self) {
        self.track_new = true;
    }

    /// Whether `addr` falls inside any of the heap's segments.
    #[must_use]
    pub fn owns(&self, addr: usize) -> bool {
        self.segments.iter().any(|s| s.contains(addr))
    }

    /// Usable bytes from `addr` to the end of its block, or `None`
    /// when `addr` is not a live user address.
    #[must_use]
    pub fn usable_size(&self, addr: usize) -> Option<usize> {
        self.live.get(&addr).map(|b| b.total - (addr - b.base))
    }

    /// Accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let (tracked_blocks, tracked_bytes) = self
            .live
            .values()
            .filter(|b| b.tracked)
            .fold((0, 0), |(n, bytes), b| (n + 1, bytes + b.total));
        HeapStats {
            segments: self.segments.len(),
            total_bytes: self.segments.iter().map(|s| s.size).sum(),
            live_blocks: self.live.len(),
            live_bytes: self.live_bytes,
            free_blocks: self.free.len(),
            free_bytes: self.free_bytes,
            tracked_blocks,
            tracked_bytes,
        }
    }

    /// Dumps utilization to `out`. Read-only; uses the non-splaying
    /// iterator so the tree shape is untouched.
    pub fn show(&self, out: &mut dyn fmt::Write, verbose: bool) -> fmt::Result {
        let stats = self.stats();
        writeln!(
            out,
            "{} segments, {} bytes: {} live in {} blocks, {} free in {} blocks",
            stats.segments,
            stats.total_bytes,
            stats.live_bytes,
            stats.live_blocks,
            stats.free_bytes,
            stats.free_blocks,
        )?;
        if !verbose {
            return Ok(());
        }
        for (index, segment) in self.segments.iter().enumerate() {
            writeln!(
                out,
                "  segment {index}: {:#x}..{:#x} ({} bytes)",
                segment.base,
                segment.end(),
                segment.size,
            )?;
        }
        for block in self.free.iter() {
            writeln!(out, "  free {:#x} {} bytes", block.base, block.size)?;
        }
        let mut live: Vec<(&usize, &LiveBlock)> = self.live.iter().collect();
        live.sort_by_key(|(addr, _)| **addr);
        for (addr, block) in live {
            writeln!(
                out,
                "  live {addr:#x} {} bytes{}",
                block.user_size,
                if block.tracked { "" } else { " (untracked)" },
            )?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_seal(&mut self, user: usize) {
        if let Some(block) = self.live.get_mut(&user) {
            block.seal ^= 1;
        }
    }

    fn classify_unknown(&self, user: usize) -> HeapError {
        if self.recently_freed.contains(&user) {
            HeapError::DoubleFree
        } else {
            HeapError::InvalidPointer
        }
    }

    fn note_freed(&mut self, user: usize) {
        if self.recently_freed.len() >= RECENT_FREES_CAP {
            self.recently_freed.clear();
        }
        self.recently_freed.insert(user);
    }

    fn update_live(&mut self, user: usize, apply: impl FnOnce(&mut LiveBlock)) -> HeapResult<()> {
        let Some(block) = self.live.get_mut(&user) else {
            return Err(HeapError::Corrupted);
        };
        apply(block);
        block.seal = seal_for(user, block.base, block.total);
        Ok(())
    }

    /// Inserts a span into the free index, merging with its
    /// address-adjacent neighbors in the same segment. All overlap
    /// checks run before any mutation.
    fn insert_coalesced(&mut self, mut block: FreeBlock) -> HeapResult<()> {
        let prev = self.free.predecessor(&block.base).copied();
        let next = self.free.successor(&block.base).copied();

        if let Some(p) = prev
            && p.base + p.size > block.base
        {
            return Err(HeapError::Corrupted);
        }
        if let Some(n) = next
            && block.base + block.size > n.base
        {
            return Err(HeapError::Corrupted);
        }

        if let Some(p) = prev
            && p.segment == block.segment
            && p.base + p.size == block.base
        {
            if self.free.remove(&p.base).is_none() {
                return Err(HeapError::Corrupted);
            }
            block.base = p.base;
            block.size += p.size;
        }
        if let Some(n) = next
            && n.segment == block.segment
            && block.base + block.size == n.base
        {
            if self.free.remove(&n.base).is_none() {
                return Err(HeapError::Corrupted);
            }
            block.size += n.size;
        }
        self.free.insert(block).map_err(|_| HeapError::Corrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignClass;

    fn heap_of(size: usize) -> Heap {
        Heap::new(RawSegment { base: 0x1000, size }).unwrap()
    }

    fn assert_conserved(heap: &Heap) {
        let stats = heap.stats();
        assert_eq!(
            stats.live_bytes + stats.free_bytes,
            stats.total_bytes,
            "conservation violated: {stats:?}"
        );
    }

    #[test]
    fn allocate_release_round_trip() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(100, AlignClass::Native).unwrap();
        assert!(heap.owns(a));
        assert!(heap.usable_size(a).unwrap() >= 100);
        assert_conserved(&heap);
        heap.release(a).unwrap();
        assert_conserved(&heap);
        let stats = heap.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.free_bytes, stats.total_bytes);
    }

    #[test]
    fn exhaustion_reports_failed() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(100, AlignClass::Native).unwrap();
        assert_eq!(heap.allocate(5000, AlignClass::Native), Err(HeapError::Failed));
        heap.release(a).unwrap();
        let mut dump = String::new();
        heap.show(&mut dump, true).unwrap();
        assert!(dump.contains("0 live in 0 blocks"), "{dump}");
        assert!(dump.contains("4096 free in 1 blocks"), "{dump}");
    }

    #[test]
    fn double_free_and_invalid_pointer() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(64, AlignClass::Native).unwrap();
        heap.release(a).unwrap();
        assert_eq!(heap.release(a), Err(HeapError::DoubleFree));
        assert_eq!(heap.release(0xdead_0000), Err(HeapError::InvalidPointer));
        assert_conserved(&heap);
    }

    #[test]
    fn seal_tamper_aborts_before_mutation() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(64, AlignClass::Native).unwrap();
        heap.corrupt_seal(a);
        let before = heap.stats();
        assert_eq!(heap.release(a), Err(HeapError::Corrupted));
        assert_eq!(heap.stats(), before);
        assert_eq!(heap.resize(a, 128, AlignClass::Native), Err(HeapError::Corrupted));
        assert_eq!(heap.stats(), before);
    }

    #[test]
    fn free_neighbors_coalesce() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(256, AlignClass::Native).unwrap();
        let b = heap.allocate(256, AlignClass::Native).unwrap();
        let c = heap.allocate(256, AlignClass::Native).unwrap();
        heap.release(b).unwrap();
        assert_conserved(&heap);
        heap.release(c).unwrap();
        assert_conserved(&heap);
        heap.release(a).unwrap();
        assert_conserved(&heap);
        let stats = heap.stats();
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.free_bytes, stats.total_bytes);
    }

    #[test]
    fn blocks_never_coalesce_across_segments() {
        let mut heap = heap_of(1024);
        heap.add_segment(RawSegment {
            base: 0x1000 + 1024,
            size: 1024,
        })
        .unwrap();
        // Both segments fully free and address-adjacent, yet distinct.
        assert_eq!(heap.stats().free_blocks, 2);
        let a = heap.allocate(900, AlignClass::Native).unwrap();
        let b = heap.allocate(900, AlignClass::Native).unwrap();
        heap.release(a).unwrap();
        heap.release(b).unwrap();
        assert_eq!(heap.stats().free_blocks, 2);
        assert_conserved(&heap);
    }

    #[test]
    fn overlapping_segment_rejected() {
        let mut heap = heap_of(4096);
        assert_eq!(
            heap.add_segment(RawSegment {
                base: 0x1800,
                size: 4096
            }),
            Err(HeapError::Failed)
        );
        assert_eq!(
            heap.add_segment(RawSegment { base: 0x9000, size: 0 }),
            Err(HeapError::Failed)
        );
        assert_eq!(heap.stats().segments, 1);
    }

    #[test]
    fn aligned_allocations_honor_the_class() {
        let mut heap = Heap::new(RawSegment {
            base: 1 << 28,
            size: 1 << 28,
        })
        .unwrap();
        for class in AlignClass::ALL {
            let addr = heap.allocate(64, class).unwrap();
            assert_eq!(addr % class.alignment(), 0, "{class:?}");
            assert_conserved(&heap);
            heap.release(addr).unwrap();
        }
        assert_eq!(heap.stats().free_bytes, heap.stats().total_bytes);
    }

    #[test]
    fn shrink_in_place_returns_tail() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(1024, AlignClass::Native).unwrap();
        let resized = heap.resize(a, 128, AlignClass::Native).unwrap();
        assert_eq!(resized.addr, a);
        assert_eq!(resized.moved_from, None);
        assert!(heap.usable_size(a).unwrap() < 1024);
        assert_conserved(&heap);
        heap.release(a).unwrap();
        assert_eq!(heap.stats().free_blocks, 1);
    }

    #[test]
    fn grow_in_place_absorbs_adjacent_free() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(256, AlignClass::Native).unwrap();
        let resized = heap.resize(a, 1024, AlignClass::Native).unwrap();
        assert_eq!(resized.addr, a);
        assert_eq!(resized.moved_from, None);
        assert!(heap.usable_size(a).unwrap() >= 1024);
        assert_conserved(&heap);
    }

    #[test]
    fn grow_moves_when_blocked() {
        let mut heap = heap_of(4096);
        let a = heap.allocate(256, AlignClass::Native).unwrap();
        let blocker = heap.allocate(64, AlignClass::Native).unwrap();
        let resized = heap.resize(a, 1024, AlignClass::Native).unwrap();
        assert_ne!(resized.addr, a);
        assert_eq!(resized.moved_from, Some((a, 256)));
        assert_conserved(&heap);
        heap.release(blocker).unwrap();
        heap.release(resized.addr).unwrap();
        assert_eq!(heap.stats().free_blocks, 1);
    }

    #[test]
    fn failed_grow_leaves_block_intact() {
        let mut heap = heap_of(1024);
        let a = heap.allocate(512, AlignClass::Native).unwrap();
        let before = heap.stats();
        assert_eq!(heap.resize(a, 4096, AlignClass::Native), Err(HeapError::Failed));
        assert_eq!(heap.stats(), before);
        heap.release(a).unwrap();
    }

    #[test]
    fn leak_tracking_snapshot_per_block() {
        let mut heap = heap_of(4096);
        let tracked = heap.allocate(64, AlignClass::Native).unwrap();
        heap.suppress_leak_detection();
        let untracked = heap.allocate(64, AlignClass::Native).unwrap();
        heap.restore_leak_detection();
        let stats = heap.stats();
        assert_eq!(stats.live_blocks, 2);
        assert_eq!(stats.tracked_blocks, 1);
        let mut dump = String::new();
        heap.show(&mut dump, true).unwrap();
        assert!(dump.contains(&format!("{untracked:#x} 64 bytes (untracked)")), "{dump}");
        heap.release(tracked).unwrap();
        heap.release(untracked).unwrap();
    }

    #[test]
    fn allocate_survives_a_deep_free_index() {
        // Releasing every other block in address order leaves one free
        // span per released block, none of which coalesce, so the free
        // index degenerates into a spine. The next allocation removes
        // its minimum-keyed block and must not run out of stack doing
        // it.
        const BLOCKS: usize = 200_000;
        let mut heap = Heap::new(RawSegment {
            base: 0x10_0000,
            size: BLOCKS * 16,
        })
        .unwrap();
        let mut addrs = Vec::with_capacity(BLOCKS);
        for _ in 0..BLOCKS {
            addrs.push(heap.allocate(8, AlignClass::Native).unwrap());
        }
        for pair in addrs.chunks(2) {
            heap.release(pair[0]).unwrap();
        }
        assert_eq!(heap.stats().free_blocks, BLOCKS / 2);
        let again = heap.allocate(8, AlignClass::Native).unwrap();
        assert_eq!(again, addrs[0]);
        assert_conserved(&heap);
    }

    #[test]
    fn accounting_invariant_under_deterministic_trace() {
        let mut heap = heap_of(1 << 20);
        let mut rng: u64 = 0x5eed_1234_abcd_ef01;
        let mut step = move || {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            rng >> 33
        };
        let mut live: Vec<usize> = Vec::new();
        for _ in 0..4000 {
            match step() % 3 {
                0 => {
                    let size = (step() % 2048 + 1) as usize;
                    if let Ok(addr) = heap.allocate(size, AlignClass::Native) {
                        live.push(addr);
                    }
                }
                1 => {
                    if !live.is_empty() {
                        let idx = (step() as usize) % live.len();
                        let addr = live.swap_remove(idx);
                        heap.release(addr).unwrap();
                    }
                }
                _ => {
                    if !live.is_empty() {
                        let idx = (step() as usize) % live.len();
                        let size = (step() % 2048 + 1) as usize;
                        if let Ok(resized) = heap.resize(live[idx], size, AlignClass::Native) {
                            live[idx] = resized.addr;
                        }
                    }
                }
            }
            assert_conserved(&heap);
        }
        for addr in live {
            heap.release(addr).unwrap();
        }
        assert_conserved(&heap);
        assert_eq!(heap.stats().live_blocks, 0);
    }
}
