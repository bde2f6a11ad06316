//! Static-arena segment source.
//!
//! Hands out disjoint address ranges from one fixed span with a bump
//! cursor. Nothing is ever returned to the arena. Bookkeeping-only,
//! like the rest of the core; tests and the workload harness use it as
//! the [`SegmentSource`] behind a partition.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::align::{NATIVE_ALIGNMENT, round_up};
use crate::heap::RawSegment;
use crate::partition::SegmentSource;

/// Bump-cursor source over a fixed address span.
pub struct ArenaSource {
    cursor: AtomicUsize,
    end: usize,
}

impl ArenaSource {
    /// Creates an arena covering `[base, base + size)`.
    #[must_use]
    pub fn new(base: usize, size: usize) -> Self {
        let base = round_up(base, NATIVE_ALIGNMENT);
        ArenaSource {
            cursor: AtomicUsize::new(base),
            end: base.saturating_add(size),
        }
    }

    /// Bytes not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end - self.cursor.load(Ordering::Relaxed)
    }
}

impl SegmentSource for ArenaSource {
    fn acquire(&self, len: usize) -> Option<RawSegment> {
        let len = round_up(len.max(1), NATIVE_ALIGNMENT);
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cursor| {
                cursor.checked_add(len).filter(|&next| next <= self.end)
            })
            .ok()
            .map(|base| RawSegment { base, size: len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_disjoint_and_in_order() {
        let arena = ArenaSource::new(0x1000, 4096);
        let a = arena.acquire(100).unwrap();
        let b = arena.acquire(200).unwrap();
        assert_eq!(a.base, 0x1000);
        assert!(b.base >= a.end());
        assert!(a.size >= 100 && b.size >= 200);
    }

    #[test]
    fn exhaustion_yields_none() {
        let arena = ArenaSource::new(0x1000, 256);
        assert!(arena.acquire(512).is_none());
        assert!(arena.acquire(256).is_some());
        assert_eq!(arena.remaining(), 0);
        assert!(arena.acquire(1).is_none());
    }
}
