//! Multi-thread partition scenarios.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use segheap_core::{
    AlignClass, ArenaSource, HeapError, PARTITION_OVERHEAD, Partition, PartitionSpec,
};

fn partition(limit: usize, min_segment: usize) -> Arc<Partition<ArenaSource>> {
    Arc::new(Partition::new(
        ArenaSource::new(0x100_0000, usize::MAX / 4),
        PartitionSpec {
            memory_limit: limit,
            min_segment_size: min_segment,
        },
    ))
}

#[test]
fn each_thread_gets_its_own_local_heap() {
    let p = partition(16 << 20, 4096);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let p = Arc::clone(&p);
        handles.push(thread::spawn(move || {
            let mut addrs = Vec::new();
            for i in 0..64 {
                addrs.push(p.allocate(32 + i).unwrap());
            }
            assert!(p.stats().local.is_some());
            for addr in addrs {
                p.release(addr).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = p.stats();
    assert_eq!(stats.locals.len(), 4);
    for heap in &stats.locals {
        assert_eq!(heap.live_blocks, 0);
        assert_eq!(heap.live_bytes + heap.free_bytes, heap.total_bytes);
    }
    // The spawning thread never allocated.
    assert!(stats.local.is_none());
}

#[test]
fn blocks_can_be_released_from_another_thread() {
    let p = partition(16 << 20, 4096);
    let (tx, rx) = mpsc::channel();
    let producer = {
        let p = Arc::clone(&p);
        thread::spawn(move || {
            for i in 0..32 {
                tx.send(p.allocate(64 + i).unwrap()).unwrap();
            }
        })
    };
    let consumer = {
        let p = Arc::clone(&p);
        thread::spawn(move || {
            for addr in rx {
                p.release(addr).unwrap();
            }
        })
    };
    producer.join().unwrap();
    consumer.join().unwrap();
    let stats = p.stats();
    assert!(stats.locals.iter().all(|heap| heap.live_blocks == 0));
}

#[test]
fn foreign_resize_routes_to_the_owning_heap() {
    let p = partition(16 << 20, 4096);
    let addr = {
        let p = Arc::clone(&p);
        thread::spawn(move || p.allocate(128).unwrap())
            .join()
            .unwrap()
    };
    // This thread has no local heap; the block lives in the worker's.
    let moved = p.resize(addr, 256, |_, _, _| {}).unwrap();
    assert!(p.usable_size(moved).unwrap() >= 256);
    p.release(moved).unwrap();
    assert_eq!(p.release(moved), Err(HeapError::DoubleFree));
}

#[test]
fn concurrent_churn_stays_consistent() {
    let p = partition(64 << 20, 1 << 16);
    let mut handles = Vec::new();
    for t in 0..8 {
        let p = Arc::clone(&p);
        handles.push(thread::spawn(move || {
            let mut rng: u64 = 0x9e37_79b9 ^ (t as u64);
            let mut live = Vec::new();
            for _ in 0..500 {
                rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
                if rng >> 63 == 0 || live.is_empty() {
                    let size = ((rng >> 33) % 512 + 1) as usize;
                    if let Ok(addr) = p.allocate(size) {
                        live.push(addr);
                    }
                } else {
                    let idx = ((rng >> 33) as usize) % live.len();
                    let addr = live.swap_remove(idx);
                    p.release(addr).unwrap();
                }
            }
            for addr in live {
                p.release(addr).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = p.stats();
    for heap in stats.locals.iter().chain(stats.global.iter()) {
        assert_eq!(heap.live_blocks, 0);
        assert_eq!(heap.live_bytes + heap.free_bytes, heap.total_bytes);
    }
}

struct ExitRelease {
    partition: Arc<Partition<ArenaSource>>,
    addr: usize,
}

impl Drop for ExitRelease {
    // Runs while the thread tears down its storage, possibly after the
    // partition's own thread-local registry is gone. Destructor
    // ordering is unspecified, so both orders pass through here across
    // runs; neither may panic.
    fn drop(&mut self) {
        self.partition.release(self.addr).unwrap();
        if let Ok(extra) = self.partition.allocate(32) {
            self.partition.release(extra).unwrap();
        }
    }
}

thread_local! {
    static AT_EXIT: RefCell<Option<ExitRelease>> = const { RefCell::new(None) };
}

#[test]
fn release_during_thread_storage_teardown_does_not_panic() {
    let p = partition(16 << 20, 4096);
    {
        let p = Arc::clone(&p);
        thread::spawn(move || {
            let addr = p.allocate(64).unwrap();
            AT_EXIT.with(|slot| {
                *slot.borrow_mut() = Some(ExitRelease { partition: p, addr });
            });
        })
        .join()
        .unwrap();
    }
    let stats = p.stats();
    for heap in stats.locals.iter().chain(stats.global.iter()) {
        assert_eq!(heap.live_blocks, 0);
    }
}

#[test]
fn quota_scenario_matches_the_contract() {
    let p = partition(1024, 64);
    assert!(p.sysalloc(2000).is_none(), "over-ceiling request");
    assert!(p.sysalloc(500).is_some());
    assert_eq!(p.stats().ceiling, 1024 - PARTITION_OVERHEAD - 500);
    p.kill();
    assert!(p.sysalloc(1).is_none());
}

#[test]
fn aligned_allocation_through_the_partition() {
    for class in AlignClass::ALL {
        let p = partition(1 << 30, 4096);
        let addr = p.allocate_class(64, class).unwrap();
        assert_eq!(addr % class.alignment(), 0, "{class:?}");
        p.release(addr).unwrap();
    }
}
