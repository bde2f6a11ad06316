//! Deterministic allocator workload.

use segheap_core::{ArenaSource, HeapError, HeapStats, Partition, PartitionSpec};
use thiserror::Error;

use crate::report::WorkloadReport;

/// Arena placed well above the zero page so no address is ever null.
const ARENA_BASE: usize = 0x1000;

/// Parameters of a workload run.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadSpec {
    pub ops: u64,
    pub seed: u64,
    pub memory_limit: usize,
    pub min_segment_size: usize,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        WorkloadSpec {
            ops: 10_000,
            seed: 0xa5a5_5a5a_dead_beef,
            memory_limit: 4 * 1024 * 1024,
            min_segment_size: 64 * 1024,
        }
    }
}

/// Invariant violation observed mid-run.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("conservation broken at step {step}: {detail}")]
    Conservation { step: u64, detail: String },
    #[error("unexpected status at step {step}: {status}")]
    Status { step: u64, status: HeapError },
    #[error("{remaining} blocks still live after teardown")]
    Leak { remaining: usize },
}

/// One partition plus the trace state driving it.
pub struct Workload {
    spec: WorkloadSpec,
    partition: Partition<ArenaSource>,
}

impl Workload {
    #[must_use]
    pub fn new(spec: WorkloadSpec) -> Self {
        Workload {
            spec,
            partition: Partition::new(
                ArenaSource::new(ARENA_BASE, usize::MAX / 2),
                PartitionSpec {
                    memory_limit: spec.memory_limit,
                    min_segment_size: spec.min_segment_size,
                },
            ),
        }
    }

    /// Runs the trace, checking conservation after every operation and
    /// releasing every surviving block at the end.
    pub fn run(&mut self) -> Result<WorkloadReport, WorkloadError> {
        let mut rng = Lcg::new(self.spec.seed);
        let mut live: Vec<usize> = Vec::new();
        let mut allocs = 0u64;
        let mut releases = 0u64;
        let mut resizes = 0u64;
        let mut alloc_failures = 0u64;
        let mut resize_failures = 0u64;
        let mut peak_live_blocks = 0usize;

        for step in 0..self.spec.ops {
            match rng.next() % 4 {
                // Allocation gets double weight so traces stay busy.
                0 | 1 => {
                    allocs += 1;
                    let size = (rng.next() % 4096 + 1) as usize;
                    match self.partition.allocate(size) {
                        Ok(addr) => live.push(addr),
                        Err(HeapError::Failed) => alloc_failures += 1,
                        Err(status) => return Err(WorkloadError::Status { step, status }),
                    }
                }
                2 => {
                    if live.is_empty() {
                        continue;
                    }
                    releases += 1;
                    let idx = (rng.next() as usize) % live.len();
                    let addr = live.swap_remove(idx);
                    self.partition
                        .release(addr)
                        .map_err(|status| WorkloadError::Status { step, status })?;
                }
                _ => {
                    if live.is_empty() {
                        continue;
                    }
                    resizes += 1;
                    let idx = (rng.next() as usize) % live.len();
                    let size = (rng.next() % 4096 + 1) as usize;
                    match self.partition.resize(live[idx], size, |_, _, _| {}) {
                        Ok(addr) => live[idx] = addr,
                        Err(HeapError::Failed) => resize_failures += 1,
                        Err(status) => return Err(WorkloadError::Status { step, status }),
                    }
                }
            }
            peak_live_blocks = peak_live_blocks.max(live.len());
            self.check_conservation(step)?;
        }

        for addr in live.drain(..) {
            self.partition
                .release(addr)
                .map_err(|status| WorkloadError::Status {
                    step: self.spec.ops,
                    status,
                })?;
        }
        let final_stats = self.partition.stats();
        let remaining: usize = final_stats
            .locals
            .iter()
            .chain(final_stats.global.iter())
            .map(|heap| heap.live_blocks)
            .sum();
        if remaining != 0 {
            return Err(WorkloadError::Leak { remaining });
        }

        Ok(WorkloadReport {
            ops: self.spec.ops,
            seed: self.spec.seed,
            allocs,
            releases,
            resizes,
            alloc_failures,
            resize_failures,
            peak_live_blocks,
            final_stats,
        })
    }

    /// Renders the partition dump.
    #[must_use]
    pub fn show(&self, verbose: bool) -> String {
        let mut out = String::new();
        // String formatting cannot fail.
        let _ = self.partition.show(&mut out, verbose);
        out
    }

    fn check_conservation(&self, step: u64) -> Result<(), WorkloadError> {
        let stats = self.partition.stats();
        let heaps = stats.locals.iter().chain(stats.global.iter());
        for heap in heaps {
            if !conserved(heap) {
                return Err(WorkloadError::Conservation {
                    step,
                    detail: format!(
                        "live {} + free {} != total {}",
                        heap.live_bytes, heap.free_bytes, heap.total_bytes
                    ),
                });
            }
        }
        Ok(())
    }
}

fn conserved(heap: &HeapStats) -> bool {
    heap.live_bytes + heap.free_bytes == heap.total_bytes
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        self.state >> 33
    }
}
