//! Workload run summary.

use segheap_core::PartitionStats;
use serde::Serialize;

/// Counts and final state of one workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub ops: u64,
    pub seed: u64,
    pub allocs: u64,
    pub releases: u64,
    pub resizes: u64,
    pub alloc_failures: u64,
    pub resize_failures: u64,
    pub peak_live_blocks: usize,
    pub final_stats: PartitionStats,
}

impl WorkloadReport {
    /// Pretty JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One-line text summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} ops (seed {:#x}): {} allocs ({} failed), {} releases, {} resizes ({} failed), peak {} live blocks",
            self.ops,
            self.seed,
            self.allocs,
            self.alloc_failures,
            self.releases,
            self.resizes,
            self.resize_failures,
            self.peak_live_blocks,
        )
    }
}
