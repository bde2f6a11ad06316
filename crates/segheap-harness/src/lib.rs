//! # segheap-harness
//!
//! Deterministic allocate/resize/release workloads against a
//! [`Partition`](segheap_core::Partition) over a bookkeeping-only
//! arena, verifying the accounting invariants at every step. The
//! `harness` binary drives it from the command line and emits a text
//! or JSON report.

pub mod report;
pub mod workload;

pub use report::WorkloadReport;
pub use workload::{Workload, WorkloadError, WorkloadSpec};
