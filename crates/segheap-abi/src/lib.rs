//! # segheap-abi
//!
//! ABI-compatible allocation boundary over `segheap-core`.
//!
//! This crate produces a `cdylib` exposing `malloc`, `free`, `calloc`,
//! `realloc`, `memalign`, `valloc` and `cfree` as `extern "C"` symbols
//! backed by a process-wide [`sys::SysHeap`] over an sbrk segment
//! source. The core crate does pure address bookkeeping; all real
//! memory access (zeroing, resize copies) happens here.
//!
//! ```text
//! C caller -> shim entry -> SysHeap -> Partition -> Heap bookkeeping
//! ```
//!
//! Every non-OK status is written to stderr through an
//! allocation-free diagnostic channel before the libc sentinel (null)
//! is returned.

pub mod sys;

#[cfg(not(test))]
mod diag;

// Gated behind cfg(not(test)): the exported symbols would shadow the
// system allocator inside the test binary and recurse.
#[cfg(not(test))]
pub mod shim;
