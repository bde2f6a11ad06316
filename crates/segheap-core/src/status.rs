//! Allocator status taxonomy.

use thiserror::Error;

/// Non-OK outcome of a heap or partition operation.
///
/// Every allocate/resize/release-style call produces either `Ok` or one
/// of these statuses, and no layer below the ABI shim is allowed to
/// swallow one. `Corrupted` is deliberately not treated as fatal here:
/// it is surfaced so the embedding application can decide whether to
/// abort, since a hard-abort policy does not suit every deployment
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Resource exhaustion, or an invalid parameter such as an
    /// unsupported alignment.
    #[error("allocation failed")]
    Failed,
    /// A block header failed its internal consistency check. The
    /// operation was aborted before mutating the free index.
    #[error("heap corrupted")]
    Corrupted,
    /// Release of a block that is already free.
    #[error("double free")]
    DoubleFree,
    /// Release of an address the heap does not recognise as a block it
    /// owns.
    #[error("invalid pointer")]
    InvalidPointer,
}

/// Result alias used throughout the allocator stack.
pub type HeapResult<T> = Result<T, HeapError>;
