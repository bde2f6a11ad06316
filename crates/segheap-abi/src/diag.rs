//! Allocation-free status diagnostics.
//!
//! Shim entry points report every non-OK status here before returning
//! the libc sentinel. Formatting goes through a fixed stack buffer and
//! a raw `write(2)` so the reporting path can never re-enter the
//! allocator.

use std::fmt::{self, Write};

use segheap_core::HeapError;

const BUF_LEN: usize = 192;

struct StackBuf {
    buf: [u8; BUF_LEN],
    len: usize,
}

impl StackBuf {
    fn new() -> Self {
        StackBuf {
            buf: [0; BUF_LEN],
            len: 0,
        }
    }

    fn emit(&self) {
        // SAFETY: the buffer holds `len` initialized bytes; fd 2 is
        // stderr. A failed or short write is ignored, this is a
        // best-effort channel.
        unsafe {
            libc::write(2, self.buf.as_ptr().cast(), self.len);
        }
    }
}

impl fmt::Write for StackBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = BUF_LEN - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Writes one line naming the operation and what went wrong.
pub(crate) fn report(op: &str, addr: usize, size: usize, status: HeapError) {
    let mut buf = StackBuf::new();
    let _ = match status {
        HeapError::Failed => {
            writeln!(buf, "segheap: {op}: allocation of {size} bytes failed")
        }
        HeapError::Corrupted => writeln!(buf, "segheap: {op}: Heap corrupted"),
        HeapError::DoubleFree => writeln!(buf, "segheap: {op}: Double free of {addr:#x}"),
        HeapError::InvalidPointer => {
            writeln!(buf, "segheap: {op}: Invalid Pointer {addr:#x}")
        }
    };
    buf.emit();
}
