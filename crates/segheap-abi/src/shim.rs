//! libc-compatible allocation entry points.
//!
//! Each export takes a thread-local reentry guard before touching the
//! heap. The Rust standard library inside this cdylib allocates
//! through the process `malloc`, which is these very symbols; nested
//! entries (container growth inside the bookkeeping, bootstrap code
//! running before the heap exists) route to the native `__libc_*`
//! allocator instead of recursing.
//!
//! `free` and `realloc` hand pointers the heap does not own to the
//! native path, after a diagnostic: allocations that pre-date the shim
//! belong to libc.

use std::cell::Cell;
use std::ffi::c_void;

use segheap_core::HeapError;

use crate::diag;
use crate::sys;

unsafe extern "C" {
    #[link_name = "__libc_malloc"]
    fn native_malloc_sym(size: usize) -> *mut c_void;
    #[link_name = "__libc_calloc"]
    fn native_calloc_sym(nmemb: usize, size: usize) -> *mut c_void;
    #[link_name = "__libc_realloc"]
    fn native_realloc_sym(ptr: *mut c_void, size: usize) -> *mut c_void;
    #[link_name = "__libc_free"]
    fn native_free_sym(ptr: *mut c_void);
    #[link_name = "__libc_memalign"]
    fn native_memalign_sym(alignment: usize, size: usize) -> *mut c_void;
}

#[inline]
unsafe fn native_malloc(size: usize) -> *mut c_void {
    // SAFETY: direct call to the libc allocator symbol.
    unsafe { native_malloc_sym(size) }
}

#[inline]
unsafe fn native_calloc(nmemb: usize, size: usize) -> *mut c_void {
    // SAFETY: direct call to the libc allocator symbol.
    unsafe { native_calloc_sym(nmemb, size) }
}

#[inline]
unsafe fn native_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    // SAFETY: direct call to the libc allocator symbol.
    unsafe { native_realloc_sym(ptr, size) }
}

#[inline]
unsafe fn native_free(ptr: *mut c_void) {
    // SAFETY: direct call to the libc allocator symbol.
    unsafe { native_free_sym(ptr) }
}

#[inline]
unsafe fn native_memalign(alignment: usize, size: usize) -> *mut c_void {
    // SAFETY: direct call to the libc allocator symbol.
    unsafe { native_memalign_sym(alignment, size) }
}

thread_local! {
    static REENTRY_DEPTH: Cell<u32> = const { Cell::new(0) };
}

struct ReentryGuard;

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        REENTRY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[inline]
fn enter_reentry_guard() -> Option<ReentryGuard> {
    REENTRY_DEPTH.with(|depth| {
        if depth.get() > 0 {
            None
        } else {
            depth.set(depth.get() + 1);
            Some(ReentryGuard)
        }
    })
}

const PAGE_ALIGNMENT: usize = 4096;

fn allocate(op: &str, size: usize) -> *mut c_void {
    match sys::global().allocate(size) {
        Ok(addr) => addr as *mut c_void,
        Err(status) => {
            diag::report(op, 0, size, status);
            std::ptr::null_mut()
        }
    }
}

fn release(ptr: *mut c_void) {
    let addr = ptr as usize;
    match sys::global().release(addr) {
        Ok(()) => {}
        Err(status @ HeapError::InvalidPointer) => {
            // Not ours: a bootstrap allocation made through the native
            // fallback before the heap existed. Reported, then handed
            // to the allocator that owns it.
            diag::report("free", addr, 0, status);
            // SAFETY: the pointer came from the native path.
            unsafe { native_free(ptr) };
        }
        Err(status) => diag::report("free", addr, 0, status),
    }
}

/// POSIX `malloc`.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    let Some(_guard) = enter_reentry_guard() else {
        // SAFETY: nested entry; bypass the heap to avoid recursion.
        return unsafe { native_malloc(size.max(1)) };
    };
    allocate("malloc", size)
}

/// POSIX `free`. Null is a no-op.
///
/// # Safety
///
/// `ptr` must come from this allocator (or libc, for bootstrap
/// pointers) and must not have been freed already.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let Some(_guard) = enter_reentry_guard() else {
        // SAFETY: nested entry; the pointer came from the native path.
        unsafe { native_free(ptr) };
        return;
    };
    release(ptr);
}

/// POSIX `calloc`: overflow-checked `nmemb * size`, zeroed memory.
///
/// # Safety
///
/// As for [`malloc`].
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    let Some(_guard) = enter_reentry_guard() else {
        // SAFETY: nested entry; bypass the heap to avoid recursion.
        return unsafe { native_calloc(nmemb, size) };
    };
    let Some(total) = nmemb.checked_mul(size) else {
        diag::report("calloc", 0, usize::MAX, HeapError::Failed);
        return std::ptr::null_mut();
    };
    let out = allocate("calloc", total);
    if !out.is_null() {
        // SAFETY: the heap just handed out `total` usable bytes here.
        unsafe { std::ptr::write_bytes(out.cast::<u8>(), 0, total) };
    }
    out
}

/// POSIX `realloc`. Null aliases `malloc`; size zero aliases `free`.
///
/// # Safety
///
/// As for [`malloc`] and [`free`].
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    let Some(_guard) = enter_reentry_guard() else {
        // SAFETY: nested entry; the pointer came from the native path.
        return unsafe { native_realloc(ptr, size) };
    };
    if ptr.is_null() {
        return allocate("realloc", size);
    }
    if size == 0 {
        release(ptr);
        return std::ptr::null_mut();
    }
    let addr = ptr as usize;
    match sys::global().resize(addr, size) {
        Ok(moved) => moved as *mut c_void,
        Err(status @ HeapError::InvalidPointer) => {
            diag::report("realloc", addr, size, status);
            // SAFETY: not ours; forward to the allocator that owns it.
            unsafe { native_realloc(ptr, size) }
        }
        Err(status) => {
            diag::report("realloc", addr, size, status);
            std::ptr::null_mut()
        }
    }
}

/// Classic `memalign`. Unsupported alignments produce a diagnostic
/// and null without touching the heap.
///
/// # Safety
///
/// As for [`malloc`].
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn memalign(alignment: usize, size: usize) -> *mut c_void {
    let Some(_guard) = enter_reentry_guard() else {
        // SAFETY: nested entry; bypass the heap to avoid recursion.
        return unsafe { native_memalign(alignment, size) };
    };
    match sys::global().allocate_aligned(size, alignment) {
        Ok(addr) => addr as *mut c_void,
        Err(status) => {
            diag::report("memalign", alignment, size, status);
            std::ptr::null_mut()
        }
    }
}

/// Classic `valloc`: page-aligned allocation.
///
/// # Safety
///
/// As for [`malloc`].
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn valloc(size: usize) -> *mut c_void {
    // SAFETY: same contract as memalign at page alignment.
    unsafe { memalign(PAGE_ALIGNMENT, size) }
}

/// Obsolete alias for `free`.
///
/// # Safety
///
/// As for [`free`].
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn cfree(ptr: *mut c_void) {
    // SAFETY: same contract as free.
    unsafe { free(ptr) }
}
