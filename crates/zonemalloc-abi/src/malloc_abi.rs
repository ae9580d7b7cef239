//! Exported allocator entry points.
//!
//! Each entry point claims the re-entry guard first; a nested call from
//! inside the allocator (registry growth, report formatting) is served from
//! the bootstrap region instead of the heap, which the outer call holds
//! locked. Symbols are only mangled away in debug builds so that debug and
//! test binaries never shadow the system allocator they are running on.

use std::ffi::c_void;
use std::ptr;

use zonemalloc_core::AllocError;

use crate::bootstrap::BOOTSTRAP;
use crate::heap_state;

#[inline]
unsafe fn set_errno(value: i32) {
    // SAFETY: __errno_location returns this thread's errno slot.
    unsafe { *libc::__errno_location() = value };
}

/// `malloc` -- allocates `size` bytes of uninitialized memory.
///
/// Returns a 16-byte aligned pointer valid for at least `size` bytes, or
/// null with `errno = ENOMEM` on failure (`size != 0` only, matching the
/// platform convention). A zero-size request returns a valid, freeable
/// pointer.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    let Some(_guard) = heap_state::enter() else {
        return BOOTSTRAP.alloc(size.max(1)).cast();
    };
    match heap_state::with_heap(|heap| heap.allocate(size)) {
        Ok(ptr) => ptr.cast(),
        Err(_) => {
            if size != 0 {
                // SAFETY: writing this thread's errno.
                unsafe { set_errno(libc::ENOMEM) };
            }
            ptr::null_mut()
        }
    }
}

/// `free` -- releases memory previously returned by `malloc`, `calloc`, or
/// `realloc`. Null pointers and pointers no zone owns are ignored.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by this allocator
/// that has not been freed since (a detected double free is ignored rather
/// than undefined, but remains a caller bug).
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    if ptr.is_null() || BOOTSTRAP.contains(ptr as usize) {
        return;
    }
    let Some(_guard) = heap_state::enter() else {
        // A nested free cannot take the heap lock; every pointer a nested
        // caller can legitimately hold came from the bootstrap region, so
        // dropping the call loses nothing.
        return;
    };
    heap_state::with_heap(|heap| {
        heap.release(ptr.cast());
    });
}

/// `calloc` -- allocates zeroed memory for `nmemb` elements of `size`
/// bytes. Overflow of `nmemb * size` fails with `errno = ENOMEM`.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn calloc(nmemb: usize, size: usize) -> *mut c_void {
    let Some(total) = nmemb.checked_mul(size) else {
        // SAFETY: writing this thread's errno.
        unsafe { set_errno(libc::ENOMEM) };
        return ptr::null_mut();
    };
    let out = unsafe { malloc(total) };
    if !out.is_null() {
        // Recycled blocks carry stale bytes (including old free-list
        // links), so the zeroing is mandatory, not cosmetic.
        // SAFETY: malloc returned a block valid for at least total bytes.
        unsafe { ptr::write_bytes(out.cast::<u8>(), 0, total) };
    }
    out
}

/// `realloc` -- resizes a previously allocated block.
///
/// - Null `ptr` behaves like `malloc(size)`.
/// - `size == 0` frees the pointer and returns null.
/// - A request still fitting the current block keeps the pointer; growth
///   allocates, copies the overlapping prefix, and frees the old block.
/// - A pointer this allocator does not own fails with null (`errno` is
///   only set for out-of-memory).
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by this allocator.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    if ptr.is_null() {
        return unsafe { malloc(size) };
    }
    let addr = ptr as usize;
    if BOOTSTRAP.contains(addr) {
        // Early bootstrap blocks migrate into the heap; the region itself
        // is never reclaimed.
        if size == 0 {
            return ptr::null_mut();
        }
        let out = unsafe { malloc(size) };
        if !out.is_null() {
            let copy = BOOTSTRAP.block_size(addr).min(size);
            // SAFETY: the bootstrap block holds copy readable bytes and out
            // is a fresh block of at least size bytes; the ranges are
            // disjoint.
            unsafe { ptr::copy_nonoverlapping(ptr.cast::<u8>(), out.cast(), copy) };
        }
        return out;
    }
    let Some(_guard) = heap_state::enter() else {
        // A nested realloc of a heap pointer cannot resolve the old size
        // without the lock; refuse rather than corrupt.
        return ptr::null_mut();
    };
    match heap_state::with_heap(|heap| heap.resize(ptr.cast(), size)) {
        Ok(out) => out.cast(),
        Err(err) => {
            if size != 0 && matches!(err, AllocError::OutOfMemory(_)) {
                // SAFETY: writing this thread's errno.
                unsafe { set_errno(libc::ENOMEM) };
            }
            ptr::null_mut()
        }
    }
}

/// `show_alloc_mem` -- writes the zone/block report to standard output and
/// returns the total of in-use block sizes (slab blocks count as their bin
/// size, large blocks as their exact payload size).
///
/// # Safety
///
/// No preconditions; exported as an extern "C" diagnostic entry point.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn show_alloc_mem() -> usize {
    let Some(_guard) = heap_state::enter() else {
        return 0;
    };
    heap_state::with_heap(|heap| zonemalloc_core::dump_stdout(heap))
}
