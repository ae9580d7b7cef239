//! Alignment and page-size helpers.

use std::sync::OnceLock;

/// Alignment of every payload pointer the allocator hands out, and of all
/// internal block addresses.
pub const ALIGNMENT: usize = 16;

/// Rounds `n` up to the next multiple of `align`.
///
/// `align` must be a power of two and `n` must be small enough that the
/// rounded value fits in `usize`; the heap rejects oversized requests before
/// any size arithmetic happens.
#[inline]
#[must_use]
pub fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    debug_assert!(n <= usize::MAX - (align - 1));
    (n + align - 1) & !(align - 1)
}

/// Whether `n` is a multiple of `align` (power of two).
#[inline]
#[must_use]
pub fn is_aligned(n: usize, align: usize) -> bool {
    debug_assert!(align.is_power_of_two());
    n & (align - 1) == 0
}

/// OS page size, queried once and cached.
#[must_use]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf reads a configuration value and has no memory
        // preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if raw > 0 { raw as usize } else { 4096 }
    })
}
