//! Anonymous mapping wrappers.
//!
//! The only module that talks to the OS. Mapping bases travel through the
//! rest of the engine as `usize` addresses; conversion to raw pointers is
//! confined to this module and `zone`.

use std::ffi::c_void;
use std::ptr;

use thiserror::Error;

/// The kernel refused an anonymous mapping.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("anonymous mapping of {len} bytes failed (errno {errno})")]
pub struct MapError {
    /// Requested mapping length in bytes.
    pub len: usize,
    /// OS errno captured at the failing call.
    pub errno: i32,
}

/// Maps `len` bytes of zero-filled, private, anonymous memory and returns
/// the base address. `len` must be non-zero.
pub fn map_anonymous(len: usize) -> Result<usize, MapError> {
    debug_assert!(len > 0);
    // SAFETY: a private anonymous mapping at a kernel-chosen address has no
    // preconditions; failure is reported through MAP_FAILED.
    let base = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if base == libc::MAP_FAILED {
        // SAFETY: __errno_location returns this thread's errno slot.
        let errno = unsafe { *libc::__errno_location() };
        return Err(MapError { len, errno });
    }
    Ok(base as usize)
}

/// Releases a mapping previously returned by [`map_anonymous`]. The
/// base/length pair must be exactly the one the mapping was created with.
pub fn unmap(base: usize, len: usize) {
    if base == 0 || len == 0 {
        return;
    }
    // SAFETY: callers pass the exact base and length of a live mapping they
    // own; after this call the zone never touches the range again.
    unsafe {
        libc::munmap(base as *mut c_void, len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::page_size;

    #[test]
    fn map_unmap_round_trip() {
        let len = page_size();
        let base = map_anonymous(len).expect("mapping one page should succeed");
        assert_ne!(base, 0);
        assert_eq!(base % page_size(), 0);

        // Fresh anonymous pages read as zero and are writable.
        // SAFETY: base..base+len is a live read/write mapping.
        unsafe {
            let slice = std::slice::from_raw_parts_mut(base as *mut u8, len);
            assert!(slice.iter().all(|&b| b == 0));
            slice[0] = 0xA5;
            slice[len - 1] = 0x5A;
            assert_eq!(slice[0], 0xA5);
            assert_eq!(slice[len - 1], 0x5A);
        }

        unmap(base, len);
    }

    #[test]
    fn huge_mapping_reports_errno() {
        // More address space than any test machine will grant.
        let err = map_anonymous(usize::MAX & !4095).expect_err("absurd mapping must fail");
        assert_ne!(err.errno, 0);
        assert!(err.to_string().contains("failed"));
    }
}
