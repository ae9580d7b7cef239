//! Bootstrap bump region for re-entrant allocations.
//!
//! Rust code running inside the exported allocator entry points can itself
//! allocate (registry growth, report formatting). Those nested calls land
//! back on `malloc` while the heap lock is held; serving them from the heap
//! would deadlock. They are satisfied instead from a fixed static region
//! with a bump cursor. Each block carries a size prefix so `realloc` can
//! migrate it into the heap later; the region itself is never reclaimed, so
//! `free` of a bootstrap pointer is a no-op.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use zonemalloc_core::ALIGNMENT;
use zonemalloc_core::align::align_up;

/// Bytes reserved for bootstrap allocations.
const BOOTSTRAP_CAPACITY: usize = 1 << 20;

/// Size prefix stored ahead of each block; keeps payloads aligned.
const HEADER: usize = ALIGNMENT;

#[repr(align(16))]
struct Backing([u8; BOOTSTRAP_CAPACITY]);

/// Fixed static region carved by a monotonic bump cursor.
pub struct BootstrapRegion {
    cursor: AtomicUsize,
    buf: UnsafeCell<Backing>,
}

// SAFETY: the bump cursor reserves every byte range for exactly one caller;
// reserved ranges are never handed out twice.
unsafe impl Sync for BootstrapRegion {}

pub static BOOTSTRAP: BootstrapRegion = BootstrapRegion::new();

impl BootstrapRegion {
    const fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            buf: UnsafeCell::new(Backing([0; BOOTSTRAP_CAPACITY])),
        }
    }

    fn base(&self) -> usize {
        self.buf.get() as usize
    }

    /// Carves `size` bytes plus the size prefix; null when the region is
    /// exhausted.
    pub fn alloc(&self, size: usize) -> *mut u8 {
        let Some(need) = size.checked_add(HEADER) else {
            return ptr::null_mut();
        };
        let need = align_up(need, ALIGNMENT);
        let mut start = self.cursor.load(Ordering::Relaxed);
        loop {
            let Some(end) = start.checked_add(need) else {
                return ptr::null_mut();
            };
            if end > BOOTSTRAP_CAPACITY {
                return ptr::null_mut();
            }
            match self
                .cursor
                .compare_exchange_weak(start, end, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => start = current,
            }
        }
        let block = self.base() + start;
        // SAFETY: [block, block + need) was exclusively reserved above and
        // lies inside the static backing buffer.
        unsafe { (block as *mut usize).write(size) };
        (block + HEADER) as *mut u8
    }

    /// Whether `addr` points into a bootstrap block payload.
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base();
        addr >= base + HEADER && addr < base + BOOTSTRAP_CAPACITY
    }

    /// Size recorded for a payload returned by [`BootstrapRegion::alloc`].
    pub fn block_size(&self, addr: usize) -> usize {
        debug_assert!(self.contains(addr));
        // SAFETY: every bootstrap payload is preceded by its size prefix.
        unsafe { ((addr - HEADER) as *const usize).read() }
    }
}
