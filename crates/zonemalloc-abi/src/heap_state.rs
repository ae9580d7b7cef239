//! Process-wide singleton heap and re-entry guard.
//!
//! The singleton is the lazily-usable substitute for constructor and
//! destructor hooks: `Heap::new` is `const`, so the static needs no
//! run-time initialization and the first allocation maps the first zone.
//! The mutex serializes the exported entry points; the engine itself stays
//! single-threaded.

use std::cell::Cell;

use parking_lot::Mutex;
use zonemalloc_core::Heap;

/// Minimum blocks carved for a fresh tiny slab.
pub const TINY_MIN_BLOCKS: usize = 128;
/// Minimum blocks carved for a fresh small slab.
pub const SMALL_MIN_BLOCKS: usize = 128;

static HEAP: Mutex<Heap> = Mutex::new(Heap::new(TINY_MIN_BLOCKS, SMALL_MIN_BLOCKS));

/// Runs `f` with exclusive access to the singleton heap.
pub fn with_heap<R>(f: impl FnOnce(&mut Heap) -> R) -> R {
    f(&mut HEAP.lock())
}

thread_local! {
    static REENTRY_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Active claim on an allocator entry point; dropping it releases the
/// claim.
pub struct ReentryGuard(());

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        REENTRY_DEPTH.with(|depth| {
            let current = depth.get();
            depth.set(current.saturating_sub(1));
        });
    }
}

/// Marks entry into an allocator entry point. Returns `None` when this
/// thread is already inside one; callers then serve the request from the
/// bootstrap region instead of touching the (already locked) heap.
pub fn enter() -> Option<ReentryGuard> {
    REENTRY_DEPTH.with(|depth| {
        let current = depth.get();
        if current > 0 {
            None
        } else {
            depth.set(current + 1);
            Some(ReentryGuard(()))
        }
    })
}
