//! Heap orchestration: request routing, zone lifecycle, resize semantics.
//!
//! The heap is an explicit context value holding one zone registry per size
//! class plus the slab sizing knobs. Embedders own it and pass it by
//! reference into every operation; the abi crate wraps one instance in a
//! process-wide singleton. The engine itself is single-threaded: callers
//! serialize access.

use std::ptr;

use thiserror::Error;

use crate::align::{ALIGNMENT, align_up};
use crate::mapping::MapError;
use crate::registry::ZoneRegistry;
use crate::size_class::{self, SizeClass};
use crate::stats::HeapStats;
use crate::zone::{BlockFreeResult, Zone};

/// Requests past this bound fail before reaching the kernel, which keeps
/// all downstream size arithmetic free of overflow.
const MAX_REQUEST: usize = isize::MAX as usize / 2;

/// Allocation failure.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The OS refused to map more memory, or the request was oversized.
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] MapError),
    /// `resize` was asked about a pointer no live zone owns. There is no
    /// safe fallback because the old size cannot be known.
    #[error("pointer {addr:#x} is not owned by any zone")]
    UnknownPointer { addr: usize },
}

/// What [`Heap::release`] did with a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Null pointer; nothing to do.
    Null,
    /// Block returned to its slab zone.
    Freed,
    /// Block returned and the now-empty slab zone was unmapped.
    FreedAndTrimmed,
    /// Large zone unmapped; large zones are never pooled.
    UnmappedLarge,
    /// Slab double free detected; state unchanged.
    AlreadyFree,
    /// No live zone owns the pointer (or it is not a block start); ignored.
    Foreign,
}

/// Process-wide allocator state: one zone collection per size class plus
/// per-class minimum block counts for fresh slabs.
#[derive(Debug)]
pub struct Heap {
    tiny: ZoneRegistry,
    small: ZoneRegistry,
    large: ZoneRegistry,
    tiny_min_blocks: usize,
    small_min_blocks: usize,
    stats: HeapStats,
}

impl Heap {
    /// Creates an empty heap. `const` so a singleton can live in a
    /// `static`; no mapping happens until the first allocation.
    #[must_use]
    pub const fn new(tiny_min_blocks: usize, small_min_blocks: usize) -> Self {
        Self {
            tiny: ZoneRegistry::new(),
            small: ZoneRegistry::new(),
            large: ZoneRegistry::new(),
            tiny_min_blocks,
            small_min_blocks,
            stats: HeapStats::new(),
        }
    }

    /// Resets the heap to empty with fresh sizing knobs, unmapping any live
    /// zones. Idempotent on initialized and destroyed heaps alike.
    pub fn init(&mut self, tiny_min_blocks: usize, small_min_blocks: usize) {
        self.clear_zones();
        self.tiny_min_blocks = tiny_min_blocks;
        self.small_min_blocks = small_min_blocks;
        self.stats = HeapStats::new();
    }

    /// Unmaps every zone and zeroes the sizing knobs. Safe to call twice;
    /// the heap stays usable (a later `init` or allocation with the
    /// defaulted knob of 1 block still works).
    pub fn destroy(&mut self) {
        self.clear_zones();
        self.tiny_min_blocks = 0;
        self.small_min_blocks = 0;
    }

    fn clear_zones(&mut self) {
        let dropped = self.tiny.len() + self.small.len() + self.large.len();
        self.tiny.clear();
        self.small.clear();
        self.large.clear();
        self.stats.zones_destroyed += dropped as u64;
    }

    /// Allocates `n` bytes and returns a 16-byte aligned pointer valid for
    /// at least `n` bytes. A zero-size request behaves like a one-byte
    /// request and returns a valid, distinct pointer.
    pub fn allocate(&mut self, n: usize) -> Result<*mut u8, AllocError> {
        if n > MAX_REQUEST {
            return Err(AllocError::OutOfMemory(MapError {
                len: n,
                errno: libc::ENOMEM,
            }));
        }
        let need = align_up(n.max(1), ALIGNMENT);
        match size_class::classify(need) {
            SizeClass::Large => self.allocate_large(need),
            class => match size_class::pick_bin(class, need) {
                Some(bin) => self.allocate_block(class, bin),
                // Defensive: a fixed-class request the bin table does not
                // cover becomes a dedicated large zone.
                None => self.allocate_large(need),
            },
        }
    }

    fn allocate_large(&mut self, need: usize) -> Result<*mut u8, AllocError> {
        let zone = Zone::create_large(need)?;
        let addr = zone.payload_start();
        self.large.insert(zone);
        self.stats.zones_created += 1;
        self.stats.allocations += 1;
        Ok(addr as *mut u8)
    }

    fn allocate_block(&mut self, class: SizeClass, bin: usize) -> Result<*mut u8, AllocError> {
        let index = match self.registry(class).first_with_space(bin) {
            Some(index) => index,
            None => {
                let min_blocks = self.min_blocks(class);
                let zone = Zone::create_slab(class, bin, min_blocks)?;
                self.stats.zones_created += 1;
                self.registry_mut(class).insert(zone)
            }
        };
        match self.registry_mut(class).get_mut(index).alloc_block() {
            Some(addr) => {
                self.stats.allocations += 1;
                Ok(addr as *mut u8)
            }
            // The zone just reported space, so a failed pop means corrupted
            // occupancy state; fail the request instead of handing out junk.
            None => Err(AllocError::OutOfMemory(MapError {
                len: bin,
                errno: libc::ENOMEM,
            })),
        }
    }

    /// Releases a pointer previously returned by [`Heap::allocate`] or
    /// [`Heap::resize`]. Null and foreign pointers are ignored. A slab zone
    /// whose last block comes back is trimmed (unmapped) immediately; large
    /// zones are always unmapped.
    pub fn release(&mut self, ptr: *mut u8) -> ReleaseOutcome {
        if ptr.is_null() {
            return ReleaseOutcome::Null;
        }
        let addr = ptr as usize;
        let Some((class, index)) = self.find_owner(addr) else {
            self.stats.foreign_releases += 1;
            return ReleaseOutcome::Foreign;
        };
        if class == SizeClass::Large {
            drop(self.large.remove(index));
            self.stats.releases += 1;
            self.stats.zones_destroyed += 1;
            return ReleaseOutcome::UnmappedLarge;
        }
        match self.registry_mut(class).get_mut(index).free_block(addr) {
            BlockFreeResult::Freed => {
                self.stats.releases += 1;
                if self.registry(class).get(index).is_empty() {
                    drop(self.registry_mut(class).remove(index));
                    self.stats.zones_destroyed += 1;
                    ReleaseOutcome::FreedAndTrimmed
                } else {
                    ReleaseOutcome::Freed
                }
            }
            BlockFreeResult::AlreadyFree => {
                self.stats.double_frees += 1;
                ReleaseOutcome::AlreadyFree
            }
            // The owner scan matched this zone, so the address is in range
            // but not a block start.
            BlockFreeResult::OutOfRange => {
                self.stats.foreign_releases += 1;
                ReleaseOutcome::Foreign
            }
        }
    }

    /// Resizes the allocation at `ptr` to `n` bytes.
    ///
    /// Null behaves as [`Heap::allocate`]. A foreign pointer fails, even
    /// when `n == 0` (the owner is resolved first, so there is no silent
    /// release of unknown pointers). For an owned pointer, `n == 0`
    /// releases it and returns null; a request that still fits the current
    /// block keeps the pointer; growth allocates, copies the overlapping
    /// prefix, and releases the old block.
    pub fn resize(&mut self, ptr: *mut u8, n: usize) -> Result<*mut u8, AllocError> {
        if ptr.is_null() {
            return self.allocate(n);
        }
        let addr = ptr as usize;
        let Some((class, index)) = self.find_owner(addr) else {
            return Err(AllocError::UnknownPointer { addr });
        };
        if n == 0 {
            self.release(ptr);
            return Ok(ptr::null_mut());
        }
        if n > MAX_REQUEST {
            return Err(AllocError::OutOfMemory(MapError {
                len: n,
                errno: libc::ENOMEM,
            }));
        }
        let old_size = self.registry(class).get(index).block_size();
        if align_up(n, ALIGNMENT) <= old_size {
            // Shrinking, or growth within the same bin/payload, is free.
            self.stats.resizes_in_place += 1;
            return Ok(ptr);
        }
        let new_ptr = self.allocate(n)?;
        let copy = old_size.min(n);
        // SAFETY: the source is a live block of old_size bytes, the
        // destination a fresh block of at least n bytes in another zone;
        // the ranges cannot overlap and copy fits both.
        unsafe { ptr::copy_nonoverlapping(ptr as *const u8, new_ptr, copy) };
        self.release(ptr);
        self.stats.resizes_moved += 1;
        Ok(new_ptr)
    }

    /// Live zones in `class`'s collection.
    #[must_use]
    pub fn zone_count(&self, class: SizeClass) -> usize {
        self.registry(class).len()
    }

    /// Free blocks across `class`'s slab zones; always 0 for Large.
    #[must_use]
    pub fn total_free_blocks(&self, class: SizeClass) -> usize {
        match class {
            SizeClass::Large => 0,
            class => self.registry(class).total_free_blocks(),
        }
    }

    /// Class of the zone owning `ptr`, if any.
    #[must_use]
    pub fn owner_class(&self, ptr: *const u8) -> Option<SizeClass> {
        self.find_owner(ptr as usize).map(|(class, _)| class)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    pub(crate) fn registry(&self, class: SizeClass) -> &ZoneRegistry {
        match class {
            SizeClass::Tiny => &self.tiny,
            SizeClass::Small => &self.small,
            SizeClass::Large => &self.large,
        }
    }

    fn registry_mut(&mut self, class: SizeClass) -> &mut ZoneRegistry {
        match class {
            SizeClass::Tiny => &mut self.tiny,
            SizeClass::Small => &mut self.small,
            SizeClass::Large => &mut self.large,
        }
    }

    fn min_blocks(&self, class: SizeClass) -> usize {
        let knob = match class {
            SizeClass::Tiny => self.tiny_min_blocks,
            SizeClass::Small => self.small_min_blocks,
            SizeClass::Large => 1,
        };
        knob.max(1)
    }

    fn find_owner(&self, addr: usize) -> Option<(SizeClass, usize)> {
        for class in [SizeClass::Tiny, SizeClass::Small, SizeClass::Large] {
            if let Some(index) = self.registry(class).find_owner(addr) {
                return Some((class, index));
            }
        }
        None
    }
}
