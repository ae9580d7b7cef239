//! Deterministic allocate/release/resize churn holding the core invariants
//! at every step. Deterministic, bounded, and intentionally simple: this is
//! invariant pressure, not a fuzz campaign.

use std::ptr;

use zonemalloc_core::{ALIGNMENT, Heap, ReleaseOutcome, SizeClass};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range_usize(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

#[derive(Clone, Copy)]
struct Slot {
    ptr: *mut u8,
    size: usize,
    pattern: u8,
}

fn fill(slot: &Slot) {
    // SAFETY: slot.ptr is a live allocation of at least slot.size bytes.
    unsafe { ptr::write_bytes(slot.ptr, slot.pattern, slot.size) };
}

fn verify(slot: &Slot, seed: u64, step: usize) {
    // SAFETY: slot.ptr is a live allocation of at least slot.size bytes.
    let bytes = unsafe { std::slice::from_raw_parts(slot.ptr, slot.size) };
    assert!(
        bytes.iter().all(|&b| b == slot.pattern),
        "seed={seed} step={step}: pattern 0x{:02x} corrupted at {:p} ({} bytes)",
        slot.pattern,
        slot.ptr,
        slot.size
    );
}

#[test]
fn deterministic_churn_holds_alignment_patterns_and_zone_state() {
    const SEEDS: [u64; 4] = [1, 2, 3, 4];
    const STEPS: usize = 2_000;
    const SLOTS: usize = 32;
    const MAX_SIZE: usize = 10_000; // spans tiny, small, and large

    for seed in SEEDS {
        let mut heap = Heap::new(8, 8);
        let mut rng = XorShift64::new(seed);
        let mut slots: [Option<Slot>; SLOTS] = [None; SLOTS];

        for step in 0..STEPS {
            let op = rng.gen_range_usize(0, 99);
            let idx = rng.gen_range_usize(0, SLOTS - 1);

            match op {
                // allocate (biased)
                0..=49 => {
                    if slots[idx].is_some() {
                        continue;
                    }
                    let size = rng.gen_range_usize(1, MAX_SIZE);
                    let ptr = heap
                        .allocate(size)
                        .unwrap_or_else(|e| panic!("seed={seed} step={step}: allocate: {e}"));
                    assert_eq!(
                        ptr as usize % ALIGNMENT,
                        0,
                        "seed={seed} step={step}: misaligned pointer"
                    );
                    let slot = Slot {
                        ptr,
                        size,
                        pattern: (rng.next_u64() & 0xFF) as u8,
                    };
                    fill(&slot);
                    slots[idx] = Some(slot);
                }
                // release
                50..=74 => {
                    let Some(slot) = slots[idx].take() else {
                        assert_eq!(
                            heap.release(ptr::null_mut()),
                            ReleaseOutcome::Null,
                            "seed={seed} step={step}: null release must be a no-op"
                        );
                        continue;
                    };
                    verify(&slot, seed, step);
                    let outcome = heap.release(slot.ptr);
                    assert!(
                        matches!(
                            outcome,
                            ReleaseOutcome::Freed
                                | ReleaseOutcome::FreedAndTrimmed
                                | ReleaseOutcome::UnmappedLarge
                        ),
                        "seed={seed} step={step}: unexpected release outcome {outcome:?}"
                    );
                }
                // resize
                75..=89 => {
                    let Some(slot) = slots[idx] else {
                        continue;
                    };
                    verify(&slot, seed, step);
                    let new_size = rng.gen_range_usize(1, MAX_SIZE);
                    let new_ptr = heap
                        .resize(slot.ptr, new_size)
                        .unwrap_or_else(|e| panic!("seed={seed} step={step}: resize: {e}"));
                    let prefix = Slot {
                        ptr: new_ptr,
                        size: slot.size.min(new_size),
                        pattern: slot.pattern,
                    };
                    verify(&prefix, seed, step);
                    let resized = Slot {
                        ptr: new_ptr,
                        size: new_size,
                        pattern: slot.pattern,
                    };
                    fill(&resized);
                    slots[idx] = Some(resized);
                }
                // verify every live slot
                _ => {
                    for slot in slots.iter().flatten() {
                        verify(slot, seed, step);
                    }
                }
            }

            let live = slots.iter().flatten().count() as u64;
            let stats = heap.stats();
            assert!(
                stats.allocations >= stats.releases,
                "seed={seed} step={step}: more releases than allocations"
            );
            assert_eq!(
                stats.allocations - stats.releases,
                live,
                "seed={seed} step={step}: live slots must match allocation counters"
            );
            assert_eq!(
                stats.double_frees, 0,
                "seed={seed} step={step}: churn never double frees"
            );
        }

        // Drain everything; all zones must trim away.
        for slot in slots.iter_mut().filter_map(Option::take) {
            verify(&slot, seed, STEPS);
            heap.release(slot.ptr);
        }
        for class in [SizeClass::Tiny, SizeClass::Small, SizeClass::Large] {
            assert_eq!(
                heap.zone_count(class),
                0,
                "seed={seed}: class {class:?} zones must all trim after full drain"
            );
        }
        assert_eq!(heap.stats().live_zones(), 0, "seed={seed}: zone counters");
    }
}
