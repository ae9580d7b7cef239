//! Human-readable allocator state report.
//!
//! Groups live zones by class label (TINY / SMALL / LARGE), walks each
//! class in ascending payload-base order, and prints one line per in-use
//! block. Slab blocks report their bin size, large blocks their exact
//! payload size, and the final total is the exact sum of both.

use std::io::{self, Write};

use crate::heap::Heap;
use crate::size_class::SizeClass;

/// Writes the report to `out` and returns the total of in-use block sizes.
pub fn dump<W: Write>(heap: &Heap, out: &mut W) -> io::Result<usize> {
    let mut total = 0usize;
    for class in [SizeClass::Tiny, SizeClass::Small, SizeClass::Large] {
        let registry = heap.registry(class);
        for index in registry.sorted_by_base() {
            let zone = registry.get(index);
            writeln!(out, "{} : {:#x}", class.label(), zone.payload_start())?;
            writeln!(
                out,
                "  [cap={} free={} bin={}]",
                zone.capacity(),
                zone.free_count(),
                zone.block_size()
            )?;
            for (block, used) in zone.occupancy().iter().enumerate() {
                if !used {
                    continue;
                }
                let (start, end) = zone.block_range(block);
                writeln!(out, "{start:#x} - {end:#x} : {} bytes", zone.block_size())?;
                total += zone.block_size();
            }
        }
    }
    writeln!(out, "Total : {total} bytes")?;
    Ok(total)
}

/// Prints the report to standard output and returns the total; write
/// errors are swallowed and reported as a zero total.
pub fn dump_stdout(heap: &Heap) -> usize {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    dump(heap, &mut lock).unwrap_or(0)
}
