//! # zonemalloc-core
//!
//! Zone-based dynamic memory allocator engine.
//!
//! The engine manages anonymous OS mappings ("zones") and carves them into
//! reusable blocks:
//! - tiny requests (up to 128 bytes) and small requests (up to 4096 bytes)
//!   share slab zones subdivided into fixed-size bins,
//! - large requests each receive a dedicated mapping, released on free.
//!
//! [`Heap`] is an explicit context value with no hidden globals; embedders
//! own it and pass it by reference. The companion `zonemalloc-abi` crate
//! wraps one instance in a process-wide singleton to stand in for the
//! platform allocator. The engine is single-threaded by design: callers
//! serialize access (the abi crate uses a mutex).

pub mod align;
pub mod dump;
pub mod heap;
pub mod mapping;
pub mod registry;
pub mod size_class;
pub mod stats;
pub mod zone;

pub use align::ALIGNMENT;
pub use dump::{dump, dump_stdout};
pub use heap::{AllocError, Heap, ReleaseOutcome};
pub use mapping::MapError;
pub use size_class::{SMALL_MAX, SizeClass, TINY_MAX, classify, pick_bin};
pub use stats::HeapStats;
pub use zone::{BlockFreeResult, Zone};
