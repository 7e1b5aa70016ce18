//! cuckoo-map: a d-ary cuckoo hash map with bit-packed occupancy, a
//! pluggable per-table hasher and a pluggable allocator.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a unique-key map with O(1) worst-case lookups (one probe per
//!   table) and amortized O(1) inserts, built from small layers that can be
//!   checked independently.
//! - Layers:
//!   - ExistenceBits: one occupancy bit per slot, LSB first within a byte.
//!   - TableArray<K, V, A>: `d` equal table regions carved out of one
//!     allocator-backed arena; moves entries in and out of flattened slot
//!     addresses and keeps the live count in step with the bits.
//!   - RawCuckooMap<K, V, H, A>: placement and growth. Runs bounded
//!     displacement chains, grows when they fail or when the load target is
//!     reached, and relocates entries whose route changed.
//!   - CuckooMap<K, V, H, A>: public API. Looks up before inserting so keys
//!     stay unique, and hands out epoch-checked `Slot`s.
//!
//! Constraints
//! - Single-threaded: the map is `Send` but not `Sync`.
//! - `capacity_per_table` is always a positive multiple of 8, so every
//!   table region starts on a byte of the existence bits.
//! - Every live entry in table `t` sits at offset `route(key, t)`; no other
//!   placement is ever observable between operations.
//! - Duplicate inserts never fail: they leave the map unchanged and report
//!   the existing entry.
//!
//! Hashing
//! - `TableHasher<K>` hashes a key for a given table index. `Seeded<S>`
//!   derives it from any `BuildHasher` by hashing the table index before the
//!   key; plain closures `Fn(&K, usize) -> u64` work as well.
//! - Routes are recomputed during growth, so hashers must be deterministic.
//!
//! Growth
//! - Every grow multiplies the per-table capacity by the growth factor and
//!   rounds up to a multiple of 8. Existing entries keep their
//!   `(table, offset)` address; only those whose route changed are moved.
//! - A displacement chain that exhausts its budget grows the map and
//!   retries. Growth nests at most `max_grow_depth` levels per operation;
//!   beyond that the map panics with "capacity exhausted", which only a
//!   hasher that sends too many keys to the same offsets can cause.
//!
//! Reentrancy
//! - While an entry is held outside the tables, user `Eq`/hash code must not
//!   reach back into the same map. Debug builds enforce this with a busy
//!   flag around lookups and mutations; release builds carry no check.
//!
//! Notes and non-goals
//! - No multimap semantics and no iteration order guarantee.
//! - Slots do not identify their map; resolving one against another map is
//!   a logic error that yields unspecified (but memory-safe) results.

pub mod config;
pub mod error;
pub mod iter;
pub mod router;

mod bitset;
mod cuckoo_map;
mod cuckoo_map_proptest;
mod raw_cuckoo_map;
mod reentrancy;
mod tables;

// Public surface
pub use config::Config;
pub use cuckoo_map::{CuckooMap, Slot};
pub use error::{Error, Result};
pub use router::{Seeded, TableHasher};

/// Allocator API re-exported for naming `A` without a direct dependency.
pub use allocator_api2::alloc::{Allocator, Global};
