//! coalesced-hashmap: a single-threaded hash map built on early-insert
//! coalesced hashing with a cellar.
//!
//! Internal Design:
//!
//! Summary
//! - All entries live in one slot region made of four parallel arrays:
//!   entries, `next` links, `occupied` flags and `tombstoned` flags.
//! - Layers:
//!   - `Slots<K, V>`: storage, the address/cellar split, and the downward
//!     free-slot cursor that feeds collisions.
//!   - `CoalescedHashMap<K, V, S>`: probing, insert, erase, growth, and
//!     the convenience surface (`at`, `get_or_insert_default`, ranges).
//!   - `Cursor<M>` and the iterators: storage-order walks over live slots.
//!
//! Addressing
//! - The first `max(1, capacity * 86 / 100)` slots are the address region;
//!   a key's home slot is `hash % address_len`. The rest is the cellar,
//!   reached only through `next` links.
//! - On collision, the new slot is taken from the free cursor (scanning down
//!   from the top of the table) and spliced directly after the home slot,
//!   so chains coalesce and the newest collision is visited first.
//!
//! Deletion and growth
//! - `erase` only sets the tombstone flag; the slot keeps its entry and link
//!   so chains through it stay intact. Re-inserting the same key revives it.
//! - When occupied slots (tombstones included) reach 4/5 of capacity, the
//!   next insert rebuilds the table at `2n + 7` slots, reinserting only live
//!   entries in storage order. Each entry keeps its `u64` hash, so growth
//!   never calls back into `K: Hash`.
//!
//! Insert semantics
//! - Inserting a key that is already live is a no-op: the stored value is
//!   kept. This differs from `std::collections::HashMap::insert`.
//!
//! Constraints
//! - Single-threaded; no interior mutability, no atomics.
//! - Cursors and iterators borrow the map, so a rehash or `clear` while one
//!   is alive does not compile.
//! - No shrinking: capacity only drops when `clear` releases the arrays.
//!
//! ```
//! use coalesced_hashmap::{CoalescedHashMap, Error};
//!
//! let mut m = CoalescedHashMap::from([("a", 1), ("b", 2), ("a", 3)]);
//! assert_eq!(m.len(), 2);
//! assert_eq!(m.at("a"), Ok(&1));
//!
//! m.erase("a");
//! assert_eq!(m.at("a"), Err(Error::KeyNotFound));
//! *m.get_or_insert_default("c") += 5;
//! assert_eq!(m["c"], 5);
//! ```

mod coalesced_hash_map;
mod coalesced_hash_map_proptest;
pub mod cursor;
mod error;
pub mod iter;
mod slots;

// Public surface
pub use coalesced_hash_map::CoalescedHashMap;
pub use cursor::Cursor;
pub use error::Error;
