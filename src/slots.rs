//! Slot storage: four parallel arrays plus the address/cellar split.
//!
//! Every slot index refers to the same position in `entries`, `next`,
//! `occupied` and `tombstoned`. The first `address_len` slots form the
//! address region (reachable by hashing); the remainder is the cellar,
//! reachable only by following `next` links.

use core::iter::{FilterMap, Zip};
use std::vec;

/// Growth is triggered once `occupied_count >= capacity * 4 / 5`.
pub(crate) const MAX_LOAD_NUMERATOR: usize = 4;
pub(crate) const MAX_LOAD_DENOMINATOR: usize = 5;

/// Share of the slots that are directly addressable: 86 / 100.
pub(crate) const ADDRESS_NUMERATOR: usize = 86;
pub(crate) const ADDRESS_DENOMINATOR: usize = 100;

/// Capacity after growing from `capacity` slots.
#[inline]
pub(crate) fn grown_capacity(capacity: usize) -> usize {
    2 * capacity + 7
}

/// The single liveness predicate shared by lookups, cursors and iterators.
#[inline]
pub(crate) fn is_live(occupied: bool, tombstoned: bool) -> bool {
    occupied && !tombstoned
}

#[derive(Debug, Clone)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct Slots<K, V> {
    // `entries[i].is_some()` iff `occupied[i]`.
    pub(crate) entries: Vec<Option<Entry<K, V>>>,
    pub(crate) next: Vec<Option<usize>>,
    pub(crate) occupied: Vec<bool>,
    pub(crate) tombstoned: Vec<bool>,
    address_len: usize,
    occupied_count: usize,
    // Only moves downward between allocations.
    free_cursor: usize,
}

impl<K, V> Default for Slots<K, V> {
    fn default() -> Self {
        Self::allocate(0)
    }
}

impl<K, V> Slots<K, V> {
    /// Fresh storage with every flag cleared and every link empty.
    pub(crate) fn allocate(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        let address_len = (capacity * ADDRESS_NUMERATOR / ADDRESS_DENOMINATOR).max(1);
        Self {
            entries,
            next: vec![None; capacity],
            occupied: vec![false; capacity],
            tombstoned: vec![false; capacity],
            address_len,
            occupied_count: 0,
            free_cursor: capacity.saturating_sub(1),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn address_len(&self) -> usize {
        self.address_len
    }

    /// Occupied slots, live or tombstoned.
    #[inline]
    pub(crate) fn occupied_count(&self) -> usize {
        self.occupied_count
    }

    #[inline]
    pub(crate) fn needs_growth(&self) -> bool {
        self.occupied_count * MAX_LOAD_DENOMINATOR >= self.capacity() * MAX_LOAD_NUMERATOR
    }

    /// Home slot for `hash`. Only meaningful when `capacity() > 0`.
    #[inline]
    pub(crate) fn home_slot(&self, hash: u64) -> usize {
        (hash % self.address_len() as u64) as usize
    }

    #[inline]
    pub(crate) fn is_live_at(&self, index: usize) -> bool {
        is_live(self.occupied[index], self.tombstoned[index])
    }

    /// The entry stored at `index`, if the slot is occupied.
    #[inline]
    pub(crate) fn entry(&self, index: usize) -> Option<&Entry<K, V>> {
        if self.occupied[index] {
            self.entries[index].as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<K, V>> {
        if self.occupied[index] {
            self.entries[index].as_mut()
        } else {
            None
        }
    }

    /// First live index at or after `from`, or `capacity()` if there is none.
    pub(crate) fn next_live(&self, from: usize) -> usize {
        let capacity = self.capacity();
        let mut index = from.min(capacity);
        while index < capacity && !self.is_live_at(index) {
            index += 1;
        }
        index
    }

    /// Hands out the highest unoccupied slot not yet passed by the free cursor.
    ///
    /// The load-factor check keeps at least one unoccupied slot below the
    /// cursor whenever this is called; every slot above it is occupied.
    pub(crate) fn take_free_slot(&mut self) -> usize {
        while self.occupied[self.free_cursor] {
            self.free_cursor = self
                .free_cursor
                .checked_sub(1)
                .expect("free slot scan ran past the start of the table");
        }
        self.free_cursor
    }

    /// Stores `entry` in the unoccupied slot `index`.
    pub(crate) fn occupy(&mut self, index: usize, entry: Entry<K, V>) {
        debug_assert!(!self.occupied[index]);
        self.entries[index] = Some(entry);
        self.occupied[index] = true;
        self.occupied_count += 1;
    }

    /// Links `index` directly after `home`, ahead of the rest of the chain.
    pub(crate) fn splice_after(&mut self, home: usize, index: usize) {
        self.next[index] = self.next[home];
        self.next[home] = Some(index);
    }

    /// Consumes the storage, yielding the live entries in slot order.
    pub(crate) fn into_live_entries(self) -> LiveEntries<K, V> {
        self.entries
            .into_iter()
            .zip(self.occupied.into_iter().zip(self.tombstoned))
            .filter_map(live_entry as fn(Flagged<K, V>) -> Option<Entry<K, V>>)
    }
}

pub(crate) type Flagged<K, V> = (Option<Entry<K, V>>, (bool, bool));

pub(crate) type LiveEntries<K, V> = FilterMap<
    Zip<vec::IntoIter<Option<Entry<K, V>>>, Zip<vec::IntoIter<bool>, vec::IntoIter<bool>>>,
    fn(Flagged<K, V>) -> Option<Entry<K, V>>,
>;

fn live_entry<K, V>((entry, (occupied, tombstoned)): Flagged<K, V>) -> Option<Entry<K, V>> {
    if is_live(occupied, tombstoned) {
        entry
    } else {
        None
    }
}
