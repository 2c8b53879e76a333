//! CoalescedHashMap: probe, insert, erase and growth over the slot storage.

use crate::cursor::Cursor;
use crate::error::Error;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::slots::{grown_capacity, Entry, Slots};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

/// A hash map using early-insert coalesced hashing with a cellar.
///
/// Inserting a key that is already live leaves the stored value untouched.
/// Erased entries are tombstoned in place and only reclaimed when the table
/// grows.
#[derive(Clone)]
pub struct CoalescedHashMap<K, V, S = RandomState> {
    hasher: S,
    pub(crate) slots: Slots<K, V>,
    len: usize,
}

impl<K, V> CoalescedHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S> Default for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            slots: Slots::default(),
            len: 0,
        }
    }

    /// Builds a map by inserting each pair in order; the first value seen
    /// for a key wins.
    pub fn from_iter_with_hasher<I>(iter: I, hasher: S) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::with_hasher(hasher);
        map.extend(iter);
        map
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, live or not. Never shrinks except through `clear`.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Index of the live slot holding `q`, walking the chain from its home
    /// slot. An unoccupied slot ends the search.
    fn find_index<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.slots.capacity() == 0 {
            return None;
        }
        let mut cursor = Some(self.slots.home_slot(hash));
        while let Some(index) = cursor {
            let entry = self.slots.entry(index)?;
            if entry.hash == hash && entry.key.borrow() == q {
                return (!self.slots.tombstoned[index]).then_some(index);
            }
            cursor = self.slots.next[index];
        }
        None
    }

    /// Inserts without the duplicate-overwrite of `std`; returns the slot
    /// now holding the key and whether a live entry was created or revived.
    fn insert_hashed(&mut self, hash: u64, key: K, value: V) -> (usize, bool) {
        if self.slots.needs_growth() {
            self.grow();
        }
        let home = self.slots.home_slot(hash);
        let mut index = home;
        while self.slots.occupied[index] {
            let matches = self
                .slots
                .entry(index)
                .is_some_and(|e| e.hash == hash && e.key == key);
            if matches {
                if !self.slots.tombstoned[index] {
                    return (index, false);
                }
                if let Some(entry) = self.slots.entry_mut(index) {
                    entry.value = value;
                }
                self.slots.tombstoned[index] = false;
                self.len += 1;
                return (index, true);
            }
            index = match self.slots.next[index] {
                Some(next) => next,
                None => {
                    let free = self.slots.take_free_slot();
                    log::trace!("chain from home slot {home} extended into slot {free}");
                    free
                }
            };
        }
        self.slots.occupy(index, Entry { key, value, hash });
        self.len += 1;
        if index != home {
            self.slots.splice_after(home, index);
        }
        (index, true)
    }

    /// Rebuilds the table at `2n + 7` slots, keeping only live entries.
    fn grow(&mut self) {
        let old_capacity = self.slots.capacity();
        let new_capacity = grown_capacity(old_capacity);
        let old = core::mem::replace(&mut self.slots, Slots::allocate(new_capacity));
        let reclaimed = old.occupied_count() - self.len;
        let carried = self.len;
        self.len = 0;
        for entry in old.into_live_entries() {
            self.insert_hashed(entry.hash, entry.key, entry.value);
        }
        debug_assert_eq!(self.len, carried);
        log::debug!(
            "coalesced map grew from {old_capacity} to {new_capacity} slots \
             ({carried} live entries, {reclaimed} tombstones reclaimed)"
        );
    }

    /// Inserts `key -> value` if `key` is absent or erased.
    ///
    /// Returns `false` and leaves the existing value untouched when `key` is
    /// already live.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        self.insert_hashed(hash, key, value).1
    }

    /// Tombstones `q`'s entry. Returns `false` if there was no live entry.
    pub fn erase<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        match self.find_index(hash, q) {
            Some(index) => {
                self.slots.tombstoned[index] = true;
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    /// A cursor at `q`'s entry, or at [`end`](Self::end) if absent.
    pub fn find<Q>(&self, q: &Q) -> Cursor<&Self>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let index = self.find_index(hash, q).unwrap_or(self.capacity());
        Cursor::new(self, index)
    }

    pub fn find_mut<Q>(&mut self, q: &Q) -> Cursor<&mut Self>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let index = self.find_index(hash, q).unwrap_or(self.capacity());
        Cursor::new(self, index)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_index(self.make_hash(q), q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(self.make_hash(q), q)?;
        self.slots.entry(index).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.find_index(self.make_hash(q), q)?;
        self.slots.entry_mut(index).map(|e| &mut e.value)
    }

    /// Checked lookup: fails with [`Error::KeyNotFound`] if `q` is absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(Error::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(Error::KeyNotFound)
    }

    /// Returns the value for `key`, inserting `V::default()` first if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let hash = self.make_hash(&key);
        let index = match self.find_index(hash, &key) {
            Some(index) => index,
            // The slot comes from after any growth the insert triggered.
            None => self.insert_hashed(hash, key, V::default()).0,
        };
        match self.slots.entry_mut(index) {
            Some(entry) => &mut entry.value,
            None => unreachable!("slot {index} holds a live entry"),
        }
    }

    pub fn begin(&self) -> Cursor<&Self> {
        Cursor::new(self, self.slots.next_live(0))
    }

    pub fn end(&self) -> Cursor<&Self> {
        Cursor::new(self, self.capacity())
    }

    pub fn begin_mut(&mut self) -> Cursor<&mut Self> {
        let index = self.slots.next_live(0);
        Cursor::new(self, index)
    }
}

impl<K, V, S> CoalescedHashMap<K, V, S> {
    /// Drops every entry and releases the slot arrays.
    pub fn clear(&mut self) {
        let released = self.slots.capacity();
        self.slots = Slots::default();
        self.len = 0;
        log::debug!("coalesced map cleared, released {released} slots");
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots, self.len)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.slots, self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Walks every structural invariant; panics on the first violation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self)
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let s = &self.slots;
        let occupied = s.occupied.iter().filter(|&&o| o).count();
        assert_eq!(s.occupied_count(), occupied, "occupied count drifted");
        let live = (0..s.capacity()).filter(|&i| s.is_live_at(i)).count();
        assert_eq!(self.len, live, "len does not match live slots");
        for i in 0..s.capacity() {
            assert_eq!(s.occupied[i], s.entries[i].is_some(), "slot {i} flag mismatch");
            if !s.occupied[i] {
                assert!(!s.tombstoned[i], "unoccupied slot {i} is tombstoned");
            }
            if let Some(next) = s.next[i] {
                assert!(s.occupied[next], "link {i} -> {next} points at an empty slot");
            }
            if let Some(entry) = s.entry(i) {
                assert_eq!(entry.hash, self.hasher.hash_one(&entry.key));
                let chain = self.chain(s.home_slot(entry.hash));
                assert!(chain.contains(&i), "slot {i} unreachable from its home");
                let copies = chain
                    .iter()
                    .filter(|&&j| s.entry(j).is_some_and(|e| e.key == entry.key))
                    .count();
                assert_eq!(copies, 1, "slot {i} key appears {copies} times in its chain");
            }
        }
    }

    /// Slot indices visited from `home` until an empty slot or the chain end.
    #[cfg(test)]
    pub(crate) fn chain(&self, home: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = Some(home);
        while let Some(i) = cursor {
            if !self.slots.occupied[i] || out.contains(&i) {
                break;
            }
            out.push(i);
            cursor = self.slots.next[i];
        }
        out
    }
}

impl<K, V, S> fmt::Debug for CoalescedHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    /// Panics if `key` is absent; use [`CoalescedHashMap::at`] for a `Result`.
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("key not found in CoalescedHashMap"),
        }
    }
}

impl<K, V, S> Extend<(K, V)> for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for CoalescedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_iter_with_hasher(iter, S::default())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for CoalescedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'a, K, V, S> IntoIterator for &'a CoalescedHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut CoalescedHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for CoalescedHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.slots, self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl core::hash::Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // every key lands on home slot 0
    }

    // Folds the key bytes into three home buckets.
    #[derive(Clone, Default)]
    struct SkewedBuildHasher;
    #[derive(Default)]
    struct SkewedHasher(u64);
    impl BuildHasher for SkewedBuildHasher {
        type Hasher = SkewedHasher;
        fn build_hasher(&self) -> Self::Hasher {
            SkewedHasher::default()
        }
    }
    impl core::hash::Hasher for SkewedHasher {
        fn write(&mut self, bytes: &[u8]) {
            for b in bytes {
                self.0 = self.0.wrapping_mul(31).wrapping_add(*b as u64);
            }
        }
        fn finish(&self) -> u64 {
            self.0 % 3
        }
    }

    fn collide() -> CoalescedHashMap<&'static str, i32, ConstBuildHasher> {
        CoalescedHashMap::with_hasher(ConstBuildHasher)
    }

    /// Invariant: the first insert grows an empty table to 7 slots with a
    /// 6-slot address region.
    #[test]
    fn first_insert_allocates() {
        let mut m: CoalescedHashMap<u32, u32> = CoalescedHashMap::new();
        assert_eq!(m.capacity(), 0);
        assert!(m.insert(1, 10));
        assert_eq!(m.capacity(), 7);
        assert_eq!(m.slots.address_len(), 6);
        m.check_invariants();
    }

    /// Invariant: a live duplicate insert is a no-op and keeps the old value.
    #[test]
    fn insert_does_not_overwrite() {
        let mut m: CoalescedHashMap<String, i32> = CoalescedHashMap::new();
        assert!(m.insert("k".to_string(), 1));
        assert!(!m.insert("k".to_string(), 2));
        assert_eq!(m.get("k"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: colliding keys are chained head-after-home, taking cellar
    /// slots from the top of the table downward.
    #[test]
    fn collisions_splice_after_home() {
        let mut m = collide();
        for (i, k) in ["a", "b", "c", "d", "e", "f"].into_iter().enumerate() {
            m.insert(k, i as i32);
        }
        assert_eq!(m.capacity(), 7, "six entries fit below the load threshold");
        assert_eq!(m.chain(0), vec![0, 2, 3, 4, 5, 6]);

        let slot_of = |k: &str| m.find(k).index();
        assert_eq!(slot_of("a"), 0);
        assert_eq!(slot_of("b"), 6);
        assert_eq!(slot_of("c"), 5);
        assert_eq!(slot_of("f"), 2);

        // Storage order, not insertion order.
        let order: Vec<_> = m.keys().copied().collect();
        assert_eq!(order, vec!["a", "f", "e", "d", "c", "b"]);
        m.check_invariants();
    }

    /// Invariant: erase tombstones in place; the slot stays occupied and the
    /// chain still reaches entries behind it.
    #[test]
    fn erase_leaves_tombstone_in_chain() {
        let mut m = collide();
        for k in ["a", "b", "c"] {
            m.insert(k, 1);
        }
        let before = m.slots.occupied_count();
        assert!(m.erase("a"));
        assert!(!m.erase("a"), "second erase is a no-op");
        assert_eq!(m.len(), 2);
        assert_eq!(m.slots.occupied_count(), before);
        assert!(m.slots.tombstoned[0]);
        assert!(m.contains_key("b"));
        assert!(m.contains_key("c"));
        assert!(!m.contains_key("a"));
        m.check_invariants();
    }

    /// Invariant: re-inserting a tombstoned key revives the same slot with the
    /// new value and consumes no extra slot.
    #[test]
    fn reinsert_revives_tombstone() {
        let mut m = collide();
        m.insert("a", 1);
        m.insert("b", 2);
        let slot = m.find("b").index();
        m.erase("b");
        let occupied = m.slots.occupied_count();
        assert!(m.insert("b", 20));
        assert_eq!(m.find("b").index(), slot);
        assert_eq!(m.slots.occupied_count(), occupied);
        assert_eq!(m.at("b"), Ok(&20));
        assert_eq!(m.len(), 2);
        m.check_invariants();
    }

    /// Invariant: tombstones count toward the load threshold and are dropped
    /// by the next growth.
    #[test]
    fn growth_reclaims_tombstones() {
        let mut m: CoalescedHashMap<u32, u32> = CoalescedHashMap::new();
        for k in 0..6 {
            m.insert(k, k);
        }
        for k in 0..3 {
            m.erase(&k);
        }
        assert_eq!(m.capacity(), 7);
        assert_eq!(m.slots.occupied_count(), 6);

        m.insert(100, 100);
        assert_eq!(m.capacity(), 21);
        assert_eq!(m.slots.occupied_count(), 4);
        assert_eq!(m.len(), 4);
        assert!(m.slots.tombstoned.iter().all(|t| !t));
        for k in [3, 4, 5, 100] {
            assert_eq!(m.get(&k), Some(&k));
        }
        m.check_invariants();
    }

    /// Invariant: a lookup stops at the first unoccupied slot of a chain.
    #[test]
    fn find_on_empty_home_is_absent() {
        let mut m: CoalescedHashMap<u32, u32> = CoalescedHashMap::new();
        assert!(m.find(&3).is_end());
        m.insert(1, 1);
        let missing = (2u32..100).find(|k| {
            let home = m.slots.home_slot(m.hasher().hash_one(k));
            !m.slots.occupied[home]
        });
        let missing = missing.expect("some key hashes to an empty home slot");
        assert!(!m.contains_key(&missing));
        assert_eq!(m.find(&missing), m.end());
    }

    /// Invariant: bracket access inserts a default, returns the stored slot
    /// even when the insert grows the table, and leaves live values alone.
    #[test]
    fn get_or_insert_default_across_growth() {
        let mut m: CoalescedHashMap<u32, Vec<u32>> = CoalescedHashMap::new();
        for k in 0..5 {
            m.get_or_insert_default(k).push(k);
        }
        let cap = m.capacity();
        m.get_or_insert_default(5).push(5);
        m.get_or_insert_default(6).push(6);
        assert!(m.capacity() > cap, "seventh key forces growth");
        m.get_or_insert_default(6).push(60);
        assert_eq!(m.at(&6), Ok(&vec![6, 60]));
        for k in 0..6 {
            assert_eq!(m.at(&k), Ok(&vec![k]));
        }
        m.check_invariants();
    }

    /// Invariant: iteration yields each live key exactly once and `iter_mut`
    /// writes are visible through lookups.
    #[test]
    fn iteration_and_mutation() {
        let mut m: CoalescedHashMap<String, i32> = CoalescedHashMap::new();
        for (i, k) in ["k1", "k2", "k3", "k4"].iter().enumerate() {
            m.insert((*k).to_string(), i as i32);
        }
        m.erase("k2");

        let seen: BTreeSet<String> = m.keys().cloned().collect();
        let expected: BTreeSet<String> =
            ["k1", "k3", "k4"].iter().map(|s| (*s).to_string()).collect();
        assert_eq!(seen, expected);
        assert_eq!(m.iter().len(), 3);

        for (_k, v) in m.iter_mut() {
            *v += 10;
        }
        assert_eq!(m["k1"], 10);
        assert_eq!(m["k3"], 12);
        assert_eq!(m["k4"], 13);
    }

    /// Invariant: repeated fill-then-empty rounds under heavy collisions keep
    /// chains, counters and the tombstone accounting consistent.
    #[test]
    fn tombstone_churn_with_skewed_hasher() {
        let mut m: CoalescedHashMap<u32, u32, SkewedBuildHasher> =
            CoalescedHashMap::with_hasher(SkewedBuildHasher);
        for round in 0..50u32 {
            let base = round * 7;
            for k in base..base + 40 {
                m.insert(k, round);
                m.check_invariants();
            }
            assert_eq!(m.len(), 40);
            for k in base..base + 40 {
                assert_eq!(m.at(&k), Ok(&round), "round {round} key {k}");
            }
            for k in base..base + 40 {
                assert!(m.erase(&k));
                m.check_invariants();
            }
            assert!(m.is_empty());
            assert_eq!(m.begin(), m.end());
        }
    }

    /// Invariant: `clear` releases storage and the map behaves as new.
    #[test]
    fn clear_then_reuse() {
        let mut m: CoalescedHashMap<u32, u32> = (0..50).map(|k| (k, k)).collect();
        m.clear();
        assert_eq!(m.len(), 0);
        assert_eq!(m.capacity(), 0);
        assert_eq!(m.begin(), m.end());
        assert!(m.insert(7, 70));
        assert_eq!(m.capacity(), 7);
        assert_eq!(m.at(&7), Ok(&70));
        m.check_invariants();
    }

    /// Invariant: equality compares key/value sets, not slot layout.
    #[test]
    fn equality_ignores_layout() {
        let a: CoalescedHashMap<u32, u32> = (0..20).map(|k| (k, k * 2)).collect();
        let b: CoalescedHashMap<u32, u32> = (0..20).rev().map(|k| (k, k * 2)).collect();
        assert_eq!(a, b);
        let mut c = b.clone();
        c.erase(&3);
        assert_ne!(a, c);
        assert_eq!(format!("{:?}", CoalescedHashMap::<u32, u32>::new()), "{}");
    }
}
