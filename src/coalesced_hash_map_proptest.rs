#![cfg(test)]

// Property tests for CoalescedHashMap kept inside the crate so they can run
// the structural invariant audit after every operation.

use crate::{CoalescedHashMap, Error};
use core::hash::BuildHasher;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations: indices shrink to earlier keys, pool length
// shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Erase(usize),
    Find(usize),
    At(usize),
    OrDefault(usize, i32),
    Contains(String),
    Iterate,
    Clear,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            3 => idx.clone().prop_map(OpI::Erase),
            2 => idx.clone().prop_map(OpI::Find),
            2 => idx.clone().prop_map(OpI::At),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::OrDefault(i, d)),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Runs one scenario against `sut`, with std's HashMap as the model.
// Model semantics: insert keeps the first live value (`entry().or_insert`).
fn run_scenario<S: BuildHasher>(
    mut sut: CoalescedHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let inserted = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already, "insert reports new entries only");
                model.entry(k).or_insert(v);
            }
            OpI::Erase(i) => {
                let k = key_from(pool, i);
                let erased = sut.erase(&k);
                prop_assert_eq!(erased, model.remove(&k).is_some());
                prop_assert!(sut.find(&k) == sut.end());
            }
            OpI::Find(i) => {
                let k = key_from(pool, i);
                let c = sut.find(&k);
                match model.get(&k) {
                    Some(v) => {
                        prop_assert_eq!(c.get(), Ok((&k, v)));
                    }
                    None => {
                        prop_assert!(c == sut.end());
                        prop_assert_eq!(c.get(), Err(Error::OutOfRange));
                    }
                }
            }
            OpI::At(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.at(&k), model.get(&k).ok_or(Error::KeyNotFound));
            }
            OpI::OrDefault(i, d) => {
                let k = key_from(pool, i);
                let v = sut.get_or_insert_default(k.clone());
                *v = v.wrapping_add(d);
                let mv = model.entry(k).or_default();
                *mv = mv.wrapping_add(d);
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Iterate => {
                let s_keys: Vec<_> = sut.keys().cloned().collect();
                let unique: BTreeSet<_> = s_keys.iter().cloned().collect();
                prop_assert_eq!(s_keys.len(), unique.len(), "iteration repeats a key");
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(unique, m_keys);
                for (k, v) in sut.iter() {
                    prop_assert_eq!(Some(v), model.get(k));
                }
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), 0);
                prop_assert!(sut.begin() == sut.end());
            }
        }

        sut.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - First-insert-wins on live keys; erase-then-insert takes the new value.
// - `find`/`at`/`contains_key` agree with the model; misses land on `end()`.
// - `get_or_insert_default` inserts `0` for absent keys only.
// - Iteration yields every live key exactly once with its current value.
// - After each op: structural audit (counters, chains, flags) and len parity.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: CoalescedHashMap<Key, i32> = CoalescedHashMap::new();
        run_scenario(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares home slot 0,
// so the whole table is one coalesced chain through the cellar.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same state-machine invariants under worst-case collisions.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: CoalescedHashMap<Key, i32, ConstBuildHasher> =
            CoalescedHashMap::with_hasher(ConstBuildHasher);
        run_scenario(sut, &pool, ops)?;
    }
}

// Property: range construction equals sequential first-wins insertion.
proptest! {
    #[test]
    fn prop_from_iter_first_wins(pairs in proptest::collection::vec((0u8..32, any::<i32>()), 0..200)) {
        let m: CoalescedHashMap<u8, i32> = pairs.iter().copied().collect();
        let mut model: HashMap<u8, i32> = HashMap::new();
        for &(k, v) in &pairs {
            model.entry(k).or_insert(v);
        }
        prop_assert_eq!(m.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(m.at(k), Ok(v));
        }
        m.check_invariants();
    }
}
