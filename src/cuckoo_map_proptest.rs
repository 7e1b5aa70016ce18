#![cfg(test)]

// Property tests for CuckooMap kept inside the crate so they can run the
// internal structural checks after every operation.

use crate::config::Config;
use crate::cuckoo_map::{CuckooMap, Slot};
use crate::router::TableHasher;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

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

// Pool-indexed operations: indices shrink to earlier keys, the pool shrinks,
// and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    InsertWith(usize, i32),
    InsertOrAssign(usize, i32),
    GetOrDefault(usize),
    Remove(usize),
    RemoveSlot(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    RetainEven,
    Reserve(usize),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_ops(pool: Vec<String>) -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    let idxs: Vec<usize> = (0..pool.len()).collect();
    let idx = proptest::sample::select(idxs);
    let contains_pool = proptest::sample::select(pool.clone());
    let op = prop_oneof![
        4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
        2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertWith(i, v)),
        2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::InsertOrAssign(i, v)),
        1 => idx.clone().prop_map(OpI::GetOrDefault),
        3 => idx.clone().prop_map(OpI::Remove),
        1 => idx.clone().prop_map(OpI::RemoveSlot),
        2 => idx.clone().prop_map(OpI::Find),
        1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(OpI::Contains),
        2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
        1 => Just(OpI::RetainEven),
        1 => (0usize..64).prop_map(OpI::Reserve),
        1 => Just(OpI::Clear),
        1 => Just(OpI::Iterate),
    ];
    proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(arb_ops)
}

// Pools where no length is shared by more than three distinct keys, so a
// hasher that only looks at the length can still place every key once the
// tables are wide enough.
fn arb_length_limited_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8)
        .prop_filter("at most three distinct keys per length", |pool| {
            let mut by_len: BTreeMap<usize, BTreeSet<&str>> = BTreeMap::new();
            for s in pool {
                by_len.entry(s.len()).or_default().insert(s);
            }
            by_len.values().all(|keys| keys.len() <= 3)
        })
        .prop_flat_map(arb_ops)
}

// Routes on key length only: every key of a given length shares its offsets.
fn by_length(k: &Key, table: usize) -> u64 {
    k.0.len() as u64 * 8 + table as u64
}

type LengthHasher = fn(&Key, usize) -> u64;

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised after every operation:
// - Duplicate inserts are no-ops that report the existing entry.
// - `find`/`contains_key`/`get` parity with the model.
// - `remove`/`remove_slot` hand back the model's value exactly once.
// - Iteration yields each live entry exactly once.
// - Slots survive non-structural operations and never resolve once the
//   layout changed.
// - Every entry sits at its route, bits agree with buckets, no key is live
//   twice, and `len` matches the model.
fn run_state_machine<H>(
    mut sut: CuckooMap<Key, i32, H>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    H: TableHasher<Key>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: Vec<(Key, Slot)> = Vec::new();
    let mut stale: Vec<Slot> = Vec::new();
    let calls = Cell::new(0u32);

    for op in ops {
        let before = (sut.len(), sut.capacity());
        let cleared = matches!(op, OpI::Clear);
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let (slot, inserted) = sut.insert(k.clone(), v);
                prop_assert_eq!(inserted, !already, "insert happens iff the key is absent");
                if inserted {
                    model.insert(k.clone(), v);
                }
                prop_assert_eq!(slot.key(&sut), Some(&k));
                prop_assert_eq!(slot.value(&sut), model.get(&k));
            }
            OpI::InsertWith(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                let before_calls = calls.get();
                let (slot, inserted) = sut.insert_with(k.clone(), || {
                    calls.set(calls.get() + 1);
                    v
                });
                prop_assert_eq!(inserted, !already);
                if inserted {
                    prop_assert_eq!(calls.get(), before_calls + 1, "constructor runs once on insert");
                    model.insert(k.clone(), v);
                } else {
                    prop_assert_eq!(calls.get(), before_calls, "constructor skipped on duplicate");
                }
                prop_assert_eq!(slot.value(&sut), model.get(&k));
            }
            OpI::InsertOrAssign(i, v) => {
                let k = key_from(pool, i);
                let (slot, inserted) = sut.insert_or_assign(k.clone(), v);
                prop_assert_eq!(inserted, model.insert(k, v).is_none());
                prop_assert_eq!(slot.value(&sut), Some(&v));
            }
            OpI::GetOrDefault(i) => {
                let k = key_from(pool, i);
                let got = *sut.get_or_default(k.clone());
                prop_assert_eq!(got, *model.entry(k).or_default());
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.remove(&k), model.remove(&k));
                prop_assert!(sut.remove(&k).is_none(), "second remove is a no-op");
            }
            OpI::RemoveSlot(i) => {
                let k = key_from(pool, i);
                match sut.find(&k) {
                    Some(slot) => {
                        let expected = model.remove(&k).map(|v| (k.clone(), v));
                        prop_assert_eq!(sut.remove_slot(slot), expected);
                        prop_assert!(sut.remove_slot(slot).is_none());
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                }
            }
            OpI::Find(i) => {
                let k = key_from(pool, i);
                let found = sut.find(&k);
                prop_assert_eq!(found.is_some(), model.contains_key(&k));
                if let Some(slot) = found {
                    prop_assert_eq!(slot.entry(&sut), model.get_key_value(&k));
                }
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            OpI::Contains(s) => {
                let k = Key(s);
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&k));
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(slot) = sut.find(&k) {
                    let vr = slot.value_mut(&mut sut);
                    prop_assert!(vr.is_some(), "fresh slot should resolve");
                    if let Some(vr) = vr {
                        *vr = vr.saturating_add(d);
                    }
                    if let Some(mv) = model.get_mut(&k) {
                        *mv = mv.saturating_add(d);
                    }
                }
            }
            OpI::RetainEven => {
                sut.retain(|_, v| *v % 2 == 0);
                model.retain(|_, v| *v % 2 == 0);
            }
            OpI::Reserve(n) => {
                sut.reserve(n);
                prop_assert!(sut.capacity() as f64 * sut.max_load_factor() >= (sut.len() + n) as f64);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
            OpI::Iterate => {
                let s_entries: BTreeMap<_, _> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m_entries: BTreeMap<_, _> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(sut.iter().len(), model.len());
                prop_assert_eq!(s_entries, m_entries);
            }
        }

        let structural = cleared || before != (sut.len(), sut.capacity());
        if structural {
            stale.extend(live.drain(..).map(|(_, s)| s));
            live = sut.slots().map(|(s, k, _)| (k.clone(), s)).collect();
        } else {
            for (k, s) in &live {
                prop_assert_eq!(s.key(&sut), Some(k), "slot moved without a layout change");
            }
        }
        for s in &stale {
            prop_assert!(s.entry(&sut).is_none(), "stale slot resolved");
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.load_factor() <= sut.max_load_factor());
        sut.check_invariants();
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(CuckooMap::new(), &pool, ops)?;
    }
}

// Same invariants when every key of a length collides in every table. Only
// growth separates the lengths, so this drives nested grows and relocation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_length_limited_scenario()) {
        let sut: CuckooMap<Key, i32, LengthHasher> = CuckooMap::with_hasher(by_length);
        run_state_machine(sut, &pool, ops)?;
    }
}

// Same invariants with a one-round eviction budget and a high load target, so
// failure-triggered growth happens routinely.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_tiny_budget((pool, ops) in arb_scenario()) {
        let config = Config::default().max_evictions(1).max_load_factor(1.0);
        run_state_machine(CuckooMap::with_config(config), &pool, ops)?;
    }
}

// Borrowed lookups route like the stored key.
proptest! {
    #[test]
    fn prop_borrowed_lookup_matches_owned(keys in proptest::collection::btree_set("[a-z]{0,6}", 0..40)) {
        let sut: CuckooMap<Key, usize> =
            keys.iter().enumerate().map(|(i, s)| (Key(s.clone()), i)).collect();
        for (i, s) in keys.iter().enumerate() {
            prop_assert_eq!(sut.get(s.as_str()), Some(&i));
            prop_assert_eq!(sut.get(&Key(s.clone())), Some(&i));
        }
        prop_assert!(!sut.contains_key("not-in-pool"));
        sut.check_invariants();
    }
}
