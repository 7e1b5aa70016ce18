// CuckooMap integration suite.
//
// Each test documents the behavior it verifies. The core invariants
// exercised:
// - Uniqueness: a present key is never inserted twice.
// - Round-trip: inserted values are found; removed keys are not.
// - Growth: entries survive every grow, load- or failure-triggered.
// - Slots: a slot resolves until the next structural mutation.
use cuckoo_map::{Config, CuckooMap, Error, Seeded};
use test_log::test;

// Test: initializer-list construction.
// Verifies: every pair is present and the count matches.
#[test]
fn from_array_of_pairs() {
    let m = CuckooMap::from([(1, 2), (3, 4)]);
    assert_eq!(m[&1], 2);
    assert_eq!(m[&3], 4);
    assert_eq!(m.len(), 2);
}

// Test: construction from an iterator with repeated keys.
// Verifies: the first occurrence of a key wins.
#[test]
fn from_iter_keeps_first_duplicate() {
    let m: CuckooMap<&str, i32> = [("a", 1), ("b", 2), ("a", 3)].into_iter().collect();
    assert_eq!(m.len(), 2);
    assert_eq!(m["a"], 1);
}

// Test: forced growth with a tiny eviction budget.
// Verifies: every earlier key is still found with its value and the
// capacity invariants hold after each grow.
#[test]
fn forced_growth_keeps_entries() {
    let config = Config::default().max_evictions(1).max_load_factor(1.0);
    let mut m: CuckooMap<u64, u64> = CuckooMap::with_config(config);
    let mut cap = m.capacity();
    let mut grows = 0;
    for i in 0..2_000u64 {
        m.insert(i, i * 7);
        if m.capacity() != cap {
            assert!(m.capacity() > cap);
            assert_eq!(m.capacity() % m.fan_out(), 0);
            assert_eq!(m.capacity_per_table() % 8, 0);
            cap = m.capacity();
            grows += 1;
        }
    }
    assert!(grows > 0);
    for i in 0..2_000u64 {
        assert_eq!(m.get(&i), Some(&(i * 7)), "key {i} lost after growth");
    }
}

// Test: million-key stress scenario with a low load target.
// Verifies: repeated inserts are no-ops, repeated removals are no-ops, and
// the survivors keep their first values.
#[test]
fn stress_insert_remove_cycles() {
    let config = Config::default()
        .max_load_factor(0.5)
        .initial_capacity(1_000_000);
    let mut m: CuckooMap<u32, u32> = CuckooMap::with_config(config);
    for i in 0..100_000 {
        m.insert(i, i * 3);
    }
    for i in 100..999_999 {
        m.remove(&i);
    }
    assert_eq!(m.len(), 100);
    for _ in 0..2 {
        for i in 0..1_000_000 {
            m.insert(i, i * 3);
        }
    }
    assert_eq!(m.len(), 1_000_000);
    for _ in 0..2 {
        for i in 100..999_999 {
            m.remove(&i);
        }
    }
    for i in 0..100 {
        assert_eq!(m[&i], i * 3);
    }
    assert_eq!(m[&999_999], 2_999_997);
    assert_eq!(m.len(), 101);

    // duplicates of survivors leave them untouched
    let mut seed = 42u32;
    for _ in 0..1_000 {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        m.insert(seed % 1_000_000, seed);
    }
    assert_eq!(m[&999_999], 2_999_997);
    assert_eq!(m[&0], 0);
}

// Test: copy and move.
// Verifies: a clone is equal and independent; moving keeps the contents.
#[test]
fn clone_is_independent() {
    let mut a: CuckooMap<String, u32> = (0..100).map(|i| (format!("k{i}"), i)).collect();
    let b = a.clone();
    assert_eq!(a, b);
    a.remove("k1");
    *a.get_mut("k2").unwrap() = 0;
    assert_eq!(b["k1"], 1);
    assert_eq!(b["k2"], 2);
    assert_ne!(a, b);

    let moved = b;
    assert_eq!(moved.len(), 100);
}

// Test: swap exchanges contents without touching entries.
#[test]
fn swap_maps() {
    let mut a = CuckooMap::from([(1, "one")]);
    let mut b = CuckooMap::from([(2, "two"), (3, "three")]);
    a.swap(&mut b);
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);
    assert_eq!(a[&3], "three");
    assert_eq!(b[&1], "one");
}

// Test: merge moves only absent keys.
// Verifies: the source keeps exactly the colliding keys; a second merge is
// a no-op.
#[test]
fn merge_leaves_duplicates_in_source() {
    let mut a: CuckooMap<u32, u32> = (0..50).map(|i| (i, i)).collect();
    let mut b: CuckooMap<u32, u32> = (25..100).map(|i| (i, i + 1_000)).collect();
    a.merge(&mut b);
    assert_eq!(a.len(), 100);
    assert_eq!(b.len(), 25);
    for i in 25..50 {
        assert_eq!(a[&i], i);
        assert_eq!(b[&i], i + 1_000);
    }
    for i in 50..100 {
        assert_eq!(a[&i], i + 1_000);
    }
    a.merge(&mut b);
    assert_eq!((a.len(), b.len()), (100, 25));
}

// Test: checked access.
#[test]
fn at_returns_key_not_found() {
    let mut m = CuckooMap::from([("present", 1)]);
    assert_eq!(m.at("present"), Ok(&1));
    assert_eq!(m.at("absent"), Err(Error::KeyNotFound));
    assert_eq!(m.at_mut("absent").map(|v| *v), Err(Error::KeyNotFound));
    assert_eq!(Error::KeyNotFound.to_string(), "key not found");
}

// Test: a hasher that sends every key to the same offsets.
// Verifies: the map gives up with a capacity panic instead of looping.
#[test]
#[should_panic(expected = "capacity exhausted")]
fn constant_hasher_exhausts_capacity() {
    let config = Config::default().max_grow_depth(4);
    let mut m = CuckooMap::with_config_and_hasher(config, |_: &u32, _: usize| 0u64);
    for k in 0..4u32 {
        m.insert(k, k);
    }
}

// Test: capacity panics raised while a grow is still relocating entries.
// Verifies: after the unwind every listed key is found, and reinserting a
// listed key is rejected as a duplicate.
#[test]
fn map_is_usable_after_capacity_panic() {
    for seed in 0..32u64 {
        let hasher = move |k: &u64, t: usize| {
            if k % 5 == 0 {
                0
            } else {
                (k ^ seed)
                    .wrapping_mul(0x9e3779b97f4a7c15)
                    .rotate_left(29 + t as u32)
                    .wrapping_mul(0xbf58476d1ce4e5b9)
            }
        };
        let config = Config::default()
            .max_grow_depth(2)
            .max_evictions(2)
            .max_load_factor(1.0);
        let mut m = CuckooMap::with_config_and_hasher(config, hasher);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            for k in 0..60u64 {
                m.insert(k, k * 3);
            }
        }));
        assert!(outcome.is_err());

        let listed: Vec<u64> = m.keys().copied().collect();
        assert_eq!(listed.len(), m.len());
        for k in listed {
            assert_eq!(m.get(&k), Some(&(k * 3)), "seed {seed}: key {k}");
            assert!(!m.insert(k, 0).1, "seed {seed}: key {k} inserted twice");
        }
    }
}

// Test: a custom table hasher built from a closure.
// Verifies: colliding keys are resolved by growth and remain reachable.
#[test]
fn closure_hasher_with_collisions() {
    let mut m = CuckooMap::with_hasher(|k: &u64, t: usize| (k / 2) ^ (t as u64) << 32);
    for k in 0..200u64 {
        m.insert(k, k + 1);
    }
    for k in 0..200u64 {
        assert_eq!(m.get(&k), Some(&(k + 1)));
    }
}

// Test: explicit seed for the default table hasher.
#[test]
fn seeded_with_std_random_state() {
    let mut m: CuckooMap<String, usize, Seeded<std::collections::hash_map::RandomState>> =
        CuckooMap::with_hasher(Seeded::new(Default::default()));
    m.extend((0..64).map(|i| (i.to_string(), i)));
    assert!((0..64).all(|i| m.get(i.to_string().as_str()) == Some(&i)));
}

// Test: slots from iteration are valid until the next structural change.
#[test]
fn slots_from_iteration() {
    let mut m: CuckooMap<u32, u32> = (0..10).map(|i| (i, i)).collect();
    let slots: Vec<_> = m.slots().map(|(s, k, _)| (s, *k)).collect();
    for &(s, k) in &slots {
        *s.value_mut(&mut m).unwrap() += 100;
        assert_eq!(s.key(&m), Some(&k));
    }
    assert!(m.values().all(|v| *v >= 100));
    m.remove(&0);
    assert!(slots.iter().all(|(s, _)| s.value(&m).is_none()));
}

// Test: owned iteration and drain.
#[test]
fn into_iter_and_drain() {
    let m: CuckooMap<u32, u32> = (0..30).map(|i| (i, i)).collect();
    let mut owned: Vec<_> = m.clone().into_iter().collect();
    owned.sort_unstable();
    assert_eq!(owned.len(), 30);
    assert_eq!(owned[29], (29, 29));

    let mut m = m;
    let total: u32 = m.drain().map(|(_, v)| v).sum();
    assert_eq!(total, (0..30).sum());
    assert!(m.is_empty());
    m.insert(1, 1);
    assert_eq!(m.len(), 1);
}
