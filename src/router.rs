//! Hash routing: which offset a key occupies in each table.

use core::hash::{BuildHasher, Hash, Hasher};
use hashbrown::hash_map::DefaultHashBuilder;

/// A hash function parameterized by table index.
///
/// Each table needs an independent hash of the key, so the table index is an
/// input. Implementations must be deterministic: a key routes to the same
/// offset for as long as it lives in the map.
///
/// Closures `Fn(&K, usize) -> u64` implement this trait directly.
pub trait TableHasher<K: ?Sized> {
    fn hash_for(&self, key: &K, table: usize) -> u64;
}

impl<K: ?Sized, F> TableHasher<K> for F
where
    F: Fn(&K, usize) -> u64,
{
    #[inline]
    fn hash_for(&self, key: &K, table: usize) -> u64 {
        self(key, table)
    }
}

/// Derives per-table hashes from a [`BuildHasher`] by feeding the table index
/// into the hasher before the key.
///
/// Borrowed forms hash like their owners (`String` and `str`), so lookups by
/// `&Q` route exactly like the stored `K`.
#[derive(Clone, Debug, Default)]
pub struct Seeded<S = DefaultHashBuilder>(pub S);

impl<S> Seeded<S> {
    pub fn new(build: S) -> Self {
        Self(build)
    }

    pub fn build_hasher(&self) -> &S {
        &self.0
    }
}

impl<K, S> TableHasher<K> for Seeded<S>
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash_for(&self, key: &K, table: usize) -> u64 {
        let mut state = self.0.build_hasher();
        state.write_usize(table);
        key.hash(&mut state);
        state.finish()
    }
}

/// Offset of `key` within table `table` when each table holds `per_table` slots.
#[inline]
pub(crate) fn route<K, H>(hasher: &H, key: &K, table: usize, per_table: usize) -> usize
where
    K: ?Sized,
    H: TableHasher<K> + ?Sized,
{
    (hasher.hash_for(key, table) % per_table as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_is_deterministic_and_in_range() {
        let h = Seeded::<DefaultHashBuilder>::default();
        for key in 0u64..200 {
            for t in 0..3 {
                let a = route(&h, &key, t, 24);
                assert!(a < 24);
                assert_eq!(a, route(&h, &key, t, 24));
            }
        }
    }

    /// Invariant: the table index changes the hash, so tables are independent.
    #[test]
    fn tables_hash_independently() {
        let h = Seeded::<DefaultHashBuilder>::default();
        let differing = (0u64..64)
            .filter(|k| h.hash_for(k, 0) != h.hash_for(k, 1))
            .count();
        assert!(differing > 60);
    }

    /// Invariant: a borrowed form routes exactly like its owner.
    #[test]
    fn borrowed_lookup_routes_like_owner() {
        let h = Seeded::<DefaultHashBuilder>::default();
        let owned = String::from("cuckoo");
        for t in 0..4 {
            assert_eq!(h.hash_for(&owned, t), h.hash_for("cuckoo", t));
        }
    }

    #[test]
    fn closures_are_table_hashers() {
        let h = |k: &u32, t: usize| u64::from(*k) + t as u64;
        assert_eq!(route(&h, &10, 0, 8), 2);
        assert_eq!(route(&h, &10, 1, 8), 3);
    }
}
