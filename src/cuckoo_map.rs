//! CuckooMap: the public map and its `Slot` handles.
//!
//! Keys are unique; inserting a present key leaves the map unchanged and
//! reports the existing entry. Lookups probe one offset per table and never
//! scan. A `Slot` names an entry by position and is checked against the map's
//! layout epoch, so a slot taken before any mutation resolves to `None`
//! afterwards instead of aliasing whatever moved into its position.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::iter::{Drain, IntoIter, Iter, IterMut, Keys, Slots, Values, ValuesMut};
use crate::raw_cuckoo_map::RawCuckooMap;
use crate::router::{Seeded, TableHasher};
use allocator_api2::alloc::{Allocator, Global};
use core::borrow::Borrow;
use core::fmt;
use core::hash::Hash;
use core::ops::Index;

/// Position of an entry within a specific layout of a [`CuckooMap`].
///
/// Obtained from insertion, [`CuckooMap::find`] or [`CuckooMap::slots`].
/// Resolving a slot against a map that was mutated since returns `None`.
/// A slot belongs to the map that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    pos: usize,
    epoch: u64,
}

impl Slot {
    pub(crate) fn new(pos: usize, epoch: u64) -> Self {
        Self { pos, epoch }
    }

    /// Flattened slot address: `table * capacity_per_table + offset`.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn key<'a, K, V, H, A: Allocator>(&self, map: &'a CuckooMap<K, V, H, A>) -> Option<&'a K> {
        map.resolve(*self).map(|(k, _)| k)
    }

    pub fn value<'a, K, V, H, A: Allocator>(
        &self,
        map: &'a CuckooMap<K, V, H, A>,
    ) -> Option<&'a V> {
        map.resolve(*self).map(|(_, v)| v)
    }

    pub fn value_mut<'a, K, V, H, A: Allocator>(
        &self,
        map: &'a mut CuckooMap<K, V, H, A>,
    ) -> Option<&'a mut V> {
        map.resolve_mut(*self).map(|(_, v)| v)
    }

    pub fn entry<'a, K, V, H, A: Allocator>(
        &self,
        map: &'a CuckooMap<K, V, H, A>,
    ) -> Option<(&'a K, &'a V)> {
        map.resolve(*self)
    }
}

/// A d-ary cuckoo hash map.
///
/// `H` hashes a key for a given table index (see [`TableHasher`]); `A` is the
/// allocator backing the slot arena.
///
/// ```
/// use cuckoo_map::CuckooMap;
///
/// let mut m = CuckooMap::new();
/// let (slot, inserted) = m.insert("a", 1);
/// assert!(inserted);
/// assert_eq!(slot.value(&m), Some(&1));
///
/// // present keys are left alone
/// let (_, inserted) = m.insert("a", 2);
/// assert!(!inserted);
/// assert_eq!(m["a"], 1);
/// ```
#[derive(Clone)]
pub struct CuckooMap<K, V, H = Seeded, A: Allocator = Global> {
    raw: RawCuckooMap<K, V, H, A>,
    epoch: u64,
}

impl<K, V> CuckooMap<K, V> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a map that holds `capacity` entries without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config::default().initial_capacity(capacity))
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_config_and_hasher(config, Seeded::default())
    }
}

impl<K, V, H> CuckooMap<K, V, H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self::with_config_and_hasher(Config::default(), hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        Self::with_config_and_hasher(Config::default().initial_capacity(capacity), hasher)
    }

    pub fn with_config_and_hasher(config: Config, hasher: H) -> Self {
        Self::with_config_and_hasher_in(config, hasher, Global)
    }
}

impl<K, V, A: Allocator> CuckooMap<K, V, Seeded, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_config_and_hasher_in(Config::default(), Seeded::default(), alloc)
    }

    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self::with_config_and_hasher_in(
            Config::default().initial_capacity(capacity),
            Seeded::default(),
            alloc,
        )
    }
}

impl<K, V, H, A: Allocator> CuckooMap<K, V, H, A> {
    /// # Panics
    ///
    /// If the configured initial capacity overflows `usize`.
    pub fn with_config_and_hasher_in(config: Config, hasher: H, alloc: A) -> Self {
        Self {
            raw: RawCuckooMap::with_config_and_hasher_in(config, hasher, alloc),
            epoch: 0,
        }
    }

    /// Invalidates every outstanding `Slot`.
    #[inline]
    fn touch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    #[inline]
    fn slot(&self, pos: usize) -> Slot {
        Slot::new(pos, self.epoch)
    }

    fn resolve(&self, slot: Slot) -> Option<(&K, &V)> {
        if slot.epoch != self.epoch {
            return None;
        }
        self.raw.tables().get(slot.pos).map(|(k, v)| (k, v))
    }

    fn resolve_mut(&mut self, slot: Slot) -> Option<(&K, &mut V)> {
        if slot.epoch != self.epoch {
            return None;
        }
        self.raw.tables_mut().get_mut(slot.pos)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots across all tables.
    pub fn capacity(&self) -> usize {
        self.raw.tables().total()
    }

    pub fn capacity_per_table(&self) -> usize {
        self.raw.tables().per_table()
    }

    pub fn fan_out(&self) -> usize {
        self.raw.tables().fan_out()
    }

    /// Live entries per slot.
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    pub fn max_load_factor(&self) -> f64 {
        self.raw.config().max_load_factor
    }

    /// Changes the load target. Takes effect on the next insert.
    ///
    /// # Panics
    ///
    /// Unless `0 < factor <= 1`.
    pub fn set_max_load_factor(&mut self, factor: f64) {
        self.raw.set_max_load_factor(factor);
    }

    pub fn config(&self) -> &Config {
        self.raw.config()
    }

    pub fn hasher(&self) -> &H {
        self.raw.hasher()
    }

    pub fn allocator(&self) -> &A {
        self.raw.tables().allocator()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.raw.tables())
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self.raw.tables_mut())
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

    /// Iterates entries along with their current slots.
    pub fn slots(&self) -> Slots<'_, K, V> {
        Slots::new(self.raw.tables(), self.epoch)
    }

    /// Removes every entry, keeping the current capacity.
    pub fn drain(&mut self) -> Drain<'_, K, V, A> {
        self.touch();
        Drain::new(self.raw.tables_mut())
    }

    /// Removes every entry and returns to the configured initial capacity.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.touch();
    }

    /// Removes the entry `slot` names, if the slot is still valid.
    pub fn remove_slot(&mut self, slot: Slot) -> Option<(K, V)> {
        if slot.epoch != self.epoch {
            return None;
        }
        let entry = self.raw.take_at(slot.pos)?;
        self.touch();
        Some(entry)
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = false;
        let mut cursor = self.raw.tables().next_live(0);
        while let Some(pos) = cursor {
            let keep = match self.raw.tables_mut().get_mut(pos) {
                Some((k, v)) => f(k, v),
                None => true,
            };
            if !keep {
                self.raw.take_at(pos);
                removed = true;
            }
            cursor = self.raw.tables().next_live(pos + 1);
        }
        if removed {
            self.touch();
        }
    }

    /// Exchanges the contents of two maps. Slots of either map are invalidated.
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
        let epoch = self.epoch.max(other.epoch).wrapping_add(1);
        self.epoch = epoch;
        other.epoch = epoch;
    }

    /// Slot of the entry whose key equals `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.raw.find(key).map(|pos| self.slot(pos))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.raw.find(key).is_some()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        let pos = self.raw.find(key)?;
        self.raw.tables().get(pos).map(|(k, v)| (k, v))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        let pos = self.raw.find(key)?;
        self.raw.tables_mut().get_mut(pos).map(|(_, v)| v)
    }

    /// Checked lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if no entry has this key.
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Checked mutable lookup.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if no entry has this key.
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Removes `key` and returns its value. Removing an absent key is a no-op.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        let pos = self.raw.find(key)?;
        let entry = self.raw.take_at(pos)?;
        self.touch();
        Some(entry)
    }
}

impl<K, V, H, A> CuckooMap<K, V, H, A>
where
    K: Eq,
    H: TableHasher<K>,
    A: Allocator,
{
    /// Inserts `key` unless it is present.
    ///
    /// Returns the slot of the entry now holding `key` and whether the insert
    /// happened. A present key keeps its value and `value` is dropped.
    ///
    /// # Panics
    ///
    /// If the tables cannot place the entry within the configured number of
    /// nested grows (a hasher that sends too many keys to the same offsets).
    pub fn insert(&mut self, key: K, value: V) -> (Slot, bool) {
        self.insert_with(key, || value)
    }

    /// Like [`insert`](Self::insert), but only builds the value when the key
    /// is absent.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> (Slot, bool)
    where
        F: FnOnce() -> V,
    {
        if let Some(pos) = self.raw.find(&key) {
            return (self.slot(pos), false);
        }
        let pos = self.raw.insert_unique(key, make());
        self.touch();
        (self.slot(pos), true)
    }

    /// Inserts `key` or overwrites its value. Returns `true` if the key was
    /// absent.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> (Slot, bool) {
        if let Some(pos) = self.raw.find(&key) {
            if let Some((_, v)) = self.raw.tables_mut().get_mut(pos) {
                *v = value;
            }
            return (self.slot(pos), false);
        }
        let pos = self.raw.insert_unique(key, value);
        self.touch();
        (self.slot(pos), true)
    }

    /// Value for `key`, inserting `make()` first if the key is absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let (slot, inserted) = self.insert_with(key, make);
        if inserted {
            log::trace!("inserted missing key at slot {}", slot.pos);
        }
        self.raw
            .tables_mut()
            .get_mut(slot.pos)
            .map(|(_, v)| v)
            .expect("slot returned by insert is live")
    }

    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Grows so that `additional` more entries fit under the load target.
    ///
    /// # Panics
    ///
    /// If the new capacity overflows.
    pub fn reserve(&mut self, additional: usize) {
        if let Err(e) = self.try_reserve(additional) {
            panic!("{e}");
        }
    }

    /// # Errors
    ///
    /// [`Error::CapacityOverflow`] if the new capacity does not fit; the map is
    /// left untouched.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let entries = self
            .len()
            .checked_add(additional)
            .ok_or(Error::CapacityOverflow)?;
        if self.raw.reserve_for(entries)? {
            self.touch();
        }
        Ok(())
    }

    /// Grows so that `entries` entries in total fit under the load target.
    /// Never shrinks.
    ///
    /// # Panics
    ///
    /// If the new capacity overflows.
    pub fn rehash(&mut self, entries: usize) {
        match self.raw.reserve_for(entries.max(self.len())) {
            Ok(true) => self.touch(),
            Ok(false) => {}
            Err(e) => panic!("{e}"),
        }
    }

    /// Moves every entry whose key is absent here out of `other`. Entries
    /// whose keys are already present stay in `other`.
    pub fn merge<H2, A2>(&mut self, other: &mut CuckooMap<K, V, H2, A2>)
    where
        A2: Allocator,
    {
        let mut moved = 0usize;
        let mut cursor = other.raw.tables().next_live(0);
        while let Some(pos) = cursor {
            let absent = other
                .raw
                .tables()
                .get(pos)
                .is_some_and(|(k, _)| self.raw.find(k).is_none());
            if absent {
                if let Some((k, v)) = other.raw.take_at(pos) {
                    self.raw.insert_unique(k, v);
                    moved += 1;
                }
            }
            cursor = other.raw.tables().next_live(pos + 1);
        }
        if moved > 0 {
            log::trace!("merged {moved} entries");
            self.touch();
            other.touch();
        }
    }

    /// Rebuilds this map in `alloc`.
    pub fn into_allocator<B: Allocator>(self, alloc: B) -> CuckooMap<K, V, H, B> {
        CuckooMap {
            raw: self.raw.into_allocator(alloc),
            epoch: 0,
        }
    }
}

impl<K, V, H, A> CuckooMap<K, V, H, A>
where
    K: Clone,
    V: Clone,
    H: Clone,
    A: Allocator,
{
    /// Copies this map into `alloc`. Entries keep their slot positions.
    pub fn clone_in<B: Allocator>(&self, alloc: B) -> CuckooMap<K, V, H, B> {
        CuckooMap {
            raw: self.raw.clone_in(alloc),
            epoch: 0,
        }
    }
}

impl<K, V, H: Default> Default for CuckooMap<K, V, H> {
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V, H, A> fmt::Debug for CuckooMap<K, V, H, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H, A> PartialEq for CuckooMap<K, V, H, A>
where
    K: Eq,
    V: PartialEq,
    H: TableHasher<K>,
    A: Allocator,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, H, A> Eq for CuckooMap<K, V, H, A>
where
    K: Eq,
    V: Eq,
    H: TableHasher<K>,
    A: Allocator,
{
}

impl<K, Q, V, H, A> Index<&Q> for CuckooMap<K, V, H, A>
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    H: TableHasher<Q>,
    A: Allocator,
{
    type Output = V;

    /// # Panics
    ///
    /// If the key is not in the map.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in map")
    }
}

impl<K, V, H, A> Extend<(K, V)> for CuckooMap<K, V, H, A>
where
    K: Eq,
    H: TableHasher<K>,
    A: Allocator,
{
    /// Present keys keep their values; within `iter`, the first occurrence of
    /// a key wins.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        let hint = iter.size_hint().0;
        self.reserve(if self.is_empty() { hint } else { (hint + 1) / 2 });
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, H, A> Extend<(&'a K, &'a V)> for CuckooMap<K, V, H, A>
where
    K: Eq + Copy,
    V: Copy,
    H: TableHasher<K>,
    A: Allocator,
{
    fn extend<T: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: T) {
        self.extend(iter.into_iter().map(|(k, v)| (*k, *v)));
    }
}

impl<K, V, H> FromIterator<(K, V)> for CuckooMap<K, V, H>
where
    K: Eq,
    H: TableHasher<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::with_hasher(H::default());
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for CuckooMap<K, V>
where
    K: Eq + Hash,
{
    fn from(entries: [(K, V); N]) -> Self {
        let mut map = Self::with_capacity(N);
        map.extend(entries);
        map
    }
}

impl<K, V, H, A: Allocator> IntoIterator for CuckooMap<K, V, H, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.raw.into_tables())
    }
}

impl<'a, K, V, H, A: Allocator> IntoIterator for &'a CuckooMap<K, V, H, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H, A: Allocator> IntoIterator for &'a mut CuckooMap<K, V, H, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
impl<K: Eq, V, H: TableHasher<K>, A: Allocator> CuckooMap<K, V, H, A> {
    pub(crate) fn check_invariants(&self) {
        self.raw.check_invariants();
    }
}
