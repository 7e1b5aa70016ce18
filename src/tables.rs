//! TableArray: `d` equal table regions carved out of one allocator-backed arena.
//!
//! The arena holds `fan_out * per_table` buckets. Table `t` owns the buckets
//! `t * per_table .. (t + 1) * per_table`, so a slot address `(t, o)` flattens
//! to `t * per_table + o`. Liveness is tracked by [`ExistenceBits`]; a bucket
//! holds an entry exactly when its bit is set. This layer knows nothing about
//! hashing: it moves entries in and out of addresses and keeps the live count.
//!
//! Buckets are `Option<(K, V)>`, so a bucket's tag and its bit record the same
//! fact. The tag keeps every move and drop in safe code; the bits are what
//! iteration and relocation scan, a byte per eight slots. Every mutation
//! updates both, and `assert_consistent` checks they agree. Only the bucket
//! arena goes through the map's allocator; the bits take one bit per slot
//! from the global heap.

use crate::bitset::ExistenceBits;
use allocator_api2::alloc::{Allocator, Global};
use allocator_api2::vec::Vec;

pub(crate) type Bucket<K, V> = Option<(K, V)>;

#[derive(Clone)]
pub(crate) struct TableArray<K, V, A: Allocator = Global> {
    slots: Vec<Bucket<K, V>, A>,
    bits: ExistenceBits,
    fan_out: usize,
    per_table: usize,
    len: usize,
}

impl<K, V, A: Allocator> TableArray<K, V, A> {
    pub(crate) fn new_in(fan_out: usize, per_table: usize, alloc: A) -> Self {
        debug_assert!(fan_out >= 2);
        debug_assert!(per_table > 0 && per_table % 8 == 0);
        let total = fan_out * per_table;
        let mut slots = Vec::with_capacity_in(total, alloc);
        slots.resize_with(total, || None);
        Self {
            slots,
            bits: ExistenceBits::new(total),
            fan_out,
            per_table,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn fan_out(&self) -> usize {
        self.fan_out
    }
    #[inline]
    pub(crate) fn per_table(&self) -> usize {
        self.per_table
    }
    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.fan_out * self.per_table
    }
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn allocator(&self) -> &A {
        self.slots.allocator()
    }

    #[inline]
    pub(crate) fn address(&self, table: usize, offset: usize) -> usize {
        debug_assert!(table < self.fan_out && offset < self.per_table);
        table * self.per_table + offset
    }

    #[inline]
    pub(crate) fn split(&self, pos: usize) -> (usize, usize) {
        (pos / self.per_table, pos % self.per_table)
    }

    #[inline]
    pub(crate) fn is_live(&self, pos: usize) -> bool {
        pos < self.total() && self.bits.get(pos)
    }

    pub(crate) fn next_live(&self, from: usize) -> Option<usize> {
        self.bits.next_set(from)
    }

    pub(crate) fn get(&self, pos: usize) -> Option<&(K, V)> {
        if !self.is_live(pos) {
            return None;
        }
        self.slots[pos].as_ref()
    }

    pub(crate) fn get_mut(&mut self, pos: usize) -> Option<(&K, &mut V)> {
        if !self.is_live(pos) {
            return None;
        }
        self.slots[pos].as_mut().map(|(k, v)| (&*k, v))
    }

    /// Moves `entry` into `pos` and returns the previous occupant, if any.
    /// Filling an empty slot sets its bit and counts it live.
    pub(crate) fn swap_in(&mut self, pos: usize, entry: (K, V)) -> Option<(K, V)> {
        let prev = self.slots[pos].replace(entry);
        debug_assert_eq!(prev.is_some(), self.bits.get(pos));
        if prev.is_none() {
            self.bits.set(pos);
            self.len += 1;
        }
        prev
    }

    /// Moves the live entry at `pos` out, leaving an empty slot.
    pub(crate) fn take(&mut self, pos: usize) -> Option<(K, V)> {
        if !self.is_live(pos) {
            return None;
        }
        self.bits.unset(pos);
        self.len -= 1;
        self.slots[pos].take()
    }

    /// Enlarges every table to `new_per_table` slots. Each table's existing
    /// buckets keep their offsets, so `(t, o)` addresses survive the resize
    /// while their flattened positions change.
    pub(crate) fn regrow(&mut self, new_per_table: usize) {
        let old = self.per_table;
        debug_assert!(new_per_table > old && new_per_table % 8 == 0);
        self.slots.resize_with(self.fan_out * new_per_table, || None);
        // Highest table first: a target never overlaps a bucket still waiting
        // to move, and every target is empty when swapped.
        for t in (1..self.fan_out).rev() {
            for o in (0..old).rev() {
                self.slots.swap(t * old + o, t * new_per_table + o);
            }
        }
        self.bits = self.bits.regrow(self.fan_out, old, new_per_table);
        self.per_table = new_per_table;
    }

    /// Flattened position of `pos` once tables hold `new_per_table` slots.
    pub(crate) fn readdress(&self, pos: usize, new_per_table: usize) -> usize {
        let (t, o) = self.split(pos);
        t * new_per_table + o
    }

    /// Drops every entry and re-lays the arena at `per_table` slots per table.
    pub(crate) fn reset(&mut self, per_table: usize) {
        debug_assert!(per_table > 0 && per_table % 8 == 0);
        let total = self.fan_out * per_table;
        self.slots.clear();
        self.slots.shrink_to_fit();
        self.slots.resize_with(total, || None);
        self.bits = ExistenceBits::new(total);
        self.per_table = per_table;
        self.len = 0;
    }

    /// Bits and buckets side by side, for cursors that walk both.
    pub(crate) fn parts(&self) -> (&ExistenceBits, &[Bucket<K, V>]) {
        (&self.bits, &self.slots[..])
    }

    pub(crate) fn parts_mut(&mut self) -> (&ExistenceBits, &mut [Bucket<K, V>]) {
        (&self.bits, &mut self.slots[..])
    }

    /// Consumes the arena, yielding buckets in address order.
    pub(crate) fn into_buckets(self) -> allocator_api2::vec::IntoIter<Bucket<K, V>, A> {
        self.slots.into_iter()
    }

    /// Layout-preserving deep copy into `alloc`.
    pub(crate) fn clone_in<B: Allocator>(&self, alloc: B) -> TableArray<K, V, B>
    where
        K: Clone,
        V: Clone,
    {
        let mut slots = Vec::with_capacity_in(self.slots.len(), alloc);
        slots.extend(self.slots.iter().cloned());
        TableArray {
            slots,
            bits: self.bits.clone(),
            fan_out: self.fan_out,
            per_table: self.per_table,
            len: self.len,
        }
    }

    /// Bit count, bucket occupancy and the live counter must all agree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.slots.len(), self.total());
        assert_eq!(self.bits.count_ones(), self.len, "set bits != len");
        for (pos, bucket) in self.slots.iter().enumerate() {
            assert_eq!(
                bucket.is_some(),
                self.bits.get(pos),
                "bucket {pos} disagrees with its existence bit"
            );
        }
    }
}
