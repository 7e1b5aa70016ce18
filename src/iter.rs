//! Iterators over a [`CuckooMap`](crate::CuckooMap).
//!
//! Borrowing iterators walk the existence bits and step the bucket slice
//! forward to each live position. Visit order is address order: table 0 first,
//! ascending offsets within a table.

use crate::bitset::ExistenceBits;
use crate::cuckoo_map::Slot;
use crate::tables::{Bucket, TableArray};
use allocator_api2::alloc::Allocator;
use core::iter::{Flatten, FusedIterator};

/// Bitset-driven cursor over a bucket iterator positioned at address `offset`.
#[derive(Clone)]
struct Cursor<'a, I> {
    bits: &'a ExistenceBits,
    buckets: I,
    offset: usize,
    remaining: usize,
}

impl<'a, I: Iterator> Cursor<'a, I> {
    fn new(bits: &'a ExistenceBits, buckets: I, remaining: usize) -> Self {
        Self {
            bits,
            buckets,
            offset: 0,
            remaining,
        }
    }

    #[inline]
    fn advance(&mut self) -> Option<(usize, I::Item)> {
        if self.remaining == 0 {
            return None;
        }
        let pos = self.bits.next_set(self.offset)?;
        let bucket = self.buckets.nth(pos - self.offset)?;
        self.offset = pos + 1;
        self.remaining -= 1;
        Some((pos, bucket))
    }
}

/// Iterator over `(&K, &V)`.
pub struct Iter<'a, K, V> {
    cursor: Cursor<'a, core::slice::Iter<'a, Bucket<K, V>>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new<A: Allocator>(tables: &'a TableArray<K, V, A>) -> Self {
        let (bits, buckets) = tables.parts();
        Self {
            cursor: Cursor::new(bits, buckets.iter(), tables.len()),
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            cursor: self.cursor.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, bucket) = self.cursor.advance()?;
        bucket.as_ref().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.remaining, Some(self.cursor.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over `(&K, &mut V)`.
pub struct IterMut<'a, K, V> {
    cursor: Cursor<'a, core::slice::IterMut<'a, Bucket<K, V>>>,
}

impl<'a, K, V> IterMut<'a, K, V> {
    pub(crate) fn new<A: Allocator>(tables: &'a mut TableArray<K, V, A>) -> Self {
        let remaining = tables.len();
        let (bits, buckets) = tables.parts_mut();
        Self {
            cursor: Cursor::new(bits, buckets.iter_mut(), remaining),
        }
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, bucket) = self.cursor.advance()?;
        bucket.as_mut().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.remaining, Some(self.cursor.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Iterator over keys.
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

/// Iterator over values.
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Iterator over mutable values.
pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Iterator over `(Slot, &K, &V)`. The slots stay valid until the map is
/// next mutated.
pub struct Slots<'a, K, V> {
    cursor: Cursor<'a, core::slice::Iter<'a, Bucket<K, V>>>,
    epoch: u64,
}

impl<'a, K, V> Slots<'a, K, V> {
    pub(crate) fn new<A: Allocator>(tables: &'a TableArray<K, V, A>, epoch: u64) -> Self {
        let (bits, buckets) = tables.parts();
        Self {
            cursor: Cursor::new(bits, buckets.iter(), tables.len()),
            epoch,
        }
    }
}

impl<'a, K, V> Iterator for Slots<'a, K, V> {
    type Item = (Slot, &'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (pos, bucket) = self.cursor.advance()?;
        let slot = Slot::new(pos, self.epoch);
        bucket.as_ref().map(|(k, v)| (slot, k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor.remaining, Some(self.cursor.remaining))
    }
}

impl<K, V> ExactSizeIterator for Slots<'_, K, V> {}
impl<K, V> FusedIterator for Slots<'_, K, V> {}

/// Owning iterator over `(K, V)`.
pub struct IntoIter<K, V, A: Allocator> {
    inner: Flatten<allocator_api2::vec::IntoIter<Bucket<K, V>, A>>,
    remaining: usize,
}

impl<K, V, A: Allocator> IntoIter<K, V, A> {
    pub(crate) fn new(tables: TableArray<K, V, A>) -> Self {
        let remaining = tables.len();
        Self {
            inner: tables.into_buckets().flatten(),
            remaining,
        }
    }
}

impl<K, V, A: Allocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.next()?;
        self.remaining -= 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for IntoIter<K, V, A> {}
impl<K, V, A: Allocator> FusedIterator for IntoIter<K, V, A> {}

/// Draining iterator. Every entry not yielded is dropped when the iterator
/// is; the tables keep their capacity.
pub struct Drain<'a, K, V, A: Allocator> {
    tables: &'a mut TableArray<K, V, A>,
    next: usize,
}

impl<'a, K, V, A: Allocator> Drain<'a, K, V, A> {
    pub(crate) fn new(tables: &'a mut TableArray<K, V, A>) -> Self {
        Self { tables, next: 0 }
    }
}

impl<K, V, A: Allocator> Iterator for Drain<'_, K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.tables.next_live(self.next)?;
        self.next = pos + 1;
        self.tables.take(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tables.len(), Some(self.tables.len()))
    }
}

impl<K, V, A: Allocator> ExactSizeIterator for Drain<'_, K, V, A> {}
impl<K, V, A: Allocator> FusedIterator for Drain<'_, K, V, A> {}

impl<K, V, A: Allocator> Drop for Drain<'_, K, V, A> {
    fn drop(&mut self) {
        self.for_each(drop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;

    fn filled(keys: &[u32]) -> TableArray<u32, u32, Global> {
        let mut t = TableArray::new_in(3, 8, Global);
        for &k in keys {
            t.swap_in(k as usize, (k, k * 10));
        }
        t
    }

    /// Invariant: iteration visits each live address once, in address order,
    /// and the size hint counts down exactly.
    #[test]
    fn iter_visits_live_slots_in_order() {
        let t = filled(&[0, 7, 8, 23]);
        let mut it = Iter::new(&t);
        assert_eq!(it.len(), 4);
        assert_eq!(it.next(), Some((&0, &0)));
        assert_eq!(it.len(), 3);
        let rest: Vec<_> = it.map(|(k, _)| *k).collect();
        assert_eq!(rest, vec![7, 8, 23]);
    }

    #[test]
    fn iter_on_empty_tables() {
        let t = filled(&[]);
        assert_eq!(Iter::new(&t).next(), None);
        assert_eq!(Slots::new(&t, 0).len(), 0);
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut t = filled(&[1, 9, 17]);
        for (k, v) in IterMut::new(&mut t) {
            *v = *k + 1;
        }
        let got: Vec<_> = Iter::new(&t).map(|(_, v)| *v).collect();
        assert_eq!(got, vec![2, 10, 18]);
    }

    #[test]
    fn slots_report_positions() {
        let t = filled(&[3, 12]);
        let got: Vec<_> = Slots::new(&t, 9).map(|(s, k, _)| (s.position(), *k)).collect();
        assert_eq!(got, vec![(3, 3), (12, 12)]);
    }

    #[test]
    fn into_iter_yields_every_entry() {
        let t = filled(&[2, 5, 20]);
        let it = IntoIter::new(t);
        assert_eq!(it.len(), 3);
        let mut got: Vec<_> = it.collect();
        got.sort_unstable();
        assert_eq!(got, vec![(2, 20), (5, 50), (20, 200)]);
    }

    /// Invariant: a dropped drain still empties the tables.
    #[test]
    fn partial_drain_empties_tables() {
        let mut t = filled(&[4, 6, 15, 22]);
        {
            let mut d = Drain::new(&mut t);
            assert_eq!(d.len(), 4);
            assert_eq!(d.next(), Some((4, 40)));
        }
        assert_eq!(t.len(), 0);
        assert_eq!(t.total(), 24);
        t.assert_consistent();
    }
}
