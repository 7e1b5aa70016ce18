//! Existence bits: one occupancy flag per flattened slot address.

/// Fixed-size, byte-backed set of occupancy flags.
///
/// Bit `pos` lives in byte `pos / 8` at bit `pos % 8` (LSB first). The slot
/// count is always a multiple of 8 so that each table region starts on a byte
/// boundary.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ExistenceBits(Box<[u8]>);

impl ExistenceBits {
    /// Creates a cleared set covering `slots` addresses.
    pub(crate) fn new(slots: usize) -> Self {
        debug_assert_eq!(slots % 8, 0, "slot count must be byte aligned");
        Self(vec![0; slots / 8].into_boxed_slice())
    }

    #[inline]
    pub(crate) fn get(&self, pos: usize) -> bool {
        self.0[pos >> 3] & (1 << (pos & 7)) != 0
    }

    #[inline]
    pub(crate) fn set(&mut self, pos: usize) {
        self.0[pos >> 3] |= 1 << (pos & 7);
    }

    #[inline]
    pub(crate) fn unset(&mut self, pos: usize) {
        self.0[pos >> 3] &= !(1 << (pos & 7));
    }

    /// Number of set bits.
    #[cfg(test)]
    pub(crate) fn count_ones(&self) -> usize {
        self.0.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns the first set position at or after `from`, skipping empty
    /// bytes whole.
    pub(crate) fn next_set(&self, from: usize) -> Option<usize> {
        let mut idx = from >> 3;
        let mut byte = *self.0.get(idx)? & (0xFF << (from & 7));
        loop {
            if byte != 0 {
                return Some((idx << 3) + byte.trailing_zeros() as usize);
            }
            idx += 1;
            byte = *self.0.get(idx)?;
        }
    }

    /// Lays the bits of `tables` regions of `old_per_table` slots out into
    /// regions of `new_per_table` slots, keeping each region's prefix.
    pub(crate) fn regrow(&self, tables: usize, old_per_table: usize, new_per_table: usize) -> Self {
        debug_assert!(new_per_table >= old_per_table);
        let mut out = Self::new(tables * new_per_table);
        let (old_bytes, new_bytes) = (old_per_table >> 3, new_per_table >> 3);
        for t in 0..tables {
            let src = &self.0[t * old_bytes..(t + 1) * old_bytes];
            out.0[t * new_bytes..t * new_bytes + old_bytes].copy_from_slice(src);
        }
        out
    }
}
