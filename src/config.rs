//! Tuning knobs for a [`CuckooMap`](crate::CuckooMap).

/// Number of tables a key may live in.
pub const DEFAULT_FAN_OUT: usize = 3;

/// Displacement rounds (each visiting every table once) before growing.
pub const DEFAULT_MAX_EVICTIONS: usize = 100;

/// Per-table capacity multiplier applied by each grow.
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.2;

/// Live entries per slot above which an insert grows the tables first.
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.8;

/// Nested grows one top-level operation may trigger before giving up.
pub const DEFAULT_MAX_GROW_DEPTH: usize = 16;

/// Map configuration.
///
/// Built by chaining setters onto [`Config::default`]:
///
/// ```
/// use cuckoo_map::{Config, CuckooMap};
///
/// let config = Config::default()
///     .fan_out(4)
///     .max_evictions(32)
///     .max_load_factor(0.5)
///     .initial_capacity(1_000);
/// let m: CuckooMap<u32, u32> = CuckooMap::with_config(config);
/// assert_eq!(m.fan_out(), 4);
/// assert!(m.capacity() as f64 * 0.5 >= 1_000.0);
/// ```
///
/// Setters validate eagerly and panic on nonsensical values, so a `Config`
/// that exists is always usable. A map reports its layout through its own
/// observers ([`CuckooMap::fan_out`](crate::CuckooMap::fan_out),
/// [`CuckooMap::max_load_factor`](crate::CuckooMap::max_load_factor)).
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub(crate) fan_out: usize,
    pub(crate) initial_capacity: usize,
    pub(crate) max_evictions: usize,
    pub(crate) growth_factor: f64,
    pub(crate) max_load_factor: f64,
    pub(crate) max_grow_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fan_out: DEFAULT_FAN_OUT,
            initial_capacity: 0,
            max_evictions: DEFAULT_MAX_EVICTIONS,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            max_grow_depth: DEFAULT_MAX_GROW_DEPTH,
        }
    }
}

impl Config {
    /// Sets the number of tables (`d`).
    ///
    /// # Panics
    ///
    /// Panics if `n < 2`.
    #[must_use]
    pub fn fan_out(mut self, n: usize) -> Self {
        assert!(n >= 2, "fan-out must be at least 2, got {n}");
        self.fan_out = n;
        self
    }

    /// Sets the number of entries the map should hold without growing.
    #[must_use]
    pub fn initial_capacity(mut self, entries: usize) -> Self {
        self.initial_capacity = entries;
        self
    }

    /// Sets the displacement budget, in rounds over all tables.
    ///
    /// # Panics
    ///
    /// Panics if `rounds == 0`.
    #[must_use]
    pub fn max_evictions(mut self, rounds: usize) -> Self {
        assert!(rounds > 0, "eviction budget must be positive");
        self.max_evictions = rounds;
        self
    }

    /// Sets the per-table capacity multiplier used by each grow.
    ///
    /// # Panics
    ///
    /// Panics unless `factor` is finite and greater than 1.
    #[must_use]
    pub fn growth_factor(mut self, factor: f64) -> Self {
        assert!(
            factor.is_finite() && factor > 1.0,
            "growth factor must be finite and > 1, got {factor}"
        );
        self.growth_factor = factor;
        self
    }

    /// Sets the load factor above which inserts grow the tables.
    ///
    /// # Panics
    ///
    /// Panics unless `0 < factor <= 1`.
    #[must_use]
    pub fn max_load_factor(mut self, factor: f64) -> Self {
        assert!(
            factor > 0.0 && factor <= 1.0,
            "max load factor must be in (0, 1], got {factor}"
        );
        self.max_load_factor = factor;
        self
    }

    /// Sets how many nested grows one operation may trigger.
    ///
    /// # Panics
    ///
    /// Panics if `depth == 0`.
    #[must_use]
    pub fn max_grow_depth(mut self, depth: usize) -> Self {
        assert!(depth > 0, "grow depth must be positive");
        self.max_grow_depth = depth;
        self
    }

    /// Slots per table needed to hold `entries` at the load target, rounded
    /// up to a multiple of 8. `None` if that does not fit in `usize`.
    pub fn capacity_per_table_for(&self, entries: usize) -> Option<usize> {
        let slots = (entries as f64 / self.max_load_factor).ceil();
        if slots >= usize::MAX as f64 {
            return None;
        }
        let per_table = (slots as usize).div_ceil(self.fan_out).max(1);
        let per_table = ceil8(per_table)?;
        per_table.checked_mul(self.fan_out)?;
        Some(per_table)
    }

    /// Slots per table after one grow from `per_table`: strictly larger and a
    /// multiple of 8. `None` on overflow.
    pub fn grown(&self, per_table: usize) -> Option<usize> {
        let target = (per_table as f64 * self.growth_factor).ceil();
        if target >= usize::MAX as f64 {
            return None;
        }
        let next = ceil8((target as usize).max(per_table + 1))?;
        next.checked_mul(self.fan_out)?;
        Some(next)
    }

    pub(crate) fn initial_per_table(&self) -> Option<usize> {
        self.capacity_per_table_for(self.initial_capacity)
    }
}

/// Rounds up to the next multiple of 8.
fn ceil8(n: usize) -> Option<usize> {
    Some(n.checked_add(7)? & !7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.fan_out, 3);
        assert_eq!(c.max_evictions, 100);
        assert_eq!(c.growth_factor, 1.2);
        assert_eq!(c.max_load_factor, 0.8);
        assert_eq!(c.max_grow_depth, 16);
        assert_eq!(c.initial_capacity, 0);
        assert_eq!(c.initial_per_table(), Some(8));
    }

    /// Invariant: per-table capacity is a positive multiple of 8 that holds the
    /// requested entries under the load target.
    #[test]
    fn capacity_for_entries_rounds_to_bytes() {
        let c = Config::default().max_load_factor(0.5);
        assert_eq!(c.capacity_per_table_for(0), Some(8));
        assert_eq!(c.capacity_per_table_for(1), Some(8));
        // 100 entries at 0.5 -> 200 slots -> 67 per table -> 72
        assert_eq!(c.capacity_per_table_for(100), Some(72));
        for n in [0usize, 1, 7, 8, 9, 1000, 12_345] {
            let per = c.capacity_per_table_for(n).unwrap();
            assert_eq!(per % 8, 0);
            assert!((per * c.fan_out) as f64 * 0.5 >= n as f64);
        }
    }

    /// Invariant: every grow strictly increases the per-table capacity and keeps
    /// it byte aligned.
    #[test]
    fn grown_is_strictly_larger() {
        let c = Config::default();
        assert_eq!(c.grown(8), Some(16));
        assert_eq!(c.grown(16), Some(24));
        let mut per = 8;
        for _ in 0..50 {
            let next = c.grown(per).unwrap();
            assert!(next > per);
            assert_eq!(next % 8, 0);
            per = next;
        }
    }

    #[test]
    fn overflow_is_reported() {
        let c = Config::default();
        assert_eq!(c.capacity_per_table_for(usize::MAX), None);
        assert_eq!(c.grown(usize::MAX / 2), None);
    }

    #[test]
    #[should_panic(expected = "fan-out")]
    fn fan_out_below_two_panics() {
        let _ = Config::default().fan_out(1);
    }

    #[test]
    #[should_panic(expected = "growth factor")]
    fn growth_factor_must_exceed_one() {
        let _ = Config::default().growth_factor(1.0);
    }

    #[test]
    #[should_panic(expected = "max load factor")]
    fn load_factor_must_be_in_range() {
        let _ = Config::default().max_load_factor(1.5);
    }

    /// Invariant: setters chain and each one changes only its own knob.
    #[test]
    fn setters_chain() {
        let c = Config::default()
            .fan_out(4)
            .max_evictions(32)
            .growth_factor(1.5)
            .max_load_factor(0.5)
            .max_grow_depth(8)
            .initial_capacity(100);
        assert_eq!(
            (c.fan_out, c.max_evictions, c.max_grow_depth, c.initial_capacity),
            (4, 32, 8, 100)
        );
        assert_eq!((c.growth_factor, c.max_load_factor), (1.5, 0.5));
        assert_ne!(c, Config::default());
    }

    #[test]
    #[should_panic(expected = "eviction budget")]
    fn zero_eviction_budget_panics() {
        let _ = Config::default().max_evictions(0);
    }
}
