//! RawCuckooMap: the placement and growth engine.
//!
//! Entries live in [`TableArray`] slots addressed by flattened position. A key
//! `k` may sit in table `t` only at offset `route(k, t)`; lookups probe those
//! `d` offsets and nothing else. Inserting runs a bounded displacement chain
//! that walks the tables round-robin, bumping occupants forward until some
//! entry lands in an empty slot. When the budget runs out the tables grow and
//! the entry in hand is placed again.
//!
//! Growing keeps every table's existing slots at their offsets, then relocates
//! the entries whose route changed with the new modulus. Relocation may itself
//! exhaust the budget and grow again; each nested grow relocates everything,
//! so an outer relocation pass stops as soon as the layout has moved on.
//!
//! The façade never inserts a key that is already present, so this layer does
//! not look for duplicates while placing.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::reentrancy::BusyFlag;
use crate::router::{route, TableHasher};
use crate::tables::{Bucket, TableArray};
use allocator_api2::alloc::{Allocator, Global};
use core::borrow::Borrow;

/// Tables plus everything needed to place into them.
#[derive(Clone)]
struct Engine<K, V, H, A: Allocator> {
    tables: TableArray<K, V, A>,
    hasher: H,
    config: Config,
    /// Position of the entry a top-level insert is tracking. `None` while that
    /// entry is in hand.
    watch: Option<usize>,
}

pub(crate) struct RawCuckooMap<K, V, H, A: Allocator = Global> {
    engine: Engine<K, V, H, A>,
    busy: BusyFlag,
}

impl<K: Clone, V: Clone, H: Clone, A: Allocator + Clone> Clone for RawCuckooMap<K, V, H, A> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            busy: BusyFlag::new(),
        }
    }
}

#[cold]
#[inline(never)]
fn capacity_overflow() -> ! {
    panic!("capacity overflow");
}

#[cold]
#[inline(never)]
fn capacity_exhausted(per_table: usize, fan_out: usize, len: usize, depth: usize) -> ! {
    log::error!(
        "capacity exhausted: {len} entries in {fan_out} tables of {per_table} slots after {depth} nested grows"
    );
    panic!("capacity exhausted: no placement found after {depth} nested grows ({len} entries)");
}

impl<K, V, H, A: Allocator> Engine<K, V, H, A> {
    fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        let per_table = self.tables.per_table();
        (0..self.tables.fan_out()).find_map(|t| {
            let pos = self.tables.address(t, route(&self.hasher, q, t, per_table));
            match self.tables.get(pos) {
                Some((k, _)) if k.borrow() == q => Some(pos),
                _ => None,
            }
        })
    }

    /// Whether the live entry at `pos` sits at its route for the table it
    /// occupies.
    fn is_home(&self, pos: usize) -> bool
    where
        H: TableHasher<K>,
    {
        let Some((k, _)) = self.tables.get(pos) else {
            return false;
        };
        let (t, o) = self.tables.split(pos);
        route(&self.hasher, k, t, self.tables.per_table()) == o
    }

    /// One bounded displacement chain. On failure hands back the entry left in
    /// hand and whether it is the watched one.
    fn place(&mut self, entry: (K, V), watched: bool) -> core::result::Result<(), ((K, V), bool)>
    where
        H: TableHasher<K>,
    {
        let per_table = self.tables.per_table();
        let (mut held, mut held_watched) = (entry, watched);
        for _ in 0..self.config.max_evictions {
            for t in 0..self.tables.fan_out() {
                let pos = self.tables.address(t, route(&self.hasher, &held.0, t, per_table));
                let occupant_watched = self.watch == Some(pos);
                if held_watched {
                    self.watch = Some(pos);
                } else if occupant_watched {
                    self.watch = None;
                }
                match self.tables.swap_in(pos, held) {
                    None => return Ok(()),
                    Some(evicted) => {
                        held = evicted;
                        held_watched = occupant_watched;
                    }
                }
            }
        }
        Err((held, held_watched))
    }

    /// Places `entry`, growing as often as needed up to the configured depth.
    fn place_or_grow(&mut self, entry: (K, V), watched: bool, depth: usize)
    where
        H: TableHasher<K>,
    {
        let Err((held, held_watched)) = self.place(entry, watched) else {
            return;
        };
        let per_table = self.tables.per_table();
        if depth >= self.config.max_grow_depth {
            self.drop_stranded();
            capacity_exhausted(per_table, self.tables.fan_out(), self.tables.len(), depth);
        }
        log::trace!("eviction budget exhausted at {per_table} slots per table, growing");
        let next = self.config.grown(per_table).unwrap_or_else(|| {
            self.drop_stranded();
            capacity_overflow()
        });
        self.grow_to(next, depth + 1);
        self.place_or_grow(held, held_watched, depth + 1);
    }

    /// Drops every live entry that is off its route, leaving a consistent map
    /// behind before a fatal panic. Only an unfinished relocation pass strands
    /// entries like that.
    #[cold]
    fn drop_stranded(&mut self)
    where
        H: TableHasher<K>,
    {
        self.watch = None;
        let mut dropped = 0usize;
        let mut cursor = self.tables.next_live(0);
        while let Some(pos) = cursor {
            if !self.is_home(pos) {
                drop(self.tables.take(pos));
                dropped += 1;
            }
            cursor = self.tables.next_live(pos + 1);
        }
        if dropped > 0 {
            log::error!("dropping {dropped} entries left unplaced by an unfinished grow");
        }
    }

    /// Enlarges every table to `per_table` slots and relocates the entries
    /// whose route changed.
    fn grow_to(&mut self, per_table: usize, depth: usize)
    where
        H: TableHasher<K>,
    {
        let old = self.tables.per_table();
        debug_assert!(per_table > old);
        log::debug!(
            "growing {} tables from {old} to {per_table} slots ({} live, depth {depth})",
            self.tables.fan_out(),
            self.tables.len(),
        );

        if let Some(pos) = self.watch {
            self.watch = Some(self.tables.readdress(pos, per_table));
        }
        self.tables.regrow(per_table);

        let mut misplaced = Vec::new();
        let mut cursor = self.tables.next_live(0);
        while let Some(pos) = cursor {
            if !self.is_home(pos) {
                misplaced.push(pos);
            }
            cursor = self.tables.next_live(pos + 1);
        }
        log::trace!("relocating {} of {} entries", misplaced.len(), self.tables.len());

        for pos in misplaced {
            if self.tables.per_table() != per_table {
                // A nested grow already relocated everything.
                break;
            }
            if !self.tables.is_live(pos) || self.is_home(pos) {
                continue;
            }
            let watched = self.watch == Some(pos);
            if watched {
                self.watch = None;
            }
            let Some(entry) = self.tables.take(pos) else {
                continue;
            };
            self.place_or_grow(entry, watched, depth);
        }
    }
}

impl<K, V, H, A: Allocator> RawCuckooMap<K, V, H, A> {
    pub(crate) fn with_config_and_hasher_in(config: Config, hasher: H, alloc: A) -> Self {
        let per_table = config
            .initial_per_table()
            .unwrap_or_else(|| capacity_overflow());
        Self::with_per_table_in(config, hasher, alloc, per_table)
    }

    fn with_per_table_in(config: Config, hasher: H, alloc: A, per_table: usize) -> Self {
        Self {
            engine: Engine {
                tables: TableArray::new_in(config.fan_out, per_table, alloc),
                hasher,
                config,
                watch: None,
            },
            busy: BusyFlag::new(),
        }
    }

    #[inline]
    pub(crate) fn tables(&self) -> &TableArray<K, V, A> {
        &self.engine.tables
    }

    #[inline]
    pub(crate) fn tables_mut(&mut self) -> &mut TableArray<K, V, A> {
        &mut self.engine.tables
    }

    pub(crate) fn into_tables(self) -> TableArray<K, V, A> {
        self.engine.tables
    }

    pub(crate) fn hasher(&self) -> &H {
        &self.engine.hasher
    }

    pub(crate) fn config(&self) -> &Config {
        &self.engine.config
    }

    pub(crate) fn set_max_load_factor(&mut self, factor: f64) {
        self.engine.config = self.engine.config.clone().max_load_factor(factor);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.engine.tables.len()
    }

    /// Position of the live entry whose key equals `q`.
    pub(crate) fn find<Q>(&self, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: TableHasher<Q>,
    {
        let _busy = self.busy.enter();
        self.engine.find(q)
    }

    /// Inserts an entry whose key is known to be absent and returns its final
    /// position. May grow the tables.
    ///
    /// # Panics
    ///
    /// If no placement is found within the configured number of nested grows.
    /// Entries an unfinished relocation left off their route are dropped
    /// first, so the map is still consistent after the unwind.
    pub(crate) fn insert_unique(&mut self, key: K, value: V) -> usize
    where
        H: TableHasher<K>,
    {
        let _busy = self.busy.enter();
        let engine = &mut self.engine;
        let mut depth = 0;
        let (len, total) = (engine.tables.len(), engine.tables.total());
        if (len + 1) as f64 > total as f64 * engine.config.max_load_factor {
            let per_table = engine
                .config
                .grown(engine.tables.per_table())
                .zip(engine.config.capacity_per_table_for(len + 1))
                .map(|(grown, needed)| grown.max(needed))
                .unwrap_or_else(|| capacity_overflow());
            log::trace!("load target reached at {len} entries, growing");
            depth = 1;
            engine.grow_to(per_table, depth);
        }
        engine.watch = None;
        engine.place_or_grow((key, value), true, depth);
        engine
            .watch
            .take()
            .expect("a placed entry is always tracked to its slot")
    }

    /// Moves the live entry at `pos` out of the map.
    pub(crate) fn take_at(&mut self, pos: usize) -> Option<(K, V)> {
        let _busy = self.busy.enter();
        self.engine.tables.take(pos)
    }

    /// Grows, if needed, so that `entries` live entries fit under the load
    /// target. Returns whether the layout changed.
    pub(crate) fn reserve_for(&mut self, entries: usize) -> Result<bool>
    where
        H: TableHasher<K>,
    {
        let engine = &mut self.engine;
        let per_table = engine
            .config
            .capacity_per_table_for(entries)
            .filter(|&per| {
                per.checked_mul(engine.tables.fan_out())
                    .and_then(|n| n.checked_mul(core::mem::size_of::<Bucket<K, V>>()))
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or(Error::CapacityOverflow)?;
        if per_table <= engine.tables.per_table() {
            return Ok(false);
        }
        let _busy = self.busy.enter();
        engine.grow_to(per_table, 1);
        Ok(true)
    }

    /// Drops every entry and returns to the configured initial capacity.
    pub(crate) fn clear(&mut self) {
        let _busy = self.busy.enter();
        let per_table = self
            .engine
            .config
            .initial_per_table()
            .unwrap_or_else(|| capacity_overflow());
        self.engine.tables.reset(per_table);
    }

    /// Deep copy into another allocator, keeping every entry's position.
    pub(crate) fn clone_in<B: Allocator>(&self, alloc: B) -> RawCuckooMap<K, V, H, B>
    where
        K: Clone,
        V: Clone,
        H: Clone,
    {
        RawCuckooMap {
            engine: Engine {
                tables: self.engine.tables.clone_in(alloc),
                hasher: self.engine.hasher.clone(),
                config: self.engine.config.clone(),
                watch: None,
            },
            busy: BusyFlag::new(),
        }
    }

    /// Rebuilds the map in `alloc` by reinserting every entry.
    pub(crate) fn into_allocator<B: Allocator>(self, alloc: B) -> RawCuckooMap<K, V, H, B>
    where
        H: TableHasher<K>,
    {
        let Engine {
            tables,
            hasher,
            config,
            ..
        } = self.engine;
        let per_table = config
            .capacity_per_table_for(tables.len())
            .unwrap_or_else(|| capacity_overflow());
        let mut out = RawCuckooMap::with_per_table_in(config, hasher, alloc, per_table);
        for (k, v) in tables.into_buckets().flatten() {
            out.insert_unique(k, v);
        }
        out
    }

    /// Structural checks: table bookkeeping agrees, every entry sits at its
    /// home, and no key is live twice.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self)
    where
        K: Eq,
        H: TableHasher<K>,
    {
        let engine = &self.engine;
        let tables = &engine.tables;
        tables.assert_consistent();
        assert_eq!(tables.per_table() % 8, 0);
        assert!(engine.watch.is_none(), "watch left set after an operation");
        let mut cursor = tables.next_live(0);
        while let Some(pos) = cursor {
            assert!(engine.is_home(pos), "entry at {pos} is not at its route");
            if let Some((k, _)) = tables.get(pos) {
                let homes = (0..tables.fan_out())
                    .map(|t| tables.address(t, route(&engine.hasher, k, t, tables.per_table())))
                    .filter(|&p| tables.get(p).is_some_and(|(other, _)| other == k))
                    .count();
                assert_eq!(homes, 1, "key at {pos} is live more than once");
            }
            cursor = tables.next_live(pos + 1);
        }
    }
}
