//! Debug-only busy flag for mutating map sections.
//!
//! An eviction chain or grow runs user hash and equality code while one entry
//! is held outside the tables. If that code re-enters the same map, it would
//! observe a half-moved state. Debug builds panic on such nested entry; release
//! builds carry a zero-sized marker instead.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct BusyFlag {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // Same auto traits in every build profile: Send, !Sync.
    #[cfg(not(debug_assertions))]
    _marker: PhantomData<Cell<bool>>,
}

impl BusyFlag {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            #[cfg(not(debug_assertions))]
            _marker: PhantomData,
        }
    }

    /// Marks the owner busy until the returned guard drops.
    ///
    /// # Panics
    ///
    /// In debug builds, if the owner is already busy.
    #[inline]
    pub(crate) fn enter(&self) -> BusyGuard<'_> {
        #[cfg(debug_assertions)]
        assert!(
            !self.busy.replace(true),
            "reentrant access to a map while it is rearranging entries"
        );
        BusyGuard {
            flag: self,
            _lt: PhantomData,
        }
    }
}

pub(crate) struct BusyGuard<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    flag: &'a BusyFlag,
    _lt: PhantomData<&'a ()>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.flag.busy.set(false);
    }
}
