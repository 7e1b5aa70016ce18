// Allocator propagation.
//
// A counting allocator records every allocation and release made through it.
// Invariants exercised:
// - The slot arena lives in the map's allocator, including across growth.
// - Dropping a map returns every byte it allocated.
// - clone_in / into_allocator move storage to the requested allocator.
use allocator_api2::alloc::{AllocError, Allocator, Global, Layout};
use cuckoo_map::{CuckooMap, Seeded};
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

#[derive(Default)]
struct Stats {
    allocations: Cell<usize>,
    live_bytes: Cell<usize>,
}

#[derive(Clone, Default)]
struct Counting(Rc<Stats>);

impl Counting {
    fn allocations(&self) -> usize {
        self.0.allocations.get()
    }
    fn live_bytes(&self) -> usize {
        self.0.live_bytes.get()
    }
}

unsafe impl Allocator for Counting {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let block = Global.allocate(layout)?;
        self.0.allocations.set(self.0.allocations.get() + 1);
        self.0.live_bytes.set(self.0.live_bytes.get() + layout.size());
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.0.live_bytes.set(self.0.live_bytes.get() - layout.size());
        Global.deallocate(ptr, layout)
    }
}

type CountedMap<K, V> = CuckooMap<K, V, Seeded, Counting>;

#[test]
fn arena_is_allocated_in_the_map_allocator() {
    let alloc = Counting::default();
    let mut m: CountedMap<u64, String> = CuckooMap::new_in(alloc.clone());
    assert!(alloc.allocations() >= 1);
    let after_new = alloc.allocations();

    for i in 0..1_000u64 {
        m.insert(i, i.to_string());
    }
    assert!(alloc.allocations() > after_new, "growth reallocates through the map allocator");
    assert!(alloc.live_bytes() > 0);
    assert_eq!(m.get(&999).map(String::as_str), Some("999"));
    assert_eq!(m.allocator().allocations(), alloc.allocations());

    drop(m);
    assert_eq!(alloc.live_bytes(), 0, "drop releases the arena");
}

#[test]
fn with_capacity_in_allocates_once_up_front() {
    let alloc = Counting::default();
    let mut m: CountedMap<u32, u32> = CuckooMap::with_capacity_in(500, alloc.clone());
    let before = alloc.allocations();
    for i in 0..500 {
        m.insert(i, i);
    }
    assert_eq!(alloc.allocations(), before, "no growth within the requested capacity");
}

#[test]
fn clone_in_uses_target_allocator() {
    let source = Counting::default();
    let target = Counting::default();
    let mut m: CountedMap<u32, u32> = CuckooMap::new_in(source.clone());
    m.extend((0..100).map(|i| (i, i * 2)));

    let copy = m.clone_in(target.clone());
    assert!(target.live_bytes() > 0);
    assert_eq!(copy.len(), 100);
    assert!((0..100).all(|i| copy.get(&i) == Some(&(i * 2))));

    drop(copy);
    assert_eq!(target.live_bytes(), 0);
    assert!(source.live_bytes() > 0);
}

#[test]
fn into_allocator_moves_storage() {
    let alloc = Counting::default();
    let mut m: CountedMap<u32, u32> = CuckooMap::new_in(alloc.clone());
    m.extend((0..300).map(|i| (i, i + 1)));

    let moved: CuckooMap<u32, u32, Seeded, Global> = m.into_allocator(Global);
    assert_eq!(alloc.live_bytes(), 0, "old arena is released");
    assert_eq!(moved.len(), 300);
    assert!((0..300).all(|i| moved[&i] == i + 1));
}

#[test]
fn clone_shares_allocator() {
    let alloc = Counting::default();
    let mut m: CountedMap<u32, u32> = CuckooMap::new_in(alloc.clone());
    m.insert(1, 1);
    let before = alloc.live_bytes();
    let c = m.clone();
    assert!(alloc.live_bytes() > before);
    assert_eq!(c, m);
}
