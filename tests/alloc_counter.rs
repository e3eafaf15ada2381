// Allocation accounting for handle storage.
//
// A counting global allocator verifies the two storage contracts that
// unit tests cannot see:
// - construct-in-place uses exactly one heap allocation for block and
//   payload combined, while the wrapping constructor uses two;
// - block storage is reclaimed exactly once, only after both counts
//   have reached zero, in either drop order.
//
// Everything runs inside one test function so no concurrent test can
// allocate inside a measurement window.

use rc_handle::SharedHandle;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

struct CountingAllocator;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static DEALLOCATIONS: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOCATIONS.fetch_add(1, Relaxed);
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        DEALLOCATIONS.fetch_add(1, Relaxed);
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

/// Run `f` and report (allocations, deallocations, result) for the
/// window.
fn window<R>(f: impl FnOnce() -> R) -> (usize, usize, R) {
    let a0 = ALLOCATIONS.load(Relaxed);
    let d0 = DEALLOCATIONS.load(Relaxed);
    let r = f();
    (
        ALLOCATIONS.load(Relaxed) - a0,
        DEALLOCATIONS.load(Relaxed) - d0,
        r,
    )
}

#[test]
fn allocation_accounting() {
    // Construct-in-place: exactly one allocation for block + payload.
    let (allocs, deallocs, handle) = window(|| SharedHandle::new(7_u64));
    assert_eq!(allocs, 1, "construct-in-place must allocate once");
    assert_eq!(deallocs, 0);

    // Tearing the lone handle down frees exactly that allocation.
    let (allocs, deallocs, ()) = window(move || drop(handle));
    assert_eq!(allocs, 0);
    assert_eq!(deallocs, 1, "block storage must be freed exactly once");

    // Wrapping an existing box: payload allocation plus block allocation.
    let (allocs, _, handle) = window(|| SharedHandle::from_box(Box::new(7_u64)));
    assert_eq!(allocs, 2, "wrapping adds one block beside the payload");

    // Weak-last teardown: dropping the strong side destroys the payload
    // (one free for the separate allocation) but must keep the block.
    let weak = handle.downgrade();
    let (_, deallocs, ()) = window(move || drop(handle));
    assert_eq!(deallocs, 1, "only the payload may be freed here");
    let (_, deallocs, ()) = window(move || drop(weak));
    assert_eq!(deallocs, 1, "the last weak unit frees the block");

    // Strong-last teardown of a combined group: the weak handle leaves
    // nothing behind, the strong handle frees block + payload together.
    let handle = SharedHandle::new(7_u64);
    let weak = handle.downgrade();
    let (_, deallocs, ()) = window(move || drop(weak));
    assert_eq!(deallocs, 0, "weak teardown must not free a live group");
    let (_, deallocs, ()) = window(move || drop(handle));
    assert_eq!(deallocs, 1);

    // Full end-to-end balance: nothing leaks, nothing double-frees.
    let (allocs, deallocs, ()) = window(|| {
        let a = SharedHandle::from_box(Box::new(1_u64));
        let b = a.clone();
        let w1 = a.downgrade();
        let w2 = w1.clone();
        drop(a);
        drop(w1);
        drop(b);
        drop(w2);
    });
    assert_eq!(allocs, deallocs, "every allocation must be freed exactly once");
    assert_eq!(allocs, 2);
}
