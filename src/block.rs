//! Control blocks: per-group bookkeeping behind the shared/weak handles.
//!
//! One block exists per ownership group. It tracks how many strong and
//! weak handles currently subscribe, knows how to destroy its payload,
//! and is freed by [`release`] once both counts are zero. Handles are
//! the only callers; nothing else may touch the counts.

use core::cell::{Cell, UnsafeCell};
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::count::RefCount;

/// Capability interface shared by both block variants.
///
/// The variants differ only in where the payload lives and how
/// `destroy_payload` reclaims it. `destroy_payload` is idempotent: the
/// second and later calls are no-ops.
pub(crate) trait Block {
    fn strong(&self) -> &RefCount;
    fn weak(&self) -> &RefCount;
    fn destroy_payload(&self);
}

/// Identity comparison of two block pointers. Compares the data address
/// only; vtable metadata is ignored.
pub(crate) fn same_block(a: NonNull<dyn Block>, b: NonNull<dyn Block>) -> bool {
    a.as_ptr().cast::<()>() == b.as_ptr().cast::<()>()
}

/// Free a block's own storage once no handle can observe it again.
///
/// This is the single decision point for block reclamation: callers
/// decrement their count first, then offer the block here. If either
/// count is still nonzero the call is a no-op.
///
/// # Safety
///
/// `block` must originate from `Box::into_raw`, and if this call ends up
/// freeing it the caller must not touch the block again.
pub(crate) unsafe fn release(block: NonNull<dyn Block>) {
    let b = block.as_ref();
    if b.strong().get() == 0 && b.weak().get() == 0 {
        drop(Box::from_raw(block.as_ptr()));
    }
}

/// Block for a payload allocated on its own. The block owns the
/// allocation through a raw pointer and returns it to `Box` on
/// destruction.
pub(crate) struct SeparateBlock<T> {
    strong: RefCount,
    weak: RefCount,
    payload: Cell<*mut T>,
}

impl<T> SeparateBlock<T> {
    /// `payload` must come from `Box::into_raw`; ownership moves into
    /// the block.
    pub(crate) fn new(payload: *mut T) -> Self {
        Self {
            strong: RefCount::new(0),
            weak: RefCount::new(0),
            payload: Cell::new(payload),
        }
    }
}

impl<T> Block for SeparateBlock<T> {
    fn strong(&self) -> &RefCount {
        &self.strong
    }

    fn weak(&self) -> &RefCount {
        &self.weak
    }

    fn destroy_payload(&self) {
        let p = self.payload.replace(ptr::null_mut());
        if !p.is_null() {
            // SAFETY: `p` came from `Box::into_raw` in the constructor and
            // the slot is nulled first, so the allocation is returned to
            // `Box` exactly once.
            unsafe { drop(Box::from_raw(p)) };
        }
    }
}

impl<T> Drop for SeparateBlock<T> {
    fn drop(&mut self) {
        // Handle paths destroy the payload before releasing the block;
        // this covers a block dropped any other way.
        self.destroy_payload();
    }
}

/// Block whose payload lives inside the block itself: one allocation
/// holds the counts and the value.
pub(crate) struct CombinedBlock<T> {
    strong: RefCount,
    weak: RefCount,
    alive: Cell<bool>,
    storage: UnsafeCell<MaybeUninit<T>>,
}

impl<T> CombinedBlock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            strong: RefCount::new(0),
            weak: RefCount::new(0),
            alive: Cell::new(true),
            storage: UnsafeCell::new(MaybeUninit::new(value)),
        }
    }

    /// Pointer to the in-block payload. Only valid to read through while
    /// the payload is alive.
    pub(crate) fn payload_ptr(&self) -> *mut T {
        self.storage.get().cast::<T>()
    }
}

impl<T> Block for CombinedBlock<T> {
    fn strong(&self) -> &RefCount {
        &self.strong
    }

    fn weak(&self) -> &RefCount {
        &self.weak
    }

    fn destroy_payload(&self) {
        if self.alive.replace(false) {
            // SAFETY: the flag was set, so the storage holds an initialized
            // payload; flipping it first keeps a reentrant call a no-op.
            unsafe { ptr::drop_in_place(self.payload_ptr()) };
        }
    }
}

impl<T> Drop for CombinedBlock<T> {
    fn drop(&mut self) {
        self.destroy_payload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;
    use std::rc::Rc;

    struct Tally(Rc<StdCell<u32>>);

    impl Drop for Tally {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    /// Invariant: both variants start with zero counts and mutate them
    /// only through the accessors.
    #[test]
    fn counts_start_at_zero() {
        let sep = SeparateBlock::new(Box::into_raw(Box::new(7_i32)));
        assert_eq!(sep.strong().get(), 0);
        assert_eq!(sep.weak().get(), 0);
        sep.strong().increment();
        sep.weak().increment();
        assert_eq!(sep.strong().get(), 1);
        assert_eq!(sep.weak().get(), 1);
        sep.strong().decrement();
        sep.weak().decrement();

        let comb = CombinedBlock::new(7_i32);
        assert_eq!(comb.strong().get(), 0);
        assert_eq!(comb.weak().get(), 0);
    }

    /// Invariant: destroy_payload runs the payload destructor exactly
    /// once, no matter how many times it is called.
    #[test]
    fn separate_destroy_is_idempotent() {
        let tally = Rc::new(StdCell::new(0));
        let block = SeparateBlock::new(Box::into_raw(Box::new(Tally(tally.clone()))));
        block.destroy_payload();
        assert_eq!(tally.get(), 1);
        block.destroy_payload();
        assert_eq!(tally.get(), 1);
        drop(block);
        assert_eq!(tally.get(), 1);
    }

    #[test]
    fn combined_destroy_is_idempotent() {
        let tally = Rc::new(StdCell::new(0));
        let block = CombinedBlock::new(Tally(tally.clone()));
        block.destroy_payload();
        assert_eq!(tally.get(), 1);
        block.destroy_payload();
        assert_eq!(tally.get(), 1);
        drop(block);
        assert_eq!(tally.get(), 1);
    }

    /// Invariant: a block dropped without an explicit destroy still
    /// reclaims its payload exactly once.
    #[test]
    fn drop_reclaims_undestroyed_payload() {
        let tally = Rc::new(StdCell::new(0));
        drop(SeparateBlock::new(Box::into_raw(Box::new(Tally(
            tally.clone(),
        )))));
        assert_eq!(tally.get(), 1);

        let tally = Rc::new(StdCell::new(0));
        drop(CombinedBlock::new(Tally(tally.clone())));
        assert_eq!(tally.get(), 1);
    }

    /// Invariant: release frees the block only when both counts are zero.
    #[test]
    fn release_requires_both_counts_zero() {
        let tally = Rc::new(StdCell::new(0));
        let block: NonNull<dyn Block> = NonNull::from(Box::leak(Box::new(CombinedBlock::new(
            Tally(tally.clone()),
        ))));

        let b = unsafe { block.as_ref() };
        b.strong().increment();
        b.weak().increment();

        // Neither count is zero: release must not free.
        unsafe { release(block) };
        assert_eq!(unsafe { block.as_ref() }.strong().get(), 1);

        unsafe { block.as_ref() }.strong().decrement();
        unsafe { block.as_ref() }.destroy_payload();
        unsafe { release(block) };
        // Weak unit still outstanding: block storage must survive.
        assert_eq!(unsafe { block.as_ref() }.weak().get(), 1);
        assert_eq!(tally.get(), 1);

        unsafe { block.as_ref() }.weak().decrement();
        unsafe { release(block) };
        // Block is gone now; the payload destructor ran exactly once.
        assert_eq!(tally.get(), 1);
    }
}
