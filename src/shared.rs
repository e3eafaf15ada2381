//! Strong (owning) handles.
//!
//! A `SharedHandle<T>` pairs a pointer to a control block with a cached
//! pointer to the observed payload. The two usually point at the same
//! object, but aliasing lets the observed pointer reference a sub-object
//! whose lifetime is tied to the group's managed payload.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};

use crate::block::{self, same_block, Block, CombinedBlock, SeparateBlock};

/// Strong reference into an ownership group.
///
/// Holding one keeps the group's payload alive; the payload is destroyed
/// at the instant the last strong handle is dropped or reset, even while
/// weak handles remain. An empty handle owns nothing and every observer
/// on it is a safe no-op.
///
/// Handles are `!Send`/`!Sync`: counts are plain cells and the raw block
/// pointer pins the whole group to one thread.
pub struct SharedHandle<T: ?Sized> {
    block: Option<NonNull<dyn Block>>,
    observed: Option<NonNull<T>>,
    // Owns a share of the payload for drop-check purposes.
    _owns: PhantomData<T>,
}

impl<T: 'static> SharedHandle<T> {
    /// Construct the payload in place inside its own control block.
    ///
    /// Exactly one heap allocation holds both the counts and the value.
    pub fn new(value: T) -> Self {
        let block = Box::leak(Box::new(CombinedBlock::new(value)));
        // SAFETY: the in-block storage pointer of a live block is never null.
        let observed = unsafe { NonNull::new_unchecked(block.payload_ptr()) };
        Self::subscribe(NonNull::from(block), observed)
    }

    /// Take over a payload that was allocated on its own.
    ///
    /// The payload keeps its allocation; a fresh control block is
    /// allocated beside it.
    pub fn from_box(payload: Box<T>) -> Self {
        // SAFETY: the pointer comes straight from Box::into_raw.
        unsafe { Self::from_raw(Box::into_raw(payload)) }
    }

    /// Take over a raw payload pointer. A null pointer yields an empty
    /// handle.
    ///
    /// # Safety
    ///
    /// A non-null `payload` must come from `Box::into_raw`, and ownership
    /// transfers to the returned handle: the caller must not free it or
    /// wrap it a second time.
    pub unsafe fn from_raw(payload: *mut T) -> Self {
        match NonNull::new(payload) {
            Some(observed) => {
                let block = Box::leak(Box::new(SeparateBlock::new(payload)));
                Self::subscribe(NonNull::from(block), observed)
            }
            None => Self::default(),
        }
    }

    /// Drop the current subscription, then wrap `payload` in a fresh
    /// ownership group.
    pub fn reset_box(&mut self, payload: Box<T>) {
        self.unsubscribe();
        *self = Self::from_box(payload);
    }
}

impl<T: ?Sized> SharedHandle<T> {
    /// Subscribe a new strong holder to `block`, observing `observed`.
    pub(crate) fn subscribe(block: NonNull<dyn Block>, observed: NonNull<T>) -> Self {
        // SAFETY: callers hand over a block that is still live (they hold
        // a subscription of their own or just created it).
        unsafe { block.as_ref() }.strong().increment();
        Self {
            block: Some(block),
            observed: Some(observed),
            _owns: PhantomData,
        }
    }

    /// Give up this handle's strong unit. Destroys the payload when the
    /// unit was the last one, and frees the block when no weak observer
    /// remains either.
    fn unsubscribe(&mut self) {
        self.observed = None;
        if let Some(block) = self.block.take() {
            // SAFETY: a non-empty handle holds a strong unit, so the block
            // is still allocated.
            let b = unsafe { block.as_ref() };
            if b.strong().decrement() == 0 {
                // Pin the block while the payload runs drop code: a
                // payload-held weak handle to this very group reaching
                // zero mid-teardown must not free the block under us.
                b.weak().increment();
                b.destroy_payload();
                b.weak().decrement();
            }
            // SAFETY: the block came from Box::into_raw and this handle no
            // longer references it after the call.
            unsafe { block::release(block) };
        }
    }

    /// Share `owner`'s group while observing `observed`.
    ///
    /// The returned handle keeps `owner`'s managed payload alive; its own
    /// observed pointer is whatever the caller supplied.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is empty.
    ///
    /// # Safety
    ///
    /// `observed` must stay valid for reads until the group's managed
    /// payload is destroyed.
    pub unsafe fn alias<U: ?Sized>(owner: &SharedHandle<U>, observed: NonNull<T>) -> Self {
        let block = owner.block.expect("aliasing an empty handle");
        Self::subscribe(block, observed)
    }

    /// Safe aliasing: observe a projection of this handle's payload.
    ///
    /// ```
    /// use rc_handle::SharedHandle;
    ///
    /// struct Pair { left: u32, right: u32 }
    /// let pair = SharedHandle::new(Pair { left: 1, right: 2 });
    /// let right = SharedHandle::project(&pair, |p| &p.right);
    /// assert_eq!(pair.left, 1);
    /// drop(pair);
    /// assert_eq!(*right, 2);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `this` is empty.
    pub fn project<U: ?Sized, F>(this: &Self, f: F) -> SharedHandle<U>
    where
        F: FnOnce(&T) -> &U,
    {
        let observed = NonNull::from(f(&**this));
        // SAFETY: `observed` borrows from this handle's payload, which the
        // shared group keeps valid until its managed payload is destroyed.
        unsafe { SharedHandle::alias(this, observed) }
    }

    /// Drop the subscription and become empty. A no-op on an empty
    /// handle.
    pub fn reset(&mut self) {
        self.unsubscribe();
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Borrow the observed payload, or `None` on an empty handle.
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-empty handle holds a strong unit, so the payload
        // is alive and the observed pointer is valid for reads.
        self.observed.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Raw observed pointer; null on an empty handle.
    pub fn as_ptr(&self) -> *const T
    where
        T: Sized,
    {
        self.observed
            .map_or(ptr::null(), |p| p.as_ptr() as *const T)
    }

    /// Number of strong handles subscribed to this group; 0 when empty.
    pub fn use_count(&self) -> usize {
        // SAFETY: a held subscription keeps the block allocated.
        self.block
            .map_or(0, |b| unsafe { b.as_ref() }.strong().get())
    }

    /// Number of weak handles subscribed to this group; 0 when empty.
    pub fn weak_count(&self) -> usize {
        // SAFETY: as in use_count.
        self.block.map_or(0, |b| unsafe { b.as_ref() }.weak().get())
    }

    /// `true` iff both handles subscribe to the same ownership group.
    /// Empty handles belong to no group.
    pub fn same_group(this: &Self, other: &Self) -> bool {
        match (this.block, other.block) {
            (Some(a), Some(b)) => same_block(a, b),
            _ => false,
        }
    }

    /// `true` iff both handles observe the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.observed == other.observed
    }

    pub(crate) fn parts(&self) -> Option<(NonNull<dyn Block>, NonNull<T>)> {
        match (self.block, self.observed) {
            (Some(block), Some(observed)) => Some((block, observed)),
            _ => None,
        }
    }
}

impl<T: ?Sized> Default for SharedHandle<T> {
    /// The empty handle: observes nothing, owns no block.
    fn default() -> Self {
        Self {
            block: None,
            observed: None,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        match self.parts() {
            Some((block, observed)) => Self::subscribe(block, observed),
            None => Self::default(),
        }
    }

    /// Same-group assignment skips the unsubscribe/resubscribe pair and
    /// only copies the observed pointer; the counts never move.
    fn clone_from(&mut self, source: &Self) {
        match (self.block, source.block) {
            (Some(a), Some(b)) if same_block(a, b) => {
                self.observed = source.observed;
            }
            _ => {
                self.unsubscribe();
                *self = source.clone();
            }
        }
    }
}

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T: ?Sized> Deref for SharedHandle<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics when the handle is empty, mirroring what dereferencing a
    /// null raw pointer would mean; use [`SharedHandle::get`] for a
    /// checked borrow.
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty SharedHandle")
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("SharedHandle").field(&v).finish(),
            None => f.write_str("SharedHandle(<empty>)"),
        }
    }
}
