//! Weak (observing) handles and promotion back to strong ones.
//!
//! A weak handle keeps the control block's storage alive but not the
//! payload. Its cached observed pointer may only be read by promoting to
//! a [`SharedHandle`] first; `lock` hands back an empty handle once the
//! payload is gone, while the `TryFrom` promotion reports
//! [`BadWeakReference`] instead.

use core::fmt;
use core::ptr::NonNull;

use crate::block::{self, same_block, Block};
use crate::shared::SharedHandle;

/// Error from promoting a weak handle whose payload is already gone.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BadWeakReference;

impl fmt::Display for BadWeakReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weak handle observes a destroyed payload")
    }
}

impl std::error::Error for BadWeakReference {}

/// Weak reference into an ownership group.
///
/// Same shape as [`SharedHandle`] but counted separately: it never keeps
/// the payload alive and never destroys it. The last weak handle to go,
/// after the strong side has already drained, frees the block storage.
pub struct WeakHandle<T: ?Sized> {
    block: Option<NonNull<dyn Block>>,
    observed: Option<NonNull<T>>,
}

impl<T: ?Sized> SharedHandle<T> {
    /// Subscribe a weak observer to this handle's group. Downgrading an
    /// empty handle yields an empty weak handle.
    pub fn downgrade(&self) -> WeakHandle<T> {
        match self.parts() {
            Some((block, observed)) => WeakHandle::subscribe(block, observed),
            None => WeakHandle::default(),
        }
    }
}

impl<T: ?Sized> WeakHandle<T> {
    fn subscribe(block: NonNull<dyn Block>, observed: NonNull<T>) -> Self {
        // SAFETY: callers hand over a block they hold a subscription on.
        unsafe { block.as_ref() }.weak().increment();
        Self {
            block: Some(block),
            observed: Some(observed),
        }
    }

    /// Give up this handle's weak unit; frees the block when it was the
    /// last unit of either kind.
    fn unsubscribe(&mut self) {
        self.observed = None;
        if let Some(block) = self.block.take() {
            // SAFETY: a non-empty weak handle keeps the block allocated.
            unsafe { block.as_ref() }.weak().decrement();
            // SAFETY: the block came from Box::into_raw and this handle no
            // longer references it after the call.
            unsafe { block::release(block) };
        }
    }

    /// `true` iff there is no payload left to promote to: the handle is
    /// empty or the group has no strong holders.
    pub fn expired(&self) -> bool {
        // SAFETY: a held weak unit keeps the block allocated.
        self.block
            .map_or(true, |b| unsafe { b.as_ref() }.strong().get() == 0)
    }

    /// Promote to a strong handle; the result is empty when the payload
    /// is already gone.
    pub fn lock(&self) -> SharedHandle<T> {
        match (self.block, self.observed) {
            (Some(block), Some(observed)) if unsafe { block.as_ref() }.strong().get() > 0 => {
                SharedHandle::subscribe(block, observed)
            }
            _ => SharedHandle::default(),
        }
    }

    /// Drop the subscription and become empty. A no-op on an empty
    /// handle.
    pub fn reset(&mut self) {
        self.unsubscribe();
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_none()
    }

    /// Number of strong handles subscribed to this group; 0 when empty.
    pub fn use_count(&self) -> usize {
        // SAFETY: as in expired.
        self.block
            .map_or(0, |b| unsafe { b.as_ref() }.strong().get())
    }

    /// Number of weak handles subscribed to this group; 0 when empty.
    pub fn weak_count(&self) -> usize {
        // SAFETY: as in expired.
        self.block.map_or(0, |b| unsafe { b.as_ref() }.weak().get())
    }

    /// `true` iff both handles subscribe to the same ownership group.
    pub fn same_group(this: &Self, other: &Self) -> bool {
        match (this.block, other.block) {
            (Some(a), Some(b)) => same_block(a, b),
            _ => false,
        }
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    /// The empty weak handle: expired, observes no group.
    fn default() -> Self {
        Self {
            block: None,
            observed: None,
        }
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match (self.block, self.observed) {
            (Some(block), Some(observed)) => Self::subscribe(block, observed),
            _ => Self::default(),
        }
    }

    /// Same-group assignment leaves the counts untouched.
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

impl<T: ?Sized> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakHandle")
    }
}

impl<T: ?Sized> TryFrom<&WeakHandle<T>> for SharedHandle<T> {
    type Error = BadWeakReference;

    /// Failable promotion; see [`WeakHandle::lock`] for the empty-handle
    /// form.
    fn try_from(weak: &WeakHandle<T>) -> Result<Self, BadWeakReference> {
        let handle = weak.lock();
        if handle.is_empty() {
            Err(BadWeakReference)
        } else {
            Ok(handle)
        }
    }
}
