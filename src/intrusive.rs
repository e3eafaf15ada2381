//! Counted handle whose reference count lives inside the pointee.
//!
//! The minimal intrusive contract: increment on clone, decrement on
//! drop, destroy the pointee when the count hits zero, read the count.
//! Structurally this is the strong half of a control block embedded in
//! the payload itself, which is why it shares [`RefCount`]; it has no
//! weak side and is independent of the block-based handles.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

use crate::count::RefCount;

/// Embed a [`RefCount`] and expose it to [`IntrusiveHandle`].
///
/// Pointees are heap-allocated through [`IntrusiveHandle::new`] or
/// [`IntrusiveHandle::from_box`]; the handle returns the allocation to
/// `Box` when the count reaches zero.
pub trait EmbeddedCount {
    fn embedded_count(&self) -> &RefCount;
}

/// Counted pointer over a pointee that embeds its own count.
pub struct IntrusiveHandle<T: EmbeddedCount> {
    payload: Option<NonNull<T>>,
    // Owns a share of the pointee for drop-check purposes.
    _owns: PhantomData<T>,
}

impl<T: EmbeddedCount> IntrusiveHandle<T> {
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    pub fn from_box(payload: Box<T>) -> Self {
        let p = NonNull::from(Box::leak(payload));
        // SAFETY: freshly leaked, the pointee is live.
        unsafe { p.as_ref() }.embedded_count().increment();
        Self {
            payload: Some(p),
            _owns: PhantomData,
        }
    }

    /// Mint another handle to a pointee that is already owned by at
    /// least one handle. A null pointer yields an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `payload` must point to a live pointee whose
    /// allocation came through [`IntrusiveHandle::new`] or
    /// [`IntrusiveHandle::from_box`] and whose count is nonzero.
    pub unsafe fn from_raw(payload: *mut T) -> Self {
        if let Some(p) = NonNull::new(payload) {
            p.as_ref().embedded_count().increment();
            Self {
                payload: Some(p),
                _owns: PhantomData,
            }
        } else {
            Self::default()
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(p) = self.payload.take() {
            // SAFETY: a non-empty handle keeps the pointee alive.
            let count = unsafe { p.as_ref() }.embedded_count();
            if count.decrement() == 0 {
                // SAFETY: the allocation came from Box::into_raw and the
                // zero count proves this was the last handle.
                unsafe { drop(Box::from_raw(p.as_ptr())) };
            }
        }
    }

    /// Drop this handle's unit and become empty. A no-op when empty.
    pub fn reset(&mut self) {
        self.unsubscribe();
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-empty handle keeps the pointee alive.
        self.payload.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Number of handles currently sharing the pointee; 0 when empty.
    pub fn use_count(&self) -> usize {
        self.get().map_or(0, |p| p.embedded_count().get())
    }
}

impl<T: EmbeddedCount> Clone for IntrusiveHandle<T> {
    fn clone(&self) -> Self {
        match self.payload {
            // SAFETY: our own unit proves the pointee is live.
            Some(p) => unsafe { Self::from_raw(p.as_ptr()) },
            None => Self::default(),
        }
    }
}

impl<T: EmbeddedCount> Default for IntrusiveHandle<T> {
    fn default() -> Self {
        Self {
            payload: None,
            _owns: PhantomData,
        }
    }
}

impl<T: EmbeddedCount> Drop for IntrusiveHandle<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T: EmbeddedCount> Deref for IntrusiveHandle<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics when the handle is empty; use [`IntrusiveHandle::get`] for
    /// a checked borrow.
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty IntrusiveHandle")
    }
}

impl<T: EmbeddedCount + fmt::Debug> fmt::Debug for IntrusiveHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("IntrusiveHandle").field(&v).finish(),
            None => f.write_str("IntrusiveHandle(<empty>)"),
        }
    }
}
