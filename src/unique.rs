//! Exclusive-ownership handle with a pluggable destroy action.
//!
//! `UniqueHandle` is the single-owner collaborator of the counted
//! handles: no sharing, no counts, just one owner and one destroy action
//! run at release time. A zero-sized action adds no storage to the
//! handle, so the common case stays pointer-sized.
//!
//! There is deliberately no direct conversion into [`SharedHandle`]:
//! callers release the raw pointer and hand it to
//! [`SharedHandle::from_raw`], accepting the ownership transfer
//! explicitly.
//!
//! [`SharedHandle`]: crate::SharedHandle
//! [`SharedHandle::from_raw`]: crate::SharedHandle::from_raw

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// Action run on the payload pointer when the handle releases it.
pub trait DropAction<T: ?Sized> {
    /// Destroy the payload behind `ptr` and free its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live payload this action is entitled to
    /// destroy, and it must not be used afterwards.
    unsafe fn destroy(&mut self, ptr: NonNull<T>);
}

/// Default action: return the allocation to `Box`.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoxDrop;

impl<T: ?Sized> DropAction<T> for BoxDrop {
    unsafe fn destroy(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

/// Single-owner handle over a heap payload. Move-only; dropping it runs
/// the action exactly once.
pub struct UniqueHandle<T: ?Sized, D: DropAction<T> = BoxDrop> {
    payload: Option<NonNull<T>>,
    action: D,
    _owns: PhantomData<T>,
}

impl<T> UniqueHandle<T, BoxDrop> {
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> UniqueHandle<T, BoxDrop> {
    pub fn from_box(payload: Box<T>) -> Self {
        Self {
            payload: Some(NonNull::from(Box::leak(payload))),
            action: BoxDrop,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized, D: DropAction<T>> UniqueHandle<T, D> {
    /// Adopt a raw payload pointer together with the action that knows
    /// how to destroy it. A null pointer yields an empty handle.
    ///
    /// # Safety
    ///
    /// A non-null `payload` must point to a live allocation that
    /// `action` is entitled to destroy; ownership transfers to the
    /// handle.
    pub unsafe fn from_raw_with(payload: *mut T, action: D) -> Self {
        Self {
            payload: NonNull::new(payload),
            action,
            _owns: PhantomData,
        }
    }

    /// Give up ownership of the payload without destroying it.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.payload.take()
    }

    /// Destroy the current payload, if any, and become empty.
    pub fn reset(&mut self) {
        if let Some(p) = self.payload.take() {
            // SAFETY: the handle owned `p`; the take above guarantees the
            // action runs once per payload.
            unsafe { self.action.destroy(p) };
        }
    }

    /// Destroy the current payload and adopt a boxed replacement.
    pub fn reset_box(&mut self, payload: Box<T>) {
        self.reset();
        self.payload = Some(NonNull::from(Box::leak(payload)));
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: the handle exclusively owns a live payload.
        self.payload.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: exclusive ownership plus &mut self give unique access.
        self.payload.map(|p| unsafe { &mut *p.as_ptr() })
    }

    pub fn action(&self) -> &D {
        &self.action
    }
}

impl<T: ?Sized, D: DropAction<T>> Drop for UniqueHandle<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: DropAction<T>> Deref for UniqueHandle<T, D> {
    type Target = T;

    /// # Panics
    ///
    /// Panics when the handle is empty; use [`UniqueHandle::get`] for a
    /// checked borrow.
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty UniqueHandle")
    }
}

impl<T: ?Sized, D: DropAction<T>> DerefMut for UniqueHandle<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("dereferenced an empty UniqueHandle")
    }
}

impl<T: ?Sized + fmt::Debug, D: DropAction<T>> fmt::Debug for UniqueHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("UniqueHandle").field(&v).finish(),
            None => f.write_str("UniqueHandle(<empty>)"),
        }
    }
}
