//! Self-referencing payloads.
//!
//! A payload type that embeds a [`SelfSlot`] and implements
//! [`SelfReferential`] can hand out handles to itself from inside its
//! own methods. The slot starts empty and is primed with a weak
//! self-reference by the factory that first puts the payload behind a
//! [`SharedHandle`]; it is deliberately not a constructor parameter,
//! since no handle exists until the payload is already owned by a block.

use core::cell::RefCell;
use core::fmt;

use crate::shared::SharedHandle;
use crate::weak::WeakHandle;

/// Error from requesting a self handle on a payload that was never
/// constructed behind a [`SharedHandle`].
///
/// This surfaces a precondition violation (such as a stack-constructed
/// payload) rather than a recoverable runtime state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NotOwned;

impl fmt::Display for NotOwned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload is not owned by a SharedHandle")
    }
}

impl std::error::Error for NotOwned {}

/// Deferred slot the owning handle fills with a weak self-reference.
///
/// Embed one as a field and return it from
/// [`SelfReferential::self_slot`].
pub struct SelfSlot<T: ?Sized> {
    weak: RefCell<WeakHandle<T>>,
}

impl<T: ?Sized> SelfSlot<T> {
    pub fn new() -> Self {
        Self {
            weak: RefCell::new(WeakHandle::default()),
        }
    }
}

impl<T: ?Sized> Default for SelfSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for SelfSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SelfSlot")
    }
}

/// Capability to obtain handles to `self` from inside the payload's own
/// methods.
///
/// ```
/// use rc_handle::{SelfReferential, SelfSlot, SharedHandle};
///
/// struct Node {
///     name: String,
///     slot: SelfSlot<Node>,
/// }
///
/// impl SelfReferential for Node {
///     fn self_slot(&self) -> &SelfSlot<Node> {
///         &self.slot
///     }
/// }
///
/// let node = SharedHandle::new_self_referential(Node {
///     name: "n".to_string(),
///     slot: SelfSlot::new(),
/// });
/// let again = node.shared_from_self().unwrap();
/// assert_eq!(again.name, "n");
/// assert_eq!(node.use_count(), 2);
/// ```
pub trait SelfReferential {
    /// The slot the owning handle deposits into.
    fn self_slot(&self) -> &SelfSlot<Self>;

    /// Strong handle to `self`. Fails with [`NotOwned`] when the payload
    /// was never put behind a [`SharedHandle`], or when no strong holder
    /// remains (the payload is mid-teardown).
    fn shared_from_self(&self) -> Result<SharedHandle<Self>, NotOwned> {
        SharedHandle::try_from(&*self.self_slot().weak.borrow()).map_err(|_| NotOwned)
    }

    /// Weak handle to `self`, under the same precondition as
    /// [`SelfReferential::shared_from_self`].
    fn weak_from_self(&self) -> Result<WeakHandle<Self>, NotOwned> {
        let slot = self.self_slot().weak.borrow();
        if slot.expired() {
            Err(NotOwned)
        } else {
            Ok(slot.clone())
        }
    }
}

impl<T: SelfReferential + 'static> SharedHandle<T> {
    /// Construct-in-place factory that also primes the payload's self
    /// slot.
    pub fn new_self_referential(value: T) -> Self {
        let handle = Self::new(value);
        handle.prime_self_slot();
        handle
    }

    /// Wrap an existing boxed payload and prime its self slot.
    pub fn from_box_self_referential(payload: Box<T>) -> Self {
        let handle = Self::from_box(payload);
        handle.prime_self_slot();
        handle
    }

    /// Deposit a weak self-reference into the payload's slot. Every
    /// handle copied from this one shares the primed payload, so the
    /// deposit happens exactly once.
    fn prime_self_slot(&self) {
        let slot = self
            .get()
            .expect("freshly constructed handle is non-empty")
            .self_slot();
        *slot.weak.borrow_mut() = self.downgrade();
    }
}
