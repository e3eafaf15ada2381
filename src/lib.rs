//! rc-handle: single-threaded shared/weak ownership handles built on a
//! polymorphic control block, with aliasing, one-allocation
//! construction, and self-referencing payloads.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the handle family in small, verifiable layers so each
//!   lifetime invariant can be reasoned about independently.
//! - Layers:
//!   - count::RefCount: plain `Cell` counter shared by the control
//!     blocks and by intrusive pointees.
//!   - block: the control block, a `Block` capability trait with two
//!     storage strategies (`SeparateBlock` wraps an independent
//!     allocation, `CombinedBlock` holds the payload inline for a
//!     single allocation) and `release`, the one place block storage is
//!     freed.
//!   - shared::SharedHandle / weak::WeakHandle: public handles; their
//!     construction, clone, reset, and drop are the only operations
//!     that move the counts.
//!   - self_ref: deferred weak slot that lets an owned payload hand out
//!     handles to itself.
//!   - unique / intrusive: the single-owner and embedded-count
//!     collaborators; no control block involved.
//!
//! Lifetime invariants
//! - The payload is destroyed exactly once, at the instant the strong
//!   count hits zero, even while weak handles remain.
//! - Block storage is freed exactly once, at the transition that leaves
//!   both counts zero, in whichever order the last handles go.
//! - An aliased handle observes one object while keeping a different
//!   (enclosing) payload alive; its pointer is valid exactly as long as
//!   the group's managed payload.
//!
//! Constraints
//! - Single-threaded: counts are plain cells; every handle is
//!   `!Send`/`!Sync` through its raw block pointer.
//! - No reclamation of reference cycles. A parent/child graph must keep
//!   a weak handle on at least one side (the back-reference); this is a
//!   usage contract, not something the handles detect.
//! - No custom allocators; blocks and payloads live in `Box`
//!   allocations.
//!
//! Why this split?
//! - Localize invariants: the block owns "destroy once, free once";
//!   the handles own "counts equal live handles"; neither can violate
//!   the other's half.
//! - Minimize unsafe: raw-pointer handling is confined to the block
//!   module and the handles' subscribe/unsubscribe seams; payload types
//!   never see a raw pointer.
//!
//! Overflow semantics
//! - Count overflow aborts the process, matching `Rc`. Underflow is a
//!   crate bug and asserts.
//!
//! Notes and non-goals
//! - Promotion has two surfaces because callers want both shapes:
//!   `WeakHandle::lock` (empty handle on expiry) and
//!   `TryFrom<&WeakHandle>` (`BadWeakReference` error).
//! - `UniqueHandle` does not convert into `SharedHandle`; release the
//!   raw pointer and re-wrap it explicitly.
//! - Public surface is the handle types, the two capability traits, the
//!   counter, and the error types; the block layer is an implementation
//!   detail.

mod block;
mod count;
mod handle_proptest;
mod intrusive;
mod self_ref;
mod shared;
mod unique;
mod weak;

// Public surface
pub use count::RefCount;
pub use intrusive::{EmbeddedCount, IntrusiveHandle};
pub use self_ref::{NotOwned, SelfReferential, SelfSlot};
pub use shared::SharedHandle;
pub use unique::{BoxDrop, DropAction, UniqueHandle};
pub use weak::{BadWeakReference, WeakHandle};
