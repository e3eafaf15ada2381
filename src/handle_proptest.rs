#![cfg(test)]

// Property tests for the handle family kept inside the crate so they
// exercise the same group through every public entry point.
//
// Model: one ownership group, a vector of live strong handles and a
// vector of live weak handles. After every operation the block's counts
// must equal the vector lengths, the payload destructor must have run
// exactly when the strong vector drained, and lock() must succeed
// exactly when the group is not expired.

use crate::{SharedHandle, WeakHandle};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

struct Probe {
    tally: Rc<Cell<u32>>,
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.tally.set(self.tally.get() + 1);
    }
}

proptest! {
    #[test]
    fn prop_counts_track_live_handles(
        combined in any::<bool>(),
        ops in proptest::collection::vec((0u8..=6u8, 0usize..100usize), 1..200),
    ) {
        let tally = Rc::new(Cell::new(0u32));
        let first = if combined {
            SharedHandle::new(Probe { tally: tally.clone() })
        } else {
            SharedHandle::from_box(Box::new(Probe { tally: tally.clone() }))
        };
        let mut strongs: Vec<SharedHandle<Probe>> = vec![first];
        let mut weaks: Vec<WeakHandle<Probe>> = Vec::new();

        for (op, raw_i) in ops {
            match op {
                // Clone a strong handle
                0 => {
                    if !strongs.is_empty() {
                        let i = raw_i % strongs.len();
                        let h = strongs[i].clone();
                        strongs.push(h);
                    }
                }
                // Drop a strong handle
                1 => {
                    if !strongs.is_empty() {
                        let i = raw_i % strongs.len();
                        strongs.swap_remove(i);
                    }
                }
                // Downgrade a strong handle into a new weak one
                2 => {
                    if !strongs.is_empty() {
                        let i = raw_i % strongs.len();
                        weaks.push(strongs[i].downgrade());
                    }
                }
                // Clone a weak handle
                3 => {
                    if !weaks.is_empty() {
                        let i = raw_i % weaks.len();
                        let w = weaks[i].clone();
                        weaks.push(w);
                    }
                }
                // Drop a weak handle
                4 => {
                    if !weaks.is_empty() {
                        let i = raw_i % weaks.len();
                        weaks.swap_remove(i);
                    }
                }
                // Lock a weak handle; success must match expiry exactly
                5 => {
                    if !weaks.is_empty() {
                        let i = raw_i % weaks.len();
                        let expired = weaks[i].expired();
                        let locked = weaks[i].lock();
                        prop_assert_eq!(locked.is_empty(), expired);
                        if !locked.is_empty() {
                            strongs.push(locked);
                        }
                    }
                }
                // Reset a strong handle in place, then retire it
                6 => {
                    if !strongs.is_empty() {
                        let i = raw_i % strongs.len();
                        strongs[i].reset();
                        strongs.swap_remove(i);
                    }
                }
                _ => unreachable!(),
            }

            // Counts mirror the live handle sets at every step.
            if let Some(h) = strongs.first() {
                prop_assert_eq!(h.use_count(), strongs.len());
                prop_assert_eq!(h.weak_count(), weaks.len());
                prop_assert_eq!(tally.get(), 0, "payload died while strong handles remain");
            } else if let Some(w) = weaks.first() {
                prop_assert!(w.expired());
                prop_assert_eq!(w.use_count(), 0);
                prop_assert_eq!(w.weak_count(), weaks.len());
                prop_assert_eq!(tally.get(), 1, "payload must die with the last strong handle");
            } else {
                prop_assert_eq!(tally.get(), 1);
            }
        }

        strongs.clear();
        weaks.clear();
        prop_assert_eq!(tally.get(), 1, "payload destructor must run exactly once");
    }
}
