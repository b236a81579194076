//! Lazily materialized child slots with weak caching.
//!
//! Each reader node keeps one [`Slot`] per direct child behind a single
//! mutex ([`ChildSlots`]). A slot starts `Unmaterialized`; the first lookup
//! builds the child and keeps only a weak handle. While any caller holds
//! the child, later lookups return that same instance. Once every caller
//! has dropped it the slot reads as `Evicted` and the next lookup rebuilds.
//! Children never hold a strong handle to their parent, so the tree has
//! no reference cycles.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::util::Result;

/// Shared handle that can be downgraded for caching.
pub(crate) trait Shared: Clone {
    type Weak;

    fn downgrade(&self) -> Self::Weak;

    fn upgrade(weak: &Self::Weak) -> Option<Self>;
}

impl<T> Shared for Arc<T> {
    type Weak = Weak<T>;

    fn downgrade(&self) -> Weak<T> {
        Arc::downgrade(self)
    }

    fn upgrade(weak: &Weak<T>) -> Option<Self> {
        weak.upgrade()
    }
}

/// Cache state of a child slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Unmaterialized,
    Live,
    Evicted,
}

pub(crate) enum Slot<H: Shared> {
    Unmaterialized,
    Materialized(H::Weak),
    Evicted,
}

impl<H: Shared> Slot<H> {
    /// Live handle, demoting a dead weak handle to `Evicted`.
    pub(crate) fn live(&mut self) -> Option<H> {
        if let Slot::Materialized(weak) = self {
            match H::upgrade(weak) {
                Some(handle) => return Some(handle),
                None => *self = Slot::Evicted,
            }
        }
        None
    }

    pub(crate) fn get_or_materialize(&mut self, build: impl FnOnce() -> Result<H>) -> Result<H> {
        if let Some(handle) = self.live() {
            return Ok(handle);
        }
        let handle = build()?;
        *self = Slot::Materialized(handle.downgrade());
        Ok(handle)
    }

    pub(crate) fn state(&self) -> SlotState {
        match self {
            Slot::Unmaterialized => SlotState::Unmaterialized,
            Slot::Materialized(weak) if H::upgrade(weak).is_some() => SlotState::Live,
            Slot::Materialized(_) | Slot::Evicted => SlotState::Evicted,
        }
    }
}

/// The slots of one parent, guarded by that parent's lock.
pub(crate) struct ChildSlots<H: Shared> {
    slots: Mutex<Vec<Slot<H>>>,
}

impl<H: Shared> ChildSlots<H> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: Mutex::new((0..len).map(|_| Slot::Unmaterialized).collect()),
        }
    }

    /// Cached child `index`, building it under the parent lock when absent.
    /// Callers check `index` against the child count first.
    pub(crate) fn get_or_materialize(
        &self,
        index: usize,
        build: impl FnOnce() -> Result<H>,
    ) -> Result<H> {
        let mut slots = self.slots.lock();
        let slot = &mut slots[index];
        let state = slot.state();
        let handle = slot.get_or_materialize(build)?;
        if state != SlotState::Live {
            trace!(index, ?state, "materialized child");
        }
        Ok(handle)
    }

    pub(crate) fn state(&self, index: usize) -> Option<SlotState> {
        self.slots.lock().get(index).map(Slot::state)
    }
}

impl<H: Shared> std::fmt::Debug for ChildSlots<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        f.debug_list().entries(slots.iter().map(Slot::state)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_slot_lifecycle() {
        let builds = AtomicUsize::new(0);
        let slots: ChildSlots<Arc<String>> = ChildSlots::new(2);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("child".to_string()))
        };
        assert_eq!(slots.state(0), Some(SlotState::Unmaterialized));

        let a = slots.get_or_materialize(0, build).unwrap();
        let b = slots.get_or_materialize(0, build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(slots.state(0), Some(SlotState::Live));
        assert_eq!(slots.state(1), Some(SlotState::Unmaterialized));

        drop(a);
        assert_eq!(slots.state(0), Some(SlotState::Live));
        drop(b);
        assert_eq!(slots.state(0), Some(SlotState::Evicted));

        let c = slots.get_or_materialize(0, build).unwrap();
        assert_eq!(*c, "child");
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(slots.state(2), None);
    }

    #[test]
    fn test_failed_build_leaves_slot_empty() {
        let slots: ChildSlots<Arc<u32>> = ChildSlots::new(1);
        let err = slots.get_or_materialize(0, || Err(crate::util::Error::invalid("boom")));
        assert!(err.is_err());
        assert_eq!(slots.state(0), Some(SlotState::Unmaterialized));
        assert_eq!(*slots.get_or_materialize(0, || Ok(Arc::new(7))).unwrap(), 7);
    }
}
