//! Dependency sets.
//!
//! A [`Dep`] is the set of subscribers interested in one source. Order is
//! insertion order: the first effect to track a source is the first one
//! notified when it changes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::reactive::{EffectId, ReactiveContext, Subscriber};

#[derive(Default)]
struct DepInner {
    subscribers: RefCell<IndexMap<EffectId, Rc<dyn Subscriber>>>,
}

/// The set of effects subscribed to a single source.
#[derive(Clone, Default)]
pub struct Dep(Rc<DepInner>);

/// Non-owning link from an effect back to a dep it joined.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl Dep {
    /// Create an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the given effect is subscribed.
    pub fn contains(&self, id: EffectId) -> bool {
        self.0.subscribers.borrow().contains_key(&id)
    }

    /// Check whether two handles point at the same set.
    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn insert(&self, subscriber: Rc<dyn Subscriber>) -> bool {
        let id = subscriber.core().id();
        self.0.subscribers.borrow_mut().insert(id, subscriber).is_none()
    }

    pub(crate) fn remove(&self, id: EffectId) {
        // Keep the survivors in insertion order.
        let removed = self.0.subscribers.borrow_mut().shift_remove(&id);
        drop(removed);
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.0))
    }

    fn snapshot(&self) -> SmallVec<[Rc<dyn Subscriber>; 8]> {
        self.0.subscribers.borrow().values().cloned().collect()
    }
}

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(Dep)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<EffectId> = self.0.subscribers.borrow().keys().copied().collect();
        f.debug_struct("Dep").field("subscribers", &ids).finish()
    }
}

/// Subscribe the active effect to `dep`.
///
/// No-op when nothing is tracking. The effect remembers the dep so that its
/// next run can unsubscribe before re-collecting.
pub(crate) fn track_effects(dep: &Dep) {
    let Some(active) = ReactiveContext::active_subscriber() else {
        return;
    };
    let core = active.core();
    if dep.contains(core.id()) {
        return;
    }
    core.record_dep(dep.downgrade());
    dep.insert(active);
}

/// Notify every subscriber of `dep`.
///
/// Iterates a snapshot, so effects that subscribe while notification is in
/// progress are not visited this round. The effect currently running is
/// skipped, and so is any effect stopped by an earlier subscriber.
pub(crate) fn trigger_effects(dep: &Dep) {
    let subscribers = dep.snapshot();
    if subscribers.is_empty() {
        return;
    }
    let current = ReactiveContext::active_effect_id();
    for subscriber in subscribers {
        let core = subscriber.core();
        if Some(core.id()) == current || !core.is_active() {
            continue;
        }
        trace!(effect = ?core.id(), "notifying subscriber");
        subscriber.notify();
    }
}
