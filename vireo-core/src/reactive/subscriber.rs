//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that can sit in a dependency set: plain effects,
//! the effects behind computed values and watchers, and component render
//! effects. The graph only needs to know how to notify one and how to unhook
//! it again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::graph::WeakDep;

/// Unique identifier for an effect.
///
/// Dependency sets are keyed by this id, which is what makes subscribing
/// twice to the same source a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler callback installed on an effect.
///
/// When present, `trigger` calls it instead of re-running the effect.
pub type SchedulerFn = Rc<dyn Fn()>;

/// Bookkeeping shared by every kind of effect.
pub(crate) struct EffectCore {
    id: EffectId,
    active: Cell<bool>,
    deps: RefCell<SmallVec<[WeakDep; 4]>>,
    scheduler: Option<SchedulerFn>,
}

impl EffectCore {
    pub(crate) fn new(scheduler: Option<SchedulerFn>) -> Self {
        Self {
            id: EffectId::new(),
            active: Cell::new(true),
            deps: RefCell::new(SmallVec::new()),
            scheduler,
        }
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn scheduler(&self) -> Option<&SchedulerFn> {
        self.scheduler.as_ref()
    }

    pub(crate) fn record_dep(&self, dep: WeakDep) {
        self.deps.borrow_mut().push(dep);
    }

    pub(crate) fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    /// Leave every dependency set joined by the last run.
    pub(crate) fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.remove(self.id);
            }
        }
    }

    /// Deactivate. Returns false if the effect was already stopped.
    pub(crate) fn stop(&self) -> bool {
        if !self.active.get() {
            return false;
        }
        self.cleanup();
        self.active.set(false);
        true
    }
}

/// Something a dependency set can notify.
pub(crate) trait Subscriber {
    fn core(&self) -> &EffectCore;

    /// Called by `trigger`: hand off to the scheduler if one is installed,
    /// otherwise re-run.
    fn notify(self: Rc<Self>);
}
