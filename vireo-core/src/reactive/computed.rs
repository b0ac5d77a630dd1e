//! Computed Implementation
//!
//! A computed is a cached derived value that re-evaluates only when something
//! it read has changed.
//!
//! # How Computeds Work
//!
//! 1. The getter runs inside an effect, so its reads are tracked.
//!
//! 2. That effect never re-runs on its own. Its scheduler marks the computed
//!    dirty and notifies whoever read the computed, and does so only on the
//!    clean to dirty edge.
//!
//! 3. `get()` subscribes the reader, then recomputes if dirty.
//!
//! A computed that nobody reads stays dirty and costs nothing: any number of
//! writes between two reads cause at most one recomputation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{trace, warn};

use super::effect::ReactiveEffect;
use super::refs::{DerivedRef, RefKind};
use super::value::Value;
use crate::graph::{track_effects, trigger_effects, Dep};

/// Whether the cached value can be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,
    /// A dependency changed since the last computation.
    Dirty,
}

struct Shared {
    dirty: Cell<bool>,
    dep: Dep,
}

type Setter<T> = Box<dyn Fn(T)>;

struct ComputedInner<T> {
    effect: ReactiveEffect<T>,
    shared: Rc<Shared>,
    value: RefCell<Option<T>>,
    setter: Option<Setter<T>>,
}

/// A lazily recomputed, cached derivation.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a read-only computed.
    pub fn new<F>(getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(getter, None)
    }

    /// Create a computed whose `set` forwards to `setter`.
    pub fn writable<F, S>(getter: F, setter: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        Self::build(getter, Some(Box::new(setter)))
    }

    fn build<F>(getter: F, setter: Option<Setter<T>>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let shared = Rc::new(Shared {
            dirty: Cell::new(true),
            dep: Dep::new(),
        });

        let on_change = shared.clone();
        let effect = ReactiveEffect::with_scheduler(getter, move || {
            if !on_change.dirty.replace(true) {
                trace!("computed invalidated");
                trigger_effects(&on_change.dep);
            }
        });

        Self {
            inner: Rc::new(ComputedInner {
                effect,
                shared,
                value: RefCell::new(None),
                setter,
            }),
        }
    }

    /// Read the value, recomputing if a dependency changed.
    pub fn get(&self) -> T {
        track_effects(&self.inner.shared.dep);

        if self.inner.shared.dirty.get() {
            let value = self.inner.effect.run();
            self.inner.shared.dirty.set(false);
            *self.inner.value.borrow_mut() = Some(value.clone());
            return value;
        }

        let cached = self.inner.value.borrow().clone();
        match cached {
            Some(value) => value,
            // A stopped computed that never ran has nothing cached.
            None => self.inner.effect.run(),
        }
    }

    /// Forward to the setter. Without one, logs a warning and does nothing.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => warn!("write to a read-only computed ignored"),
        }
    }

    pub fn state(&self) -> ComputedState {
        if self.inner.shared.dirty.get() {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Stop tracking. The last cached value is served from then on.
    pub fn stop(&self) {
        self.inner.effect.stop();
        self.inner.shared.dirty.set(false);
    }

    /// Number of readers currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.shared.dep.len()
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.inner.shared.dirty.get())
            .field("effect", &self.inner.effect)
            .finish()
    }
}

impl DerivedRef for Computed<Value> {
    fn get(&self) -> Value {
        Computed::get(self)
    }

    fn set(&self, value: Value) {
        Computed::set(self, value);
    }

    fn kind(&self) -> RefKind {
        RefKind::Computed
    }
}

/// Create a read-only computed.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(getter)
}

/// Create a computed with a setter.
pub fn computed_with<T, F, S>(getter: F, setter: S) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::writable(getter, setter)
}
