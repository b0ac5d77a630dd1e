//! Effect scopes.
//!
//! A scope collects the effects created while it is running so they can be
//! stopped together. Scopes nest: a scope created while another one is
//! ambient becomes its child, unless it is detached, and stopping a parent
//! stops every child.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::context::ScopeContext;
use super::subscriber::Subscriber;

type Cleanup = Box<dyn FnOnce()>;

struct ScopeInner {
    active: Cell<bool>,
    detached: bool,
    effects: RefCell<Vec<Rc<dyn Subscriber>>>,
    cleanups: RefCell<Vec<Cleanup>>,
    scopes: RefCell<Vec<EffectScope>>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    index: Cell<Option<usize>>,
}

/// A lifecycle group of effects.
#[derive(Clone)]
pub struct EffectScope(Rc<ScopeInner>);

impl EffectScope {
    /// Create a scope, attached to the ambient scope if there is one.
    pub fn new() -> Self {
        Self::create(false)
    }

    /// Create a scope that never attaches to a parent.
    pub fn detached() -> Self {
        Self::create(true)
    }

    fn create(detached: bool) -> Self {
        let scope = Self(Rc::new(ScopeInner {
            active: Cell::new(true),
            detached,
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            scopes: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            index: Cell::new(None),
        }));

        if !detached {
            if let Some(parent) = ScopeContext::current() {
                let mut children = parent.0.scopes.borrow_mut();
                scope.0.index.set(Some(children.len()));
                *scope.0.parent.borrow_mut() = Some(Rc::downgrade(&parent.0));
                children.push(scope.clone());
            }
        }

        scope
    }

    /// Run `f` with this scope ambient.
    ///
    /// Returns `None` without calling `f` if the scope was stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.0.active.get() {
            warn!("cannot run an inactive effect scope");
            return None;
        }
        let _guard = ScopeContext::enter(self.clone());
        Some(f())
    }

    /// Stop every owned effect and child scope.
    ///
    /// Stopping is one-way; a second call does nothing.
    pub fn stop(&self) {
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        if !self.0.active.replace(false) {
            return;
        }

        let effects = std::mem::take(&mut *self.0.effects.borrow_mut());
        debug!(effects = effects.len(), from_parent, "stopping effect scope");
        for effect in &effects {
            effect.core().stop();
        }

        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }

        let children = std::mem::take(&mut *self.0.scopes.borrow_mut());
        for child in &children {
            child.stop_inner(true);
        }

        let parent = self.0.parent.borrow_mut().take();
        if !self.0.detached && !from_parent {
            if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
                self.remove_from(&parent);
            }
        }
    }

    fn remove_from(&self, parent: &ScopeInner) {
        let mut siblings = parent.scopes.borrow_mut();
        if let Some(position) = siblings.iter().position(|s| s.ptr_eq(self)) {
            siblings.remove(position);
            for (index, sibling) in siblings.iter().enumerate() {
                sibling.0.index.set(Some(index));
            }
        }
    }

    /// Whether the scope can still run.
    pub fn active(&self) -> bool {
        self.0.active.get()
    }

    /// Position among the parent's children.
    pub fn index(&self) -> Option<usize> {
        self.0.index.get()
    }

    /// Number of effects owned directly.
    pub fn effect_count(&self) -> usize {
        self.0.effects.borrow().len()
    }

    /// Number of child scopes.
    pub fn child_count(&self) -> usize {
        self.0.scopes.borrow().len()
    }

    /// Whether two handles are the same scope.
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn record(&self, effect: Rc<dyn Subscriber>) {
        if self.0.active.get() {
            self.0.effects.borrow_mut().push(effect);
        }
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScope")
            .field("active", &self.0.active.get())
            .field("detached", &self.0.detached)
            .field("index", &self.0.index.get())
            .field("effects", &self.effect_count())
            .field("scopes", &self.child_count())
            .finish()
    }
}

/// Create a scope; see [`EffectScope::new`] and [`EffectScope::detached`].
pub fn effect_scope(detached: bool) -> EffectScope {
    if detached {
        EffectScope::detached()
    } else {
        EffectScope::new()
    }
}

/// The ambient scope, if any.
pub fn current_scope() -> Option<EffectScope> {
    ScopeContext::current()
}

/// Register a callback to run when the ambient scope stops.
///
/// Logs a warning and drops the callback if no scope is ambient.
pub fn on_scope_dispose<F>(f: F)
where
    F: FnOnce() + 'static,
{
    match ScopeContext::current() {
        Some(scope) if scope.active() => scope.0.cleanups.borrow_mut().push(Box::new(f)),
        _ => warn!("on_scope_dispose called without an active effect scope"),
    }
}

pub(crate) fn record_effect_scope(effect: Rc<dyn Subscriber>) {
    if let Some(scope) = ScopeContext::current() {
        scope.record(effect);
    }
}
