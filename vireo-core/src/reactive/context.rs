//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, and which
//! effect scope new effects should be collected into.
//!
//! # Implementation
//!
//! Two thread-local stacks. Running an effect pushes it onto the effect
//! stack; the top entry is what `track` subscribes. A paused entry on top
//! means "nothing is tracking", which is how untracked sections nest inside
//! effects. Running a scope pushes it onto the scope stack.
//!
//! Both pushes hand back a guard that pops on drop, so the stacks unwind
//! correctly even if the computation panics.

use std::cell::RefCell;
use std::rc::Rc;

use super::scope::EffectScope;
use super::subscriber::{EffectId, Subscriber};

thread_local! {
    static EFFECT_STACK: RefCell<Vec<ContextEntry>> = RefCell::new(Vec::new());
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = RefCell::new(Vec::new());
}

#[derive(Clone)]
enum ContextEntry {
    Tracking(Rc<dyn Subscriber>),
    Paused,
}

impl ContextEntry {
    fn effect_id(&self) -> Option<EffectId> {
        match self {
            ContextEntry::Tracking(subscriber) => Some(subscriber.core().id()),
            ContextEntry::Paused => None,
        }
    }
}

/// Guard that pops the effect context when dropped.
pub struct ReactiveContext {
    effect: Option<EffectId>,
}

impl ReactiveContext {
    /// Make `subscriber` the active effect until the guard is dropped.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let effect = Some(subscriber.core().id());
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(ContextEntry::Tracking(subscriber)));
        Self { effect }
    }

    /// Suspend tracking until the guard is dropped.
    pub fn pause() -> Self {
        EFFECT_STACK.with(|stack| stack.borrow_mut().push(ContextEntry::Paused));
        Self { effect: None }
    }

    /// Whether a read right now would be recorded as a dependency.
    pub fn is_tracking() -> bool {
        EFFECT_STACK.with(|stack| matches!(stack.borrow().last(), Some(ContextEntry::Tracking(_))))
    }

    /// Id of the running effect, if tracking.
    pub fn active_effect_id() -> Option<EffectId> {
        EFFECT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::effect_id))
    }

    pub(crate) fn active_subscriber() -> Option<Rc<dyn Subscriber>> {
        EFFECT_STACK.with(|stack| match stack.borrow().last() {
            Some(ContextEntry::Tracking(subscriber)) => Some(subscriber.clone()),
            _ => None,
        })
    }

    /// Number of nested contexts, paused ones included.
    pub fn depth() -> usize {
        EFFECT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = EFFECT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.effect_id(),
                self.effect,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect,
                entry.effect_id()
            );
        }
    }
}

/// Guard that pops the ambient effect scope when dropped.
pub(crate) struct ScopeContext {
    _private: (),
}

impl ScopeContext {
    pub(crate) fn enter(scope: EffectScope) -> Self {
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(scope));
        Self { _private: () }
    }

    pub(crate) fn current() -> Option<EffectScope> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

impl Drop for ScopeContext {
    fn drop(&mut self) {
        let popped = SCOPE_STACK.try_with(|stack| stack.borrow_mut().pop()).ok().flatten();
        drop(popped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveEffect;

    #[test]
    fn context_tracks_subscriber() {
        let effect = ReactiveEffect::new(|| {});
        let id = effect.id();

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::active_effect_id().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.as_subscriber());

            assert!(ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::active_effect_id(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_tracking());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn pause_hides_the_outer_effect() {
        let effect = ReactiveEffect::new(|| {});
        let _outer = ReactiveContext::enter(effect.as_subscriber());

        {
            let _paused = ReactiveContext::pause();
            assert!(!ReactiveContext::is_tracking());
            assert!(ReactiveContext::active_subscriber().is_none());
            assert_eq!(ReactiveContext::depth(), 2);
        }

        assert!(ReactiveContext::is_tracking());
        assert_eq!(ReactiveContext::active_effect_id(), Some(effect.id()));
    }

    #[test]
    fn nested_contexts() {
        let outer = ReactiveEffect::new(|| {});
        let inner = ReactiveEffect::new(|| {});

        let _ctx1 = ReactiveContext::enter(outer.as_subscriber());
        assert_eq!(ReactiveContext::active_effect_id(), Some(outer.id()));

        {
            let _ctx2 = ReactiveContext::enter(inner.as_subscriber());
            assert_eq!(ReactiveContext::active_effect_id(), Some(inner.id()));
        }

        // Back to outer context
        assert_eq!(ReactiveContext::active_effect_id(), Some(outer.id()));
    }

    #[test]
    fn scope_stack_unwinds() {
        assert!(ScopeContext::current().is_none());
        let scope = EffectScope::new();
        {
            let _guard = ScopeContext::enter(scope.clone());
            assert!(ScopeContext::current().is_some_and(|s| s.ptr_eq(&scope)));
        }
        assert!(ScopeContext::current().is_none());
    }
}
