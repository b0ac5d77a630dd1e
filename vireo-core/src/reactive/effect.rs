//! Effect Implementation
//!
//! An effect is a computation that re-runs whenever something it read
//! changes.
//!
//! # How Effects Work
//!
//! 1. `run()` first leaves every dependency set the previous run joined.
//!
//! 2. The effect then installs itself as the active effect and calls its
//!    body. Every tracked read during the body subscribes it again.
//!
//! 3. When a dependency triggers, the effect's scheduler is called if it has
//!    one; otherwise the effect re-runs synchronously.
//!
//! Because dependencies are re-collected on every run, a property that was
//! only read under a condition stops being a dependency once the condition
//! no longer holds.
//!
//! # Stopping
//!
//! A stopped effect leaves all its dependency sets. Calling `run()` on it
//! still executes the body, but with tracking paused, so nothing can
//! subscribe it again.

use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::context::ReactiveContext;
use super::scope::record_effect_scope;
use super::subscriber::{EffectCore, EffectId, SchedulerFn, Subscriber};

struct EffectInner<T> {
    core: EffectCore,
    body: Box<dyn Fn() -> T>,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        if !self.core.is_active() {
            let _paused = ReactiveContext::pause();
            return (self.body)();
        }

        self.core.cleanup();
        let _ctx = ReactiveContext::enter(self.clone());
        debug!(effect = ?self.core.id(), "running effect");
        (self.body)()
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn notify(self: Rc<Self>) {
        match self.core.scheduler() {
            Some(scheduler) => {
                let scheduler = scheduler.clone();
                scheduler();
            }
            None => {
                self.run();
            }
        }
    }
}

/// A re-runnable tracked computation.
///
/// Handles are cheap to clone and share one effect. The value returned by
/// the body is handed back from [`ReactiveEffect::run`].
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(Value::from(json!({ "count": 0 })));
///
/// let logger = ReactiveEffect::new(move || {
///     println!("count is {}", state.get("count"));
/// });
/// logger.run();
///
/// state.set("count", 5); // prints "count is 5"
/// ```
pub struct ReactiveEffect<T = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T> Clone for ReactiveEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> ReactiveEffect<T> {
    /// Create an effect that re-runs synchronously when triggered.
    ///
    /// The body does not run until [`ReactiveEffect::run`] is called.
    pub fn new<F>(body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::build(body, None)
    }

    /// Create an effect whose triggers call `scheduler` instead of re-running.
    pub fn with_scheduler<F, S>(body: F, scheduler: S) -> Self
    where
        F: Fn() -> T + 'static,
        S: Fn() + 'static,
    {
        Self::build(body, Some(Rc::new(scheduler)))
    }

    pub(crate) fn build<F>(body: F, scheduler: Option<SchedulerFn>) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                core: EffectCore::new(scheduler),
                body: Box::new(body),
            }),
        };
        record_effect_scope(effect.as_subscriber());
        effect
    }

    /// Run the body, re-collecting dependencies if the effect is active.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Leave every dependency set and never track again.
    pub fn stop(&self) {
        if self.inner.core.stop() {
            debug!(effect = ?self.inner.core.id(), "effect stopped");
        }
    }

    /// Whether the effect is still tracking.
    pub fn is_active(&self) -> bool {
        self.inner.core.is_active()
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.core.id()
    }

    /// Number of dependency sets joined by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dep_count()
    }

    /// A handle that does not keep the effect alive.
    pub fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn as_subscriber(&self) -> Rc<dyn Subscriber> {
        self.inner.clone()
    }
}

impl<T> fmt::Debug for ReactiveEffect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.core.id())
            .field("active", &self.inner.core.is_active())
            .field("deps", &self.inner.core.dep_count())
            .finish()
    }
}

/// Non-owning handle to a [`ReactiveEffect`].
///
/// Schedulers capture this form to refer back to their own effect without
/// creating a cycle.
pub struct WeakEffect<T = ()> {
    inner: Weak<EffectInner<T>>,
}

impl<T> Clone for WeakEffect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakEffect<T> {
    /// Recover a strong handle if the effect is still alive.
    pub fn upgrade(&self) -> Option<ReactiveEffect<T>> {
        self.inner.upgrade().map(|inner| ReactiveEffect { inner })
    }
}

/// Options for [`effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Called on trigger instead of re-running the effect.
    pub scheduler: Option<SchedulerFn>,
    /// Skip the initial run.
    pub lazy: bool,
}

impl EffectOptions {
    /// Set the scheduler.
    pub fn scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Skip the initial run.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Create an effect and run it once.
///
/// The returned handle is the runner: call [`ReactiveEffect::run`] to re-run
/// by hand, [`ReactiveEffect::stop`] to detach.
pub fn effect<F>(body: F) -> ReactiveEffect
where
    F: Fn() + 'static,
{
    effect_with(body, EffectOptions::default())
}

/// Create an effect with options, running it once unless `lazy` is set.
pub fn effect_with<F>(body: F, options: EffectOptions) -> ReactiveEffect
where
    F: Fn() + 'static,
{
    let effect = ReactiveEffect::build(body, options.scheduler);
    if !options.lazy {
        effect.run();
    }
    effect
}

/// Run `f` without recording any dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _paused = ReactiveContext::pause();
    f()
}
