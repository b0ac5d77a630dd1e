//! Watchers.
//!
//! `watch` turns a source into a getter, runs the getter in an effect, and
//! calls back with the previous and the new value whenever the effect is
//! triggered. A reactive source is traversed deeply, so a write anywhere
//! inside it counts as a change.

use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::effect::{untracked, ReactiveEffect, WeakEffect};
use super::proxy::Reactive;
use super::subscriber::SchedulerFn;
use super::value::{ContainerId, Value};
use crate::graph::{queue_job, Job};

/// What a watcher observes.
#[derive(Clone)]
pub enum WatchSource {
    /// A reactive value, traversed deeply.
    Reactive(Value),
    /// A getter whose tracked reads are the dependencies.
    Getter(Rc<dyn Fn() -> Value>),
}

impl WatchSource {
    pub fn getter<F>(getter: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        WatchSource::Getter(Rc::new(getter))
    }
}

impl From<Reactive> for WatchSource {
    fn from(proxy: Reactive) -> Self {
        WatchSource::Reactive(Value::Reactive(proxy))
    }
}

impl From<Value> for WatchSource {
    /// Proxies are watched deeply and refs through their value. Anything
    /// else can never change, so the getter just returns it.
    fn from(value: Value) -> Self {
        match value {
            Value::Reactive(_) => WatchSource::Reactive(value),
            Value::Ref(handle) => WatchSource::getter(move || handle.get()),
            other => WatchSource::getter(move || other.clone()),
        }
    }
}

impl fmt::Debug for WatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSource::Reactive(value) => f.debug_tuple("Reactive").field(value).finish(),
            WatchSource::Getter(_) => f.write_str("Getter"),
        }
    }
}

/// When the callback runs relative to the triggering write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchFlush {
    /// Inside the write that triggered it.
    #[default]
    Sync,
    /// At the next job flush, coalescing repeated triggers.
    Deferred,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Call back once right away, with `Undefined` as the old value.
    pub immediate: bool,
    pub flush: WatchFlush,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            immediate: true,
            flush: WatchFlush::Sync,
        }
    }
}

impl WatchOptions {
    /// Capture the initial value silently instead of calling back.
    pub fn lazy(mut self) -> Self {
        self.immediate = false;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.flush = WatchFlush::Deferred;
        self
    }
}

/// Handle to a running watcher.
pub struct WatchHandle {
    effect: ReactiveEffect<Value>,
}

impl WatchHandle {
    /// Stop watching. Pending deferred callbacks become no-ops.
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("effect", &self.effect)
            .finish()
    }
}

fn scheduler_for(job: &Job, flush: WatchFlush) -> SchedulerFn {
    let job = job.clone();
    match flush {
        WatchFlush::Sync => Rc::new(move || job.run()),
        WatchFlush::Deferred => Rc::new(move || queue_job(job.clone())),
    }
}

/// Call `callback(old, new)` whenever `source` changes.
pub fn watch<F>(source: impl Into<WatchSource>, callback: F, options: WatchOptions) -> WatchHandle
where
    F: Fn(&Value, &Value) + 'static,
{
    let getter: Rc<dyn Fn() -> Value> = match source.into() {
        WatchSource::Reactive(value) => Rc::new(move || traverse(&value)),
        WatchSource::Getter(getter) => getter,
    };

    let old = Rc::new(RefCell::new(Value::Undefined));
    let slot: Rc<OnceCell<WeakEffect<Value>>> = Rc::new(OnceCell::new());

    let job = {
        let (slot, old) = (slot.clone(), old.clone());
        Job::new(move || {
            let Some(effect) = slot.get().and_then(WeakEffect::upgrade) else {
                return;
            };
            if !effect.is_active() {
                return;
            }
            let new = effect.run();
            let previous = old.replace(new.clone());
            untracked(|| callback(&previous, &new));
        })
    };

    let effect = ReactiveEffect::build(move || getter(), Some(scheduler_for(&job, options.flush)));
    let fresh = slot.set(effect.downgrade()).is_ok();
    debug_assert!(fresh, "watch effect slot filled twice");
    debug!(effect = ?effect.id(), ?options, "watch created");

    if options.immediate {
        job.run();
    } else {
        *old.borrow_mut() = effect.run();
    }

    WatchHandle { effect }
}

/// Run `body` now, and again at the next job flush after anything it read
/// changes.
pub fn watch_effect<F>(body: F) -> WatchHandle
where
    F: Fn() + 'static,
{
    let slot: Rc<OnceCell<WeakEffect<Value>>> = Rc::new(OnceCell::new());
    let job = {
        let slot = slot.clone();
        Job::new(move || {
            if let Some(effect) = slot.get().and_then(WeakEffect::upgrade) {
                if effect.is_active() {
                    effect.run();
                }
            }
        })
    };

    let effect = ReactiveEffect::build(
        move || {
            body();
            Value::Undefined
        },
        Some(scheduler_for(&job, WatchFlush::Deferred)),
    );
    let fresh = slot.set(effect.downgrade()).is_ok();
    debug_assert!(fresh, "watch effect slot filled twice");
    effect.run();

    WatchHandle { effect }
}

/// Read every property reachable from `value`, so the running effect
/// depends on all of them. Returns `value`.
///
/// Containers already visited are skipped, which makes cycles safe.
pub fn traverse(value: &Value) -> Value {
    traverse_inner(value, &mut HashSet::new());
    value.clone()
}

fn traverse_inner(value: &Value, seen: &mut HashSet<ContainerId>) {
    match value {
        Value::Reactive(proxy) => {
            if !seen.insert(proxy.id()) {
                return;
            }
            for key in proxy.keys() {
                traverse_inner(&proxy.get(key), seen);
            }
        }
        Value::Container(container) => {
            if !seen.insert(container.id()) {
                return;
            }
            for item in container.values() {
                traverse_inner(&item, seen);
            }
        }
        Value::Ref(handle) => traverse_inner(&handle.get(), seen),
        _ => {}
    }
}
