//! Reactive Primitives
//!
//! This module implements the reactive system: observed containers, effects,
//! effect scopes, computed values, refs and watchers.
//!
//! # Concepts
//!
//! ## Containers and proxies
//!
//! A [`Container`] is a plain shared record or list. Wrapping it with
//! [`reactive`] yields a [`Reactive`] proxy whose accessors record reads
//! (`track`) and announce writes (`trigger`). Nested containers are wrapped
//! lazily, the first time they are read through a proxy.
//!
//! ## Effects
//!
//! An effect is a re-runnable computation. Every run starts by leaving all
//! the dependency sets the previous run joined, so a branch that is no longer
//! taken stops being a dependency.
//!
//! ## Derived values
//!
//! [`Computed`] caches a getter and recomputes lazily after a dependency
//! changed. [`Ref`] boxes a single value. [`ObjectRef`] and [`GetterRef`]
//! present a property or a closure through the same [`DerivedRef`] surface.
//!
//! # Implementation Notes
//!
//! The active effect and the ambient effect scope live on thread-local
//! stacks guarded by RAII handles, so a panicking computation still restores
//! whatever was active before it.
//!
//! Rust has no transparent property interception; reads and writes go
//! through explicit `get`/`set` methods instead.

mod computed;
mod context;
mod effect;
mod proxy;
mod refs;
mod scope;
mod subscriber;
mod value;
mod watch;

pub use computed::{computed, computed_with, Computed, ComputedState};
pub use context::ReactiveContext;
pub use effect::{effect, effect_with, untracked, EffectOptions, ReactiveEffect, WeakEffect};
pub use proxy::{is_reactive, reactive, to_raw, Reactive};
pub use refs::{
    is_ref, make_ref, property_ref, proxy_refs, to_ref, to_ref_getter, to_refs, unref,
    DerivedRef, GetterRef, ObjectRef, Ref, RefHandle, RefKind, RefsProxy,
};
pub use scope::{current_scope, effect_scope, on_scope_dispose, EffectScope};
pub(crate) use subscriber::Subscriber;
pub use subscriber::{EffectId, SchedulerFn};
pub use value::{Container, ContainerId, Key, Value};
pub use watch::{traverse, watch, watch_effect, WatchFlush, WatchHandle, WatchOptions, WatchSource};
