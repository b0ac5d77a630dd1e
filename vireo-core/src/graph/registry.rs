//! Dependency Registry
//!
//! The registry is the side table that maps an observed container to its
//! per-key dependency sets. It is the only place `track` and `trigger` write
//! to, and it never owns the containers it describes.
//!
//! # How It Works
//!
//! 1. A tracked read calls [`track`] with the container id and key. If an
//!    effect is active, the registry finds (or allocates) the dep for that
//!    pair and subscribes the effect.
//!
//! 2. A write that changed something calls [`trigger`]. The registry looks
//!    up the dep and notifies a snapshot of its subscribers.
//!
//! 3. When a container's storage is dropped its entry is evicted, which
//!    releases every effect that was only alive to watch it.
//!
//! # Thread Safety
//!
//! The table is thread-local. Each UI thread has its own graph and no
//! locking is needed or provided.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::trace;

use super::dep::{track_effects, trigger_effects, Dep};
use crate::reactive::{ContainerId, Key, ReactiveContext};

thread_local! {
    static TARGET_MAP: RefCell<HashMap<ContainerId, HashMap<Key, Dep>>> =
        RefCell::new(HashMap::new());
}

/// Entry points into the per-thread dependency registry.
pub struct Registry;

impl Registry {
    /// Subscribe the active effect to `(target, key)`.
    pub fn track(target: ContainerId, key: &Key) {
        if !ReactiveContext::is_tracking() {
            return;
        }

        let dep = TARGET_MAP.with(|map| {
            map.borrow_mut()
                .entry(target)
                .or_default()
                .entry(key.clone())
                .or_default()
                .clone()
        });

        trace!(?target, %key, "track");
        track_effects(&dep);
    }

    /// Notify everything subscribed to `(target, key)`.
    pub fn trigger(target: ContainerId, key: &Key) {
        // Release the table before running effects; they will track again.
        let dep = TARGET_MAP.with(|map| {
            map.borrow()
                .get(&target)
                .and_then(|deps| deps.get(key))
                .cloned()
        });

        if let Some(dep) = dep {
            trace!(?target, %key, subscribers = dep.len(), "trigger");
            trigger_effects(&dep);
        }
    }

    /// Drop every dep recorded for `target`.
    ///
    /// Called when the container's storage goes away.
    pub(crate) fn evict(target: ContainerId) {
        let removed = TARGET_MAP
            .try_with(|map| {
                map.try_borrow_mut()
                    .ok()
                    .and_then(|mut map| map.remove(&target))
            })
            .ok()
            .flatten();

        // Dropping the deps may drop effects, which may drop more
        // containers; the table must not be borrowed while that happens.
        drop(removed);
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(target: ContainerId, key: &Key) -> usize {
        TARGET_MAP.with(|map| {
            map.borrow()
                .get(&target)
                .and_then(|deps| deps.get(key))
                .map_or(0, Dep::len)
        })
    }

    /// Number of containers with at least one recorded dep map.
    pub fn tracked_containers() -> usize {
        TARGET_MAP.with(|map| map.borrow().len())
    }
}

/// Shorthand for [`Registry::track`].
pub fn track(target: ContainerId, key: &Key) {
    Registry::track(target, key);
}

/// Shorthand for [`Registry::trigger`].
pub fn trigger(target: ContainerId, key: &Key) {
    Registry::trigger(target, key);
}
