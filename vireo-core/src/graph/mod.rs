//! Dependency Graph
//!
//! This module holds the bookkeeping that connects observed data to the
//! computations that read it, and the queue that coalesces the resulting
//! updates.
//!
//! # Overview
//!
//! The graph is bipartite:
//!
//! - Sources are `(container, key)` pairs and the private dependency sets
//!   owned by computed values and refs
//! - Subscribers are effects (plain effects, computed getters, watchers and
//!   component render effects)
//!
//! Each source owns a [`Dep`]: an insertion-ordered set of subscribers. Each
//! subscriber keeps weak links back to the deps it joined so it can leave all
//! of them before re-running ("cleanup then rerun").
//!
//! # Design Decisions
//!
//! 1. Deps hold subscribers strongly and subscribers hold deps weakly. An
//!    effect nobody else owns stays alive exactly as long as something can
//!    still trigger it.
//!
//! 2. The per-container maps live in a thread-local side table keyed by
//!    container identity. Entries are evicted when the container's storage
//!    is dropped, so the table never keeps a container alive.
//!
//! 3. Notification iterates a snapshot, in insertion order.

mod dep;
mod registry;
mod scheduler;

pub use dep::Dep;
pub(crate) use dep::{track_effects, trigger_effects, WeakDep};
pub use registry::{track, trigger, Registry};
pub use scheduler::{
    flush_jobs, flush_until_idle, has_pending_jobs, invalidate_job, next_tick, pending_jobs,
    queue_job, run_local, Job, DEFAULT_FLUSH_LIMIT,
};
