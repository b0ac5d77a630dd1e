//! Vireo Core
//!
//! This crate provides the core runtime for the Vireo reactive UI framework.
//! It implements:
//!
//! - Observed containers with explicit tracked accessors
//! - Effects, effect scopes, computed values, refs and watchers
//! - A deduplicating deferred job queue
//! - Virtual nodes and a keyed reconciliation engine
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the dependency registry (who depends on which container key)
//!   and the job scheduler
//! - `reactive`: effects, scopes, values, the reactive proxy layer and the
//!   derived value types built on top of them
//! - `render`: virtual nodes, the host operation boundary, components and
//!   the renderer with its LIS-based keyed diff
//!
//! All runtime state is thread-local. Handles are `Rc`-based and therefore
//! not `Send`; one UI tree lives on one thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use vireo_core::reactive::{effect, reactive, Value};
//!
//! let state = reactive(Value::from(serde_json::json!({ "n": 1 })));
//! let out = Rc::new(Cell::new(0.0));
//!
//! let (s, o) = (state.clone(), out.clone());
//! effect(move || o.set(s.get("n").as_number().unwrap_or(0.0) * 2.0));
//! assert_eq!(out.get(), 2.0);
//!
//! state.set("n", 5);
//! // Effect re-ran on its own
//! assert_eq!(out.get(), 10.0);
//! ```

pub mod error;
pub mod graph;
pub mod reactive;
pub mod render;

pub use error::{Error, Result};
