//! Error types shared by the reactive layer and the job scheduler.
//!
//! Most of the runtime is infallible by construction: reading outside an
//! effect simply skips tracking, and a panicking computation unwinds to
//! whoever called `run()`. The variants here cover the few places where a
//! caller can hand the runtime something it cannot honour.

use thiserror::Error;

/// Errors surfaced by the Vireo runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A list mutator (`push`, `splice`, ...) was called on a record.
    #[error("`{op}` can only be called on a list container")]
    NotAList { op: &'static str },

    /// An operation that needs a container was given a primitive value.
    #[error("expected a container, found {found}")]
    NotAContainer { found: &'static str },

    /// A job panicked while the job queue was being flushed.
    ///
    /// The rest of the flush still ran; this carries the first failure.
    #[error("job panicked during flush: {message}")]
    JobPanicked { message: String },

    /// The job queue kept refilling itself past the flush limit.
    #[error("job queue did not settle after {limit} flushes")]
    FlushLimitExceeded { limit: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
