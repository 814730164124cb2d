// src/error.rs
//! Error handling for the entire crate.
//!
//! - **Performance**: Enum discriminant (cheap match), allocations *only* on error paths.
//! - **Taxonomy**: configuration errors fail fast at construction, capacity errors are
//!   reported synchronously at the submission/creation site, and task failures surface
//!   exactly once through the task's failure path. Numerical edge cases (near-zero
//!   separation, degenerate contact normals) are *not* errors — they are skipped locally
//!   by the force/collision passes.
//! - Works perfectly with `?`, threads, and the pool's result channels.

use crate::body::BodyId;
use thiserror::Error;

/// Main error type — lightweight, `Send + Sync + 'static`.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration (non-positive cell size, non-positive mass,
    /// malformed bounds, ...). Never silently substituted with a default.
    #[error("configuration error: {0}")]
    Config(String),

    /// The world's body-count ceiling would be exceeded.
    #[error("body limit reached ({limit} bodies)")]
    BodyLimit { limit: usize },

    /// Lookup of a body id that is absent or inactive.
    #[error("body {0:?} not found")]
    BodyNotFound(BodyId),

    /// The task pool's bounded queue is full. Submission fails immediately,
    /// it is never silently dropped.
    #[error("task queue full ({limit} queued)")]
    QueueFull { limit: usize },

    /// The pool has been shut down; no further submissions are accepted.
    #[error("task pool is shut down")]
    PoolShutdown,

    /// A task exhausted its retries. Surfaces exactly once, through the
    /// task's failure callback and its result handle.
    #[error("task {id} failed after {attempts} attempt(s): {reason}")]
    TaskFailed {
        id: u64,
        attempts: u32,
        reason: String,
    },

    /// Simple custom message (allocation only when the error happens).
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Create a configuration error.
    #[inline]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a custom error message.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    // === Kind checks (branch prediction friendly) ===
    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    #[inline]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::BodyLimit { .. } | Error::QueueFull { .. })
    }

    #[inline]
    pub fn is_task(&self) -> bool {
        matches!(self, Error::TaskFailed { .. } | Error::PoolShutdown)
    }
}

/// Convenient `Result` alias — use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_checks() {
        assert!(Error::config("cell size must be > 0").is_config());
        assert!(Error::BodyLimit { limit: 8 }.is_capacity());
        assert!(Error::QueueFull { limit: 4 }.is_capacity());
        assert!(Error::PoolShutdown.is_task());
        assert!(!Error::custom("whatever").is_config());
    }

    #[test]
    fn display_messages() {
        let e = Error::TaskFailed {
            id: 7,
            attempts: 3,
            reason: "worker panicked".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("task 7"));
        assert!(msg.contains("3 attempt"));
    }
}
