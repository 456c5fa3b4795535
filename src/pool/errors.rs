//! Error types for pool operations
//!
//! Creation and exhaustion failures propagate to borrowers; validation and
//! cleanup failures are handled inside the pool (destroy-and-retry, logged
//! best-effort teardown) and never surface here.

use std::time::Duration;
use thiserror::Error;

use crate::engine::EngineError;

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Error types surfaced by pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    /// No resource became available within the wait budget and the pool is
    /// at capacity. Retryable.
    #[error("pool exhausted: no resource became available within {waited:?}")]
    Exhausted { waited: Duration },

    /// Creating a fresh resource failed. Not retried by the pool.
    #[error("failed to create pooled resource: {0}")]
    CreationFailed(#[from] EngineError),

    /// Resetting a resource for reuse failed; the pool destroys it.
    #[error("failed to reset pooled resource: {0}")]
    ResetFailed(#[source] EngineError),

    /// The pool has been shut down.
    #[error("pool is closed")]
    Closed,
}
