//! # Pool Error Types
//!
//! Errors raised by a worker pool and by the worker runtime underneath it.
//!
//! Two layers are kept apart:
//! - [`PoolError`] covers everything the pool itself can fail with:
//!   configuration, unsupported operations, crashed or dead workers,
//!   spawn failures and calls made after shutdown.
//! - [`CallError`] is what a dispatched call returns. It is either a
//!   [`PoolError`] or the worker's own error type, which is handed back to
//!   the caller unchanged.
//!
//! ## Usage Example
//!
//! ```rust
//! use starling_api::errors::{CallError, PoolError};
//!
//! fn report<E: std::fmt::Display>(error: CallError<E>) {
//!     match error {
//!         CallError::Pool(PoolError::UnsupportedOperation { operation, .. }) => {
//!             println!("no such operation: {}", operation);
//!         }
//!         CallError::Pool(other) => println!("pool failure: {}", other),
//!         CallError::Operation(inner) => println!("operation failed: {}", inner),
//!     }
//! }
//! ```

use thiserror::Error;

use crate::types::WorkerId;

/// Failures of the pool and of its worker runtime.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool configuration was rejected, e.g. a size below the minimum
    /// for multi-worker mode.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested operation is not declared on the worker type, or is
    /// private to it. Raised before any worker is provisioned.
    #[error("Unsupported operation `{operation}` for {worker}")]
    UnsupportedOperation { operation: String, worker: String },

    /// A worker terminated abnormally while handling a call, and the single
    /// automatic retry crashed as well.
    #[error("{worker} crashed: {reason}")]
    WorkerCrashed { worker: WorkerId, reason: String },

    /// Termination was requested on a worker that is already gone.
    #[error("{0} is already dead")]
    DeadHandle(WorkerId),

    /// A worker could not be constructed.
    #[error("Failed to start worker: {0}")]
    SpawnFailed(String),

    /// The pool was resized to zero workers and cannot serve calls.
    #[error("Pool has no workers")]
    NoWorkers,

    /// The pool has been shut down.
    #[error("Pool is shut down")]
    ShutDown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PoolError {
    /// Whether this error reports an already-dead worker.
    pub fn is_dead_handle(&self) -> bool {
        matches!(self, PoolError::DeadHandle(_))
    }
}

/// Result of a dispatched call that did not succeed.
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The pool could not complete the call.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The operation itself failed inside a live worker.
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E> {
    pub fn is_operation(&self) -> bool {
        matches!(self, CallError::Operation(_))
    }

    pub fn as_pool(&self) -> Option<&PoolError> {
        match self {
            CallError::Pool(error) => Some(error),
            CallError::Operation(_) => None,
        }
    }

    /// Returns the worker's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(error) => Some(error),
            CallError::Pool(_) => None,
        }
    }
}
