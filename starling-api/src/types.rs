use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::errors::{CallError, PoolError};

/// Identity of a spawned worker, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    /// Allocates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0.simple())
    }
}

/// Availability of a tracked worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting in the idle queue.
    Idle,
    /// Provisioned for a call that has not completed yet.
    Busy,
}

// Type aliases for common types
pub type PoolResult<T> = Result<T, PoolError>;
pub type CallResult<T, E> = Result<T, CallError<E>>;
