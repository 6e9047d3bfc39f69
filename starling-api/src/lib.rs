//! # Starling Worker Pool API
//!
//! Traits and types shared by every Starling pool: the [`Worker`] contract a
//! pooled unit implements, the [`Operation`] contract of its request type,
//! and the errors a pool reports.
//!
//! ## Core Components
//!
//! - **Workers**: isolated units that execute one request at a time
//! - **Operations**: the static, name-indexed operation set of a worker type
//! - **Errors**: pool failures kept apart from the worker's own errors
//!
//! ## Module Organization
//!
//! - [`worker`]: the worker trait
//! - [`operation`]: operation metadata and the operation table
//! - [`errors`]: error types
//! - [`types`]: worker identity, worker state and result aliases

pub mod errors;
pub mod operation;
pub mod types;
pub mod worker;

pub use errors::{CallError, PoolError};
pub use operation::{Operation, OperationInfo, OperationTable, Visibility};
pub use types::{CallResult, PoolResult, WorkerId, WorkerState};
pub use worker::Worker;

// Re-export the derive macro
pub use starling_api_derive::Operation;
