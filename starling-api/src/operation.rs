//! # Operations
//!
//! A worker type declares the operations it accepts as a request enum. Each
//! variant is one operation; its name, visibility and arity form the static
//! operation set of the worker type.
//!
//! The set is described once per type by [`Operation::operations`] (usually
//! generated with `#[derive(Operation)]`) and indexed into an
//! [`OperationTable`] when a pool is built. The table validates calls before
//! a worker is provisioned and answers capability queries without touching
//! any worker.

use std::collections::HashMap;

use serde::Serialize;

use crate::errors::PoolError;

/// Who may dispatch an operation through a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    /// Dispatchable, and reported by capability queries like a public
    /// operation.
    Protected,
    /// Declared on the worker type but never dispatchable from outside.
    Private,
}

impl Visibility {
    pub fn is_dispatchable(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

/// Static metadata of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: &'static str,
    pub visibility: Visibility,
    /// Number of arguments the operation carries.
    pub arity: usize,
}

impl OperationInfo {
    pub const fn new(name: &'static str, visibility: Visibility, arity: usize) -> Self {
        Self { name, visibility, arity }
    }
}

/// A request that can be dispatched to a worker.
///
/// Requests must be `Clone` so that a call interrupted by a worker crash can
/// be retried on another worker.
pub trait Operation: Clone + Send + 'static {
    /// Name of the operation this request invokes.
    fn name(&self) -> &'static str;

    /// The full operation set of the request type.
    fn operations() -> &'static [OperationInfo];
}

/// Name-indexed view of a worker type's operation set.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    entries: HashMap<&'static str, OperationInfo>,
}

impl OperationTable {
    /// Builds the table of a request type.
    pub fn of<O: Operation>() -> Self {
        Self::from_operations(O::operations())
    }

    pub fn from_operations(operations: &[OperationInfo]) -> Self {
        let entries = operations.iter().map(|info| (info.name, *info)).collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&OperationInfo> {
        self.entries.get(name)
    }

    /// Whether `name` is a public or protected operation.
    pub fn supports(&self, name: &str) -> bool {
        self.get(name)
            .map(|info| info.visibility.is_dispatchable())
            .unwrap_or(false)
    }

    /// Whether `name` is declared at all, private operations included.
    pub fn supports_private(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Checks that `name` may be dispatched to workers of type `worker`.
    pub fn validate(&self, name: &str, worker: &str) -> Result<&OperationInfo, PoolError> {
        match self.get(name) {
            Some(info) if info.visibility.is_dispatchable() => Ok(info),
            _ => Err(PoolError::UnsupportedOperation {
                operation: name.to_string(),
                worker: worker.to_string(),
            }),
        }
    }

    /// Operation names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
