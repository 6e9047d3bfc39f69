// Starling Worker Pool
//
// This crate runs a fixed-size pool of isolated workers behind one handle.
// Calls are load-balanced to idle workers, crashed workers are replaced and
// the pool can be resized or shut down while it is in use.

pub mod logging;
pub mod pool;
pub mod runtime;

// Re-export commonly used types
pub use pool::{Deferred, FixedParallelism, ParallelismHint, Pool, PoolConfig, PoolMode, PoolSnapshot};
pub use starling_api::{
    CallError, CallResult, Operation, OperationInfo, OperationTable, PoolError, PoolResult, Visibility, Worker,
    WorkerId, WorkerState,
};
