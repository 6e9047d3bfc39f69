#![doc = " Bounded, self-healing worker pools."]

pub mod config;
pub mod deferred;
pub mod dispatch;
mod manager;
pub mod snapshot;
mod state;

pub use config::{
    FixedParallelism, NumCpus, ParallelismHint, PoolConfig, PoolMode, DEFAULT_REQUEST_CAPACITY,
    DEFAULT_SHUTDOWN_TIMEOUT, MIN_MULTI_WORKER_SIZE,
};
pub use deferred::Deferred;
pub use dispatch::Pool;
pub use snapshot::PoolSnapshot;
