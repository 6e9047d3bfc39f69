use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use starling_api::PoolError;

/// Capacity of the manager's request mailbox.
pub const DEFAULT_REQUEST_CAPACITY: usize = 1024;

/// How long shutdown waits for workers to finish before aborting them.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Smallest size accepted for a multi-worker pool.
pub const MIN_MULTI_WORKER_SIZE: usize = 2;

// --- Configuration Enums ---

/// Whether a pool is allowed to run with a single worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PoolMode {
    /// Regular pool; at least [`MIN_MULTI_WORKER_SIZE`] workers.
    #[default]
    Multi,
    /// Explicit opt-in to a pool that may hold one worker.
    Single,
}

/// Source of the default pool size.
pub trait ParallelismHint: fmt::Debug + Send + Sync {
    /// Number of workers the host can usefully run in parallel.
    fn available(&self) -> usize;
}

/// Uses the number of logical CPUs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumCpus;

impl ParallelismHint for NumCpus {
    fn available(&self) -> usize {
        num_cpus::get()
    }
}

/// A fixed answer, for deterministic setups such as tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedParallelism(pub usize);

impl ParallelismHint for FixedParallelism {
    fn available(&self) -> usize {
        self.0
    }
}

// --- Pool Configuration ---

/// Configuration for a [`Pool`](crate::pool::Pool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers. `None` derives it from `parallelism`.
    pub size: Option<usize>,

    pub mode: PoolMode,

    /// Default-size provider consulted when `size` is `None`.
    pub parallelism: Arc<dyn ParallelismHint>,

    /// Capacity of the manager's request mailbox.
    pub request_capacity: usize,

    /// The timeout for pool shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: None,
            mode: PoolMode::Multi,
            parallelism: Arc::new(NumCpus),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// A single-worker pool.
    pub fn single() -> Self {
        Self {
            size: Some(1),
            mode: PoolMode::Single,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_mode(mut self, mode: PoolMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallelism<P: ParallelismHint + 'static>(mut self, hint: P) -> Self {
        self.parallelism = Arc::new(hint);
        self
    }

    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = capacity;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The number of workers to spawn at construction.
    ///
    /// Without an explicit size this is the parallelism hint, but never less
    /// than [`MIN_MULTI_WORKER_SIZE`]. An explicit size below that minimum is
    /// rejected unless the pool is in [`PoolMode::Single`].
    pub fn resolve_size(&self) -> Result<usize, PoolError> {
        if self.request_capacity == 0 {
            return Err(PoolError::Config("request capacity must be at least 1".to_string()));
        }

        let size = match self.size {
            Some(size) => size,
            None => self.parallelism.available().max(MIN_MULTI_WORKER_SIZE),
        };

        if size == 0 {
            return Err(PoolError::Config("pool size must be at least 1".to_string()));
        }
        if self.mode == PoolMode::Multi && size < MIN_MULTI_WORKER_SIZE {
            return Err(PoolError::Config(format!(
                "pool size {} is below the minimum of {} for a multi-worker pool; use single mode for one worker",
                size, MIN_MULTI_WORKER_SIZE
            )));
        }
        Ok(size)
    }
}
