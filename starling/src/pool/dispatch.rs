//! # Pool Handle
//!
//! [`Pool`] is the caller side of a pool. It validates requests against the
//! worker type's operation table, asks the manager for a worker and forwards
//! the request to it directly. Calls never pass through the manager loop, so
//! workers run them in parallel.

use std::fmt;
use std::sync::Arc;

use starling_api::{CallError, Operation, OperationTable, PoolError, Worker, WorkerId, WorkerState};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use super::config::PoolConfig;
use super::deferred::Deferred;
use super::manager::{Control, Lease, PoolManager, Request};
use super::snapshot::PoolSnapshot;
use crate::log_error;

/// A bounded, self-healing pool of `W` workers.
///
/// `Pool` is a cheap handle; clones share the same workers. The pool shuts
/// down on [`Pool::shutdown`] or when its last handle is dropped.
pub struct Pool<W: Worker> {
    requests: mpsc::Sender<Request<W>>,
    snapshots: watch::Receiver<PoolSnapshot>,
    operations: Arc<OperationTable>,
}

impl<W: Worker> Clone for Pool<W> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            snapshots: self.snapshots.clone(),
            operations: self.operations.clone(),
        }
    }
}

impl<W: Worker> fmt::Debug for Pool<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshots.borrow();
        f.debug_struct("Pool")
            .field("worker_type", &Self::worker_type())
            .field("size", &snapshot.size)
            .field("idle", &snapshot.idle_count())
            .field("busy", &snapshot.busy_count())
            .finish()
    }
}

impl<W: Worker> Pool<W> {
    /// Start a pool, spawning all of its workers before returning.
    ///
    /// Every worker, including replacements for crashed ones, is started
    /// with a clone of `args`.
    pub async fn new(args: W::Args, config: PoolConfig) -> Result<Self, PoolError> {
        let size = config.resolve_size()?;
        let operations = Arc::new(OperationTable::of::<W::Request>());
        let Control { requests, snapshots } = PoolManager::<W>::start(args, size, &config).await?;

        Ok(Self {
            requests,
            snapshots,
            operations,
        })
    }

    fn worker_type() -> &'static str {
        std::any::type_name::<W>()
    }

    fn validate(&self, request: &W::Request) -> Result<(), PoolError> {
        self.operations
            .validate(request.name(), Self::worker_type())
            .map(|_| ())
    }

    /// Call an operation on one of the pool's workers and wait for its
    /// result.
    ///
    /// Blocks while every worker is busy. If the worker crashes mid-call the
    /// request is retried once on another worker; a second crash is returned
    /// as [`PoolError::WorkerCrashed`]. Errors of the operation itself come
    /// back as [`CallError::Operation`].
    pub async fn call(&self, request: W::Request) -> Result<W::Response, CallError<W::Error>> {
        self.validate(&request)?;
        self.forward(request).await?.map_err(CallError::Operation)
    }

    /// Start a call in the background.
    ///
    /// Unsupported operations are rejected right away.
    pub fn future(&self, request: W::Request) -> Result<Deferred<W::Response, W::Error>, PoolError> {
        self.validate(&request)?;
        let pool = self.clone();
        let task = tokio::spawn(async move {
            match pool.forward(request).await {
                Ok(outcome) => outcome.map_err(CallError::Operation),
                Err(e) => Err(CallError::Pool(e)),
            }
        });
        Ok(Deferred::new(task))
    }

    /// Fire-and-forget call. Failures are logged, never returned.
    pub fn cast(&self, request: W::Request) -> Result<(), PoolError> {
        let operation = request.name();
        if let Err(e) = self.validate(&request) {
            log_error!(e, operation, "cast rejected");
            return Err(e);
        }

        let pool = self.clone();
        tokio::spawn(async move {
            match pool.forward(request).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log_error!(e, operation, "cast failed"),
                Err(e) => log_error!(e, operation, "cast failed"),
            }
        });
        Ok(())
    }

    /// The string representation of one of the pool's workers.
    pub async fn inspect(&self) -> Result<String, PoolError> {
        let lease = self.lease().await?;
        match lease.describe().await {
            Ok(description) => Ok(description),
            Err(crashed) => {
                warn!(worker = %crashed.worker, reason = %crashed.reason, "worker crashed during inspect; retrying once");
                Ok(self.lease().await?.describe().await?)
            }
        }
    }

    async fn forward(&self, request: W::Request) -> Result<Result<W::Response, W::Error>, PoolError> {
        let lease = self.lease().await?;
        match lease.call(request.clone()).await {
            Ok(outcome) => Ok(outcome),
            Err(crashed) => {
                warn!(
                    worker = %crashed.worker,
                    reason = %crashed.reason,
                    operation = request.name(),
                    "worker crashed mid-call; retrying once"
                );
                let lease = self.lease().await?;
                let retry = lease.worker();
                lease.call(request).await.map_err(|crashed| {
                    warn!(worker = %retry, "retry crashed as well");
                    PoolError::from(crashed)
                })
            }
        }
    }

    async fn lease(&self) -> Result<Lease<W>, PoolError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Provision(reply))
            .await
            .map_err(|_| PoolError::ShutDown)?;
        response.await.map_err(|_| PoolError::ShutDown)?
    }

    /// Change the number of workers.
    ///
    /// Growing spawns the missing workers. Shrinking terminates idle workers
    /// and waits for busy ones to finish their call first; a worker is never
    /// stopped mid-call.
    pub async fn resize(&self, size: usize) -> Result<(), PoolError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Resize { size, reply })
            .await
            .map_err(|_| PoolError::ShutDown)?;
        response.await.map_err(|_| PoolError::ShutDown)?
    }

    /// Terminate every worker and stop the pool.
    ///
    /// Returns once all workers have exited. Calling it again, from this or
    /// any other handle, is a no-op.
    pub async fn shutdown(&self) {
        let (reply, response) = oneshot::channel();
        if self.requests.send(Request::Shutdown(reply)).await.is_err() {
            return;
        }
        // A shutdown already in progress drops our reply once it is done.
        let _ = response.await;
        // Wait for the manager to close its mailbox.
        self.requests.closed().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.requests.is_closed()
    }

    // --- Capability queries ---

    /// Whether `operation` can be called on this pool.
    pub fn responds_to(&self, operation: &str) -> bool {
        self.operations.supports(operation)
    }

    /// Like [`responds_to`](Self::responds_to), but also true for private
    /// operations.
    pub fn responds_to_private(&self, operation: &str) -> bool {
        self.operations.supports_private(operation)
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    // --- State ---

    /// The target worker count.
    pub fn size(&self) -> usize {
        self.snapshots.borrow().size
    }

    pub fn idle_count(&self) -> usize {
        self.snapshots.borrow().idle_count()
    }

    pub fn busy_count(&self) -> usize {
        self.snapshots.borrow().busy_count()
    }

    /// Ids of all tracked workers, idle first.
    pub fn workers(&self) -> Vec<WorkerId> {
        self.snapshots.borrow().workers()
    }

    pub fn worker_state(&self, worker: WorkerId) -> Option<WorkerState> {
        self.snapshots.borrow().state_of(worker)
    }

    pub fn is_idle(&self, worker: WorkerId) -> bool {
        self.worker_state(worker) == Some(WorkerState::Idle)
    }

    pub fn is_busy(&self, worker: WorkerId) -> bool {
        self.worker_state(worker) == Some(WorkerState::Busy)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until the published state satisfies `predicate`.
    ///
    /// Fails with [`PoolError::ShutDown`] if the pool stops first.
    pub async fn watch_until<F>(&self, mut predicate: F) -> Result<PoolSnapshot, PoolError>
    where
        F: FnMut(&PoolSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| PoolError::ShutDown)?
            .clone();
        Ok(snapshot)
    }
}
