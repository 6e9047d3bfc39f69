//! # Pool Manager
//!
//! The single control loop of a pool. It owns the pool's [`PoolState`] and
//! is the only place that spawns, provisions, reclaims and terminates
//! workers.
//!
//! ## Mailboxes
//! - `requests`: provisioning, resize and shutdown requests from
//!   [`Pool`](super::Pool) handles, bounded
//! - `events`: [`LinkEvent`]s from the workers the manager spawned
//!
//! ## Suspension
//! A provisioning that finds no idle worker, and a shrink that runs out of
//! idle workers to retire, park themselves in `suspended`. While something
//! is parked the loop receives only from `events`, so no new request is
//! started until the parked one has been served by a completion or a
//! respawn.

use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use starling_api::{PoolError, Worker, WorkerId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn, Instrument};

use super::config::PoolConfig;
use super::snapshot::PoolSnapshot;
use super::state::PoolState;
use crate::runtime::{spawn_linked, CallOutcome, Crashed, Delivery, Link, LinkEvent, LinkEvents, WorkerHandle};
use crate::{log_error, log_pool, pool_span};

/// A worker provisioned for one call.
///
/// Dropping a lease before its call was forwarded hands the worker back to
/// the manager.
pub(crate) struct Lease<W: Worker> {
    handle: WorkerHandle<W>,
    armed: bool,
}

impl<W: Worker> Lease<W> {
    fn new(handle: WorkerHandle<W>) -> Self {
        Self { handle, armed: true }
    }

    pub(crate) fn worker(&self) -> WorkerId {
        self.handle.id()
    }

    /// Forward a request. The worker reports its own completion from here on.
    pub(crate) async fn call(mut self, request: W::Request) -> CallOutcome<W> {
        self.armed = false;
        self.handle.call(request).await
    }

    pub(crate) async fn describe(mut self) -> Result<String, Crashed> {
        self.armed = false;
        self.handle.describe().await
    }
}

impl<W: Worker> Drop for Lease<W> {
    fn drop(&mut self) {
        if self.armed {
            self.handle
                .owner()
                .completed(self.handle.id(), Delivery::new(|| {}));
        }
    }
}

impl<W: Worker> fmt::Debug for Lease<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("worker", &self.handle.id())
            .field("armed", &self.armed)
            .finish()
    }
}

type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

/// Requests served by the manager loop.
pub(crate) enum Request<W: Worker> {
    Provision(Reply<Lease<W>>),
    Resize { size: usize, reply: Reply<()> },
    Shutdown(oneshot::Sender<()>),
}

/// An operation waiting for a worker to become idle.
enum Suspended<W: Worker> {
    Provision(Reply<Lease<W>>),
    Retire { target: usize, reply: Reply<()> },
}

impl<W: Worker> Suspended<W> {
    /// Resolves once the parked caller has stopped waiting. A shrink keeps
    /// going without its caller.
    async fn abandoned(&mut self) {
        match self {
            Suspended::Provision(reply) => reply.closed().await,
            Suspended::Retire { .. } => futures::future::pending().await,
        }
    }
}

/// Channels a [`Pool`](super::Pool) uses to talk to its manager.
pub(crate) struct Control<W: Worker> {
    pub requests: mpsc::Sender<Request<W>>,
    pub snapshots: watch::Receiver<PoolSnapshot>,
}

pub(crate) struct PoolManager<W: Worker> {
    args: W::Args,
    state: PoolState<WorkerHandle<W>>,
    link: Link,
    events: LinkEvents,
    requests: mpsc::Receiver<Request<W>>,
    snapshots: watch::Sender<PoolSnapshot>,
    suspended: Option<Suspended<W>>,
    shutdown_timeout: Duration,
}

impl<W: Worker> PoolManager<W> {
    /// Spawn `size` workers and start the manager loop.
    ///
    /// A worker failing to start aborts construction; the workers spawned
    /// before it are terminated again.
    pub(crate) async fn start(args: W::Args, size: usize, config: &PoolConfig) -> Result<Control<W>, PoolError> {
        let worker_type = std::any::type_name::<W>();
        let (link, events) = Link::channel();
        let mut state = PoolState::new(size);

        for _ in 0..size {
            match spawn_linked::<W>(args.clone(), link.clone()).await {
                Ok(handle) => state.push_idle(handle),
                Err(e) => {
                    log_error!(e, worker_type = worker_type, size, "pool construction failed");
                    for handle in state.drain() {
                        handle.unlink();
                        let _ = handle.terminate();
                    }
                    return Err(e);
                }
            }
        }

        let (request_tx, requests) = mpsc::channel(config.request_capacity);
        let (snapshots, snapshot_rx) = watch::channel(state.snapshot());

        let manager = PoolManager {
            args,
            state,
            link,
            events,
            requests,
            snapshots,
            suspended: None,
            shutdown_timeout: config.shutdown_timeout,
        };
        tokio::spawn(manager.run().instrument(pool_span!(worker_type, size)));
        log_pool!("start", "completed", size);

        Ok(Control {
            requests: request_tx,
            snapshots: snapshot_rx,
        })
    }

    async fn run(mut self) {
        loop {
            if let Some(suspended) = self.suspended.as_mut() {
                // Selective receive: only worker events, or the parked caller
                // going away, can unblock us.
                let event = tokio::select! {
                    biased;
                    event = self.events.recv() => Some(event),
                    _ = suspended.abandoned() => None,
                };
                match event {
                    Some(Some(event)) => {
                        self.on_event(event).await;
                        self.resume();
                    }
                    Some(None) => break,
                    None => {
                        debug!("suspended caller went away");
                        self.suspended = None;
                    }
                }
                continue;
            }

            tokio::select! {
                biased;
                Some(event) = self.events.recv() => self.on_event(event).await,
                request = self.requests.recv() => match request {
                    Some(Request::Provision(reply)) => self.provision(reply),
                    Some(Request::Resize { size, reply }) => self.resize(size, reply).await,
                    Some(Request::Shutdown(reply)) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("every pool handle dropped");
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        // Requests still queued are dropped; their callers see the pool as
        // shut down.
        self.requests.close();
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.state.snapshot());
    }

    async fn on_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Completed { worker, delivery } => {
                if self.state.reclaim(worker) {
                    debug!(worker = %worker, idle = self.state.idle_count(), "worker reclaimed");
                    self.publish();
                } else {
                    debug!(worker = %worker, "completion from an untracked worker");
                }
                delivery.deliver();
            }
            LinkEvent::Terminated { worker, reason } => {
                let tracked = self.state.remove(worker).is_some();
                match reason {
                    Some(reason) if tracked => {
                        warn!(worker = %worker, %reason, "worker crashed; spawning a replacement");
                        self.respawn().await;
                    }
                    Some(reason) => debug!(worker = %worker, %reason, "untracked worker crashed"),
                    None => debug!(worker = %worker, "worker terminated"),
                }
                self.publish();
            }
        }
    }

    async fn respawn(&mut self) {
        match spawn_linked::<W>(self.args.clone(), self.link.clone()).await {
            Ok(handle) => {
                info!(worker = %handle.id(), "replacement worker started");
                self.state.push_idle(handle);
            }
            Err(e) => log_error!(e, size = self.state.size(), "failed to spawn replacement worker"),
        }
    }

    fn resume(&mut self) {
        match self.suspended.take() {
            Some(Suspended::Provision(reply)) => self.provision(reply),
            Some(Suspended::Retire { target, reply }) => self.continue_retire(target, reply),
            None => {}
        }
    }

    fn provision(&mut self, reply: Reply<Lease<W>>) {
        if reply.is_closed() {
            // The caller stopped waiting.
            return;
        }
        match self.state.provision() {
            Some(handle) => {
                debug!(worker = %handle.id(), "worker provisioned");
                self.publish();
                // A caller gone by now drops the lease, which hands the
                // worker back.
                let _ = reply.send(Ok(Lease::new(handle)));
            }
            None if self.state.is_empty() => {
                let _ = reply.send(Err(PoolError::NoWorkers));
            }
            None => {
                debug!(busy = self.state.busy_count(), "no idle worker; waiting");
                self.suspended = Some(Suspended::Provision(reply));
            }
        }
    }

    async fn resize(&mut self, target: usize, reply: Reply<()>) {
        let tracked = self.state.tracked();
        log_pool!("resize", "started", from = self.state.size(), to = target);

        if target > tracked {
            for spawned in 0..target - tracked {
                match spawn_linked::<W>(self.args.clone(), self.link.clone()).await {
                    Ok(handle) => self.state.push_idle(handle),
                    Err(e) => {
                        let achieved = tracked + spawned;
                        log_error!(e, target, achieved, "resize could not spawn every worker");
                        self.state.set_size(achieved);
                        self.publish();
                        let _ = reply.send(Err(e));
                        return;
                    }
                }
            }
            self.finish_resize(target, reply);
        } else {
            self.continue_retire(target, reply);
        }
    }

    /// Retire workers, idle ones first, until no more than `target` are
    /// tracked. Suspends when only busy workers are left.
    ///
    /// The excess is recounted on every resume, so a crash whose replacement
    /// failed to spawn while the shrink was parked is not retired twice.
    fn continue_retire(&mut self, target: usize, reply: Reply<()>) {
        while self.state.tracked() > target {
            match self.state.provision() {
                Some(handle) => self.retire(handle),
                None => {
                    self.publish();
                    self.suspended = Some(Suspended::Retire { target, reply });
                    return;
                }
            }
        }
        self.finish_resize(target, reply);
    }

    fn finish_resize(&mut self, target: usize, reply: Reply<()>) {
        self.state.set_size(target);
        self.publish();
        log_pool!("resize", "completed", size = target);
        let _ = reply.send(Ok(()));
    }

    /// Deliberately stop one provisioned worker.
    fn retire(&mut self, handle: WorkerHandle<W>) {
        handle.unlink();
        self.state.remove(handle.id());
        if let Err(e) = handle.terminate() {
            debug!(worker = %handle.id(), error = %e, "retired worker was already gone");
        }
    }

    async fn shutdown(&mut self) {
        let handles = self.state.drain();
        log_pool!("shutdown", "started", workers = handles.len());

        for handle in &handles {
            handle.unlink();
            if let Err(e) = handle.terminate() {
                warn!(worker = %handle.id(), error = %e, "ignoring dead worker during shutdown");
            }
        }

        let exits = join_all(handles.iter().map(|handle| handle.exited()));
        tokio::pin!(exits);
        let deadline = tokio::time::sleep(self.shutdown_timeout);
        tokio::pin!(deadline);

        // Busy workers finish their current call first; their replies still
        // come through `events`.
        loop {
            tokio::select! {
                _ = &mut exits => break,
                Some(event) = self.events.recv() => Self::settle(event),
                _ = &mut deadline => {
                    warn!(timeout = ?self.shutdown_timeout, "workers did not stop in time; aborting them");
                    for handle in &handles {
                        handle.abort();
                    }
                    (&mut exits).await;
                    break;
                }
            }
        }
        while let Ok(event) = self.events.try_recv() {
            Self::settle(event);
        }

        self.state.set_size(0);
        self.publish();
        log_pool!("shutdown", "completed");
    }

    fn settle(event: LinkEvent) {
        if let LinkEvent::Completed { delivery, .. } = event {
            delivery.deliver();
        }
    }
}
