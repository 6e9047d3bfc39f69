//! # Worker Handles
//!
//! Spawning and driving pooled workers. Every worker runs on its own Tokio
//! task with a private mailbox and processes one envelope at a time.
//!
//! ## Key Concepts
//! - Linked spawn: a worker reports completions and its own termination to
//!   the [`Link`] it was spawned with
//! - Crash containment: a panic inside the worker is caught, answered to the
//!   in-flight caller as [`Crashed`] and ends the worker
//! - Unlinking: a worker that is being retired deliberately stops reporting
//!   its termination so that it is not mistaken for a crash

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use starling_api::{Operation, PoolError, Worker, WorkerId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use super::envelope::{panic_message, CallOutcome, Crashed, Envelope};
use super::link::{Delivery, Link};
use crate::{log_error, log_lifecycle};

/// Liveness shared between a worker task and its handles.
#[derive(Debug)]
struct WorkerCell {
    alive: AtomicBool,
    linked: AtomicBool,
    exited: watch::Receiver<bool>,
}

/// Reference to a spawned worker.
///
/// Handles are cheap to clone; all clones address the same worker. The
/// worker keeps running while at least one handle exists and stops on its
/// own once every handle is dropped.
pub struct WorkerHandle<W: Worker> {
    id: WorkerId,
    mailbox: mpsc::UnboundedSender<Envelope<W>>,
    cell: Arc<WorkerCell>,
    owner: Link,
    task: AbortHandle,
}

impl<W: Worker> Clone for WorkerHandle<W> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            mailbox: self.mailbox.clone(),
            cell: self.cell.clone(),
            owner: self.owner.clone(),
            task: self.task.clone(),
        }
    }
}

impl<W: Worker> fmt::Debug for WorkerHandle<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("worker_type", &std::any::type_name::<W>())
            .field("alive", &self.is_alive())
            .field("linked", &self.is_linked())
            .finish()
    }
}

impl<W: Worker> WorkerHandle<W> {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// The link this worker reports to.
    pub fn owner(&self) -> &Link {
        &self.owner
    }

    pub fn is_alive(&self) -> bool {
        self.cell.alive.load(Ordering::SeqCst) && !self.mailbox.is_closed()
    }

    pub fn is_linked(&self) -> bool {
        self.cell.linked.load(Ordering::SeqCst)
    }

    /// Forward a request and wait for the outcome.
    ///
    /// The reply travels through the owner's event channel as a
    /// [`Delivery`], so it resolves only after the owner has processed the
    /// worker's completion.
    pub async fn call(&self, request: W::Request) -> CallOutcome<W> {
        let (reply, response) = oneshot::channel();
        if self.mailbox.send(Envelope::Call { request, reply }).is_err() {
            return Err(self.crashed("worker mailbox is closed"));
        }
        response
            .await
            .unwrap_or_else(|_| Err(self.crashed("worker stopped before answering")))
    }

    /// Ask the worker for its string representation.
    pub async fn describe(&self) -> Result<String, Crashed> {
        let (reply, response) = oneshot::channel();
        if self.mailbox.send(Envelope::Describe { reply }).is_err() {
            return Err(self.crashed("worker mailbox is closed"));
        }
        response
            .await
            .unwrap_or_else(|_| Err(self.crashed("worker stopped before answering")))
    }

    /// Request a graceful stop. The worker finishes the request it is
    /// running, if any, then exits.
    ///
    /// Fails with [`PoolError::DeadHandle`] when the worker is already gone.
    pub fn terminate(&self) -> Result<(), PoolError> {
        self.mailbox
            .send(Envelope::Stop)
            .map_err(|_| PoolError::DeadHandle(self.id))
    }

    /// Detach the worker from its owner. Its termination is no longer
    /// reported.
    pub fn unlink(&self) {
        self.cell.linked.store(false, Ordering::SeqCst);
    }

    /// Resolves once the worker's task has ended.
    pub async fn exited(&self) {
        let mut exited = self.cell.exited.clone();
        // A closed channel means the task is gone as well.
        let _ = exited.wait_for(|done| *done).await;
    }

    /// Cancel the worker's task without letting it finish its current
    /// request.
    pub fn abort(&self) {
        self.task.abort();
    }

    fn crashed(&self, reason: &str) -> Crashed {
        Crashed {
            worker: self.id,
            reason: reason.to_string(),
        }
    }
}

/// Spawn a worker linked to `owner` and wait until it has started.
///
/// Fails with [`PoolError::SpawnFailed`] when [`Worker::start`] returns an
/// error or panics.
pub async fn spawn_linked<W: Worker>(args: W::Args, owner: Link) -> Result<WorkerHandle<W>, PoolError> {
    let id = WorkerId::new();
    let worker_type = std::any::type_name::<W>();
    let (mailbox, inbox) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

    let cell = Arc::new(WorkerCell {
        alive: AtomicBool::new(false),
        linked: AtomicBool::new(true),
        exited: exit_rx,
    });

    let task_cell = cell.clone();
    let link = owner.clone();
    let task = tokio::spawn(async move {
        let worker = match AssertUnwindSafe(W::start(args)).catch_unwind().await {
            Ok(Ok(worker)) => worker,
            Ok(Err(e)) => {
                let _ = ready_tx.send(Err(format!("{e:#}")));
                exit_tx.send_replace(true);
                return;
            }
            Err(payload) => {
                let _ = ready_tx.send(Err(format!("panicked during start: {}", panic_message(payload))));
                exit_tx.send_replace(true);
                return;
            }
        };
        task_cell.alive.store(true, Ordering::SeqCst);
        let _ = ready_tx.send(Ok(()));
        run_worker(worker, id, inbox, task_cell, link, exit_tx).await;
    });

    match ready_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            log_error!(reason, worker_type = worker_type, "worker failed to start");
            return Err(PoolError::SpawnFailed(reason));
        }
        Err(_) => {
            return Err(PoolError::SpawnFailed("worker task ended before starting".to_string()));
        }
    }

    log_lifecycle!(worker_type, id, "started");
    Ok(WorkerHandle {
        id,
        mailbox,
        cell,
        owner,
        task: task.abort_handle(),
    })
}

async fn run_worker<W: Worker>(
    mut worker: W,
    id: WorkerId,
    mut inbox: mpsc::UnboundedReceiver<Envelope<W>>,
    cell: Arc<WorkerCell>,
    link: Link,
    exit: watch::Sender<bool>,
) {
    let worker_type = std::any::type_name::<W>();

    let reason = loop {
        // Every handle dropped: nobody can reach this worker any more.
        let Some(envelope) = inbox.recv().await else {
            break None;
        };

        match envelope {
            Envelope::Call { request, reply } => {
                let operation = request.name();
                debug!(worker = %id, operation, "handling request");
                match AssertUnwindSafe(worker.handle(request)).catch_unwind().await {
                    Ok(result) => link.completed(
                        id,
                        Delivery::new(move || {
                            let _ = reply.send(Ok(result));
                        }),
                    ),
                    Err(payload) => {
                        let reason = panic_message(payload);
                        let _ = reply.send(Err(Crashed {
                            worker: id,
                            reason: reason.clone(),
                        }));
                        break Some(reason);
                    }
                }
            }
            Envelope::Describe { reply } => {
                match std::panic::catch_unwind(AssertUnwindSafe(|| worker.describe())) {
                    Ok(text) => link.completed(
                        id,
                        Delivery::new(move || {
                            let _ = reply.send(Ok(text));
                        }),
                    ),
                    Err(payload) => {
                        let reason = panic_message(payload);
                        let _ = reply.send(Err(Crashed {
                            worker: id,
                            reason: reason.clone(),
                        }));
                        break Some(reason);
                    }
                }
            }
            Envelope::Stop => {
                if let Err(payload) = AssertUnwindSafe(worker.stopping()).catch_unwind().await {
                    warn!(worker = %id, reason = %panic_message(payload), "worker panicked while stopping");
                }
                break None;
            }
        }
    };

    cell.alive.store(false, Ordering::SeqCst);
    // Envelopes still queued are dropped here; their callers see a crash.
    inbox.close();
    drop(inbox);
    drop(worker);

    match &reason {
        Some(reason) => warn!(worker = %id, worker_type, %reason, "worker crashed"),
        None => log_lifecycle!(worker_type, id, "stopped"),
    }

    if cell.linked.load(Ordering::SeqCst) {
        link.terminated(id, reason);
    }
    exit.send_replace(true);
}
