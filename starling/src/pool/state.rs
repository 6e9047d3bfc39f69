//! Bookkeeping of a pool's workers.
//!
//! [`PoolState`] is owned by the manager loop and never shared. It keeps the
//! two disjoint collections of handles: the FIFO idle queue and the busy set.

use std::collections::{HashMap, VecDeque};

use starling_api::{Worker, WorkerId};

use super::snapshot::PoolSnapshot;
use crate::runtime::WorkerHandle;

/// Anything the pool tracks by worker identity.
pub trait Tracked: Clone {
    fn id(&self) -> WorkerId;
}

impl<W: Worker> Tracked for WorkerHandle<W> {
    fn id(&self) -> WorkerId {
        WorkerHandle::id(self)
    }
}

#[derive(Debug)]
pub struct PoolState<H: Tracked> {
    idle: VecDeque<H>,
    busy: HashMap<WorkerId, H>,
    size: usize,
}

impl<H: Tracked> PoolState<H> {
    pub fn new(size: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(size),
            busy: HashMap::with_capacity(size),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    /// Workers currently tracked, idle or busy.
    pub fn tracked(&self) -> usize {
        self.idle.len() + self.busy.len()
    }

    /// No worker is tracked at all, so provisioning could never succeed.
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty() && self.busy.is_empty()
    }

    /// Append a worker to the back of the idle queue.
    pub fn push_idle(&mut self, handle: H) {
        self.idle.push_back(handle);
    }

    /// Move the front idle worker to the busy set.
    pub fn provision(&mut self) -> Option<H> {
        let handle = self.idle.pop_front()?;
        self.busy.insert(handle.id(), handle.clone());
        Some(handle)
    }

    /// Return a busy worker to the back of the idle queue.
    ///
    /// Returns `false` when the worker is not busy, e.g. because it was
    /// already removed after a crash.
    pub fn reclaim(&mut self, worker: WorkerId) -> bool {
        match self.busy.remove(&worker) {
            Some(handle) => {
                self.idle.push_back(handle);
                true
            }
            None => false,
        }
    }

    /// Forget a worker in whichever collection holds it.
    pub fn remove(&mut self, worker: WorkerId) -> Option<H> {
        if let Some(handle) = self.busy.remove(&worker) {
            return Some(handle);
        }
        let position = self.idle.iter().position(|h| h.id() == worker)?;
        self.idle.remove(position)
    }

    /// Take every tracked worker, idle ones first.
    pub fn drain(&mut self) -> Vec<H> {
        let mut handles: Vec<H> = self.idle.drain(..).collect();
        handles.extend(self.busy.drain().map(|(_, handle)| handle));
        handles
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let mut busy: Vec<WorkerId> = self.busy.keys().copied().collect();
        busy.sort();
        PoolSnapshot {
            size: self.size,
            idle: self.idle.iter().map(Tracked::id).collect(),
            busy,
        }
    }
}
