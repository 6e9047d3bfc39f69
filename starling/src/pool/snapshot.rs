use serde::Serialize;
use starling_api::{WorkerId, WorkerState};

/// Point-in-time view of a pool, published by the manager after every state
/// change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Target worker count.
    pub size: usize,
    /// Idle workers, front of the queue first.
    pub idle: Vec<WorkerId>,
    pub busy: Vec<WorkerId>,
}

impl PoolSnapshot {
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    /// Number of tracked workers.
    pub fn total(&self) -> usize {
        self.idle.len() + self.busy.len()
    }

    /// Ids of all tracked workers, idle first.
    pub fn workers(&self) -> Vec<WorkerId> {
        self.idle.iter().chain(self.busy.iter()).copied().collect()
    }

    pub fn state_of(&self, worker: WorkerId) -> Option<WorkerState> {
        if self.idle.contains(&worker) {
            Some(WorkerState::Idle)
        } else if self.busy.contains(&worker) {
            Some(WorkerState::Busy)
        } else {
            None
        }
    }

    /// Idle and busy are disjoint and their union matches the target size.
    pub fn is_consistent(&self) -> bool {
        let disjoint = self.idle.iter().all(|id| !self.busy.contains(id));
        disjoint && self.total() == self.size
    }
}
