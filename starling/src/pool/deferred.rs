use starling_api::{CallError, PoolError};
use tokio::task::JoinHandle;

/// Result of a call started with [`Pool::future`](super::Pool::future).
///
/// The call runs on its own task. Dropping the `Deferred` detaches it; the
/// worker is still reclaimed when the call finishes.
#[derive(Debug)]
pub struct Deferred<T, E> {
    task: JoinHandle<Result<T, CallError<E>>>,
}

impl<T, E> Deferred<T, E> {
    pub(crate) fn new(task: JoinHandle<Result<T, CallError<E>>>) -> Self {
        Self { task }
    }

    /// Whether the call has finished.
    pub fn is_ready(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the call's outcome.
    pub async fn value(self) -> Result<T, CallError<E>> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CallError::Pool(PoolError::Other(anyhow::Error::new(e)))),
        }
    }
}
