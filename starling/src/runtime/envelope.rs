use std::any::Any;
use std::fmt;

use starling_api::{PoolError, Worker, WorkerId};
use thiserror::Error;
use tokio::sync::oneshot;

/// Distinguished failure signal: the worker terminated abnormally before it
/// could answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{worker} crashed: {reason}")]
pub struct Crashed {
    pub worker: WorkerId,
    pub reason: String,
}

impl From<Crashed> for PoolError {
    fn from(crashed: Crashed) -> Self {
        PoolError::WorkerCrashed {
            worker: crashed.worker,
            reason: crashed.reason,
        }
    }
}

/// What a forwarded call resolves to: the operation's own result, or the
/// crash of the worker running it.
pub type CallOutcome<W> =
    Result<Result<<W as Worker>::Response, <W as Worker>::Error>, Crashed>;

/// Messages delivered to a worker's mailbox.
pub(crate) enum Envelope<W: Worker> {
    Call {
        request: W::Request,
        reply: oneshot::Sender<CallOutcome<W>>,
    },
    Describe {
        reply: oneshot::Sender<Result<String, Crashed>>,
    },
    Stop,
}

impl<W: Worker> fmt::Debug for Envelope<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Call { request, .. } => {
                f.debug_struct("Call").field("operation", &starling_api::Operation::name(request)).finish()
            }
            Envelope::Describe { .. } => write!(f, "Describe"),
            Envelope::Stop => write!(f, "Stop"),
        }
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
