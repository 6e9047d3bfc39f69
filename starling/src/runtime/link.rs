//! # Linked Supervision
//!
//! A [`Link`] is the owner side of the parent/child relation between a pool
//! manager and the workers it spawns. Workers report into the owner's event
//! channel:
//!
//! - [`LinkEvent::Completed`] after every forwarded request. The event
//!   carries the reply as a [`Delivery`] so the owner can reclaim the worker
//!   before the caller sees the result.
//! - [`LinkEvent::Terminated`] when a linked worker's task ends, with no
//!   reason for a deliberate stop and the failure cause for a crash.
//!
//! Events arrive as ordinary messages, never as asynchronous exceptions.

use std::fmt;

use starling_api::WorkerId;
use tokio::sync::mpsc;

/// A reply held back until the owner has reclaimed the worker.
pub struct Delivery(Box<dyn FnOnce() + Send>);

impl Delivery {
    pub fn new<F>(deliver: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(deliver))
    }

    /// Hand the reply to the waiting caller. A caller that went away is
    /// silently skipped.
    pub fn deliver(self) {
        (self.0)()
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivery(<reply>)")
    }
}

/// Notification from a linked worker to its owner.
#[derive(Debug)]
pub enum LinkEvent {
    /// The worker finished a request and is ready for another one.
    Completed { worker: WorkerId, delivery: Delivery },
    /// The worker's task ended. `reason` is `None` for a deliberate
    /// termination and carries the failure cause for a crash.
    Terminated { worker: WorkerId, reason: Option<String> },
}

/// Receiving side of a link, owned by the supervising manager.
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

/// Back-link from a worker to its owner.
#[derive(Debug, Clone)]
pub struct Link {
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Link {
    /// Creates a link and the event stream its owner consumes.
    pub fn channel() -> (Link, LinkEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Link { events }, receiver)
    }

    /// Whether the owner is still listening.
    pub fn is_open(&self) -> bool {
        !self.events.is_closed()
    }

    pub(crate) fn completed(&self, worker: WorkerId, delivery: Delivery) {
        // With the owner gone nobody can reclaim the worker; the caller still
        // gets its reply.
        if let Err(mpsc::error::SendError(LinkEvent::Completed { delivery, .. })) =
            self.events.send(LinkEvent::Completed { worker, delivery })
        {
            delivery.deliver();
        }
    }

    pub(crate) fn terminated(&self, worker: WorkerId, reason: Option<String>) {
        let _ = self.events.send(LinkEvent::Terminated { worker, reason });
    }
}
