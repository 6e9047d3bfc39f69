#![doc = " In-process worker runtime: linked spawning, call forwarding and termination notices."]

pub mod envelope;
pub mod handle;
pub mod link;

pub use envelope::{CallOutcome, Crashed};
pub use handle::{spawn_linked, WorkerHandle};
pub use link::{Delivery, Link, LinkEvent, LinkEvents};
