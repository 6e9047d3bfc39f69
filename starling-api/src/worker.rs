use async_trait::async_trait;

use crate::operation::Operation;

/// A unit of work that a pool runs several isolated copies of.
///
/// Each worker executes one request at a time. Workers are started with a
/// clone of the pool's [`Worker::Args`], so every worker of a pool, including
/// the replacements of crashed ones, is built from the same arguments.
///
/// A panic inside [`Worker::handle`] is a crash: the worker is discarded and
/// the pool spawns a replacement. Errors returned from `handle` are ordinary
/// operation failures and leave the worker in service.
///
/// ```rust
/// use async_trait::async_trait;
/// use starling_api::{Operation, Worker};
///
/// #[derive(Clone, Debug, Operation)]
/// enum HashRequest {
///     Rehash(String, u32),
/// }
///
/// struct Rehasher;
///
/// #[async_trait]
/// impl Worker for Rehasher {
///     type Args = ();
///     type Request = HashRequest;
///     type Response = String;
///     type Error = std::io::Error;
///
///     async fn start(_args: ()) -> anyhow::Result<Self> {
///         Ok(Rehasher)
///     }
///
///     async fn handle(&mut self, request: HashRequest) -> Result<String, std::io::Error> {
///         match request {
///             HashRequest::Rehash(input, rounds) => Ok(format!("{input}:{rounds}")),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Worker: Send + Sized + 'static {
    /// Construction arguments shared by every worker of a pool.
    type Args: Clone + Send + Sync + 'static;
    /// Operations the worker accepts.
    type Request: Operation;
    type Response: Send + 'static;
    /// Failure raised by an operation; handed to the caller unchanged.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a worker. An error here aborts the spawn.
    async fn start(args: Self::Args) -> anyhow::Result<Self>;

    /// Handle one request.
    async fn handle(&mut self, request: Self::Request) -> Result<Self::Response, Self::Error>;

    /// String representation, answered by `Pool::inspect`.
    fn describe(&self) -> String {
        format!("#<{}>", std::any::type_name::<Self>())
    }

    /// Called before a deliberately terminated worker exits.
    async fn stopping(&mut self) {}
}
