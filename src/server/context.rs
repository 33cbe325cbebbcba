//! # Shared execution context for server tasks.
//!
//! One [`ServerContext`] is built per server run and cloned into every
//! hosted task. It carries the server identity, the job store, and the
//! process-wide shutdown token, plus a cancellable [`wait`](ServerContext::wait)
//! used by periodic tasks and retry delays.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::storage::JobStore;

/// Context shared by all tasks of one server run. Cheap to clone.
#[derive(Clone)]
pub struct ServerContext {
    server_id: Arc<str>,
    store: Arc<dyn JobStore>,
    shutdown: CancellationToken,
}

impl ServerContext {
    /// Creates the context for one server run.
    pub fn new(
        server_id: impl Into<Arc<str>>,
        store: Arc<dyn JobStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            store,
            shutdown,
        }
    }

    /// Identifier of the running server instance.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// The job store backing this server.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// The process-wide shutdown token.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Whether cooperative shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sleeps for `period`, waking early with [`TaskError::Canceled`] when
    /// shutdown is requested.
    pub async fn wait(&self, period: Duration) -> Result<(), TaskError> {
        tokio::select! {
            _ = time::sleep(period) => Ok(()),
            _ = self.shutdown.cancelled() => Err(TaskError::Canceled),
        }
    }
}
