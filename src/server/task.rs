//! # The background server task contract.
//!
//! Everything the server hosts long-term (worker loops, heartbeat,
//! watchdog) implements [`ServerTask`]: one `execute` call is one attempt.
//! The resilience wrappers ([`Retry`](crate::Retry),
//! [`RepeatForever`](crate::RepeatForever)) are themselves server tasks, so
//! composition is uniform.
//!
//! ## Rules
//! - `execute` must return [`TaskError::Canceled`] promptly when the
//!   context's shutdown token fires; it is never retried.
//! - Any other error means the attempt failed and may be re-executed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::server::ServerContext;

/// One long-running concern of the server, executed attempt by attempt.
#[async_trait]
pub trait ServerTask: Send + Sync + 'static {
    /// Display name, used in logs and in shutdown diagnostics.
    fn name(&self) -> &str;

    /// Runs one attempt of the task.
    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError>;
}

/// Shared handle to a server task.
pub type ServerTaskRef = Arc<dyn ServerTask>;
