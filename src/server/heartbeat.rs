//! # Server liveness heartbeat.
//!
//! Refreshes the server's liveness timestamp in the job store on a fixed
//! interval so the watchdog on other instances does not evict it.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TaskError;
use crate::server::{ServerContext, ServerTask};

/// Default interval between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic server heartbeat task.
pub struct Heartbeat {
    interval: Duration,
}

impl Heartbeat {
    /// Creates a heartbeat task with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

#[async_trait]
impl ServerTask for Heartbeat {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError> {
        ctx.store().heartbeat(ctx.server_id()).await?;
        debug!(server = ctx.server_id(), "heartbeat sent");
        ctx.wait(self.interval).await
    }
}
