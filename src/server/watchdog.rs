//! # Stale server eviction.
//!
//! Sweeps the job store periodically and removes servers whose heartbeat
//! is older than the configured timeout. Jobs claimed by evicted servers
//! become abortable: their cancellation checkpoints no longer see a
//! matching `Processing` owner.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::TaskError;
use crate::server::{ServerContext, ServerTask};

/// Default interval between sweeps.
pub const DEFAULT_SERVER_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default heartbeat age after which a server counts as dead.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Periodic stale-server sweep task.
pub struct Watchdog {
    check_interval: Duration,
    server_timeout: Duration,
}

impl Watchdog {
    /// Creates a watchdog sweeping every `check_interval`, evicting servers
    /// silent for longer than `server_timeout`.
    pub fn new(check_interval: Duration, server_timeout: Duration) -> Self {
        Self {
            check_interval,
            server_timeout,
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_CHECK_INTERVAL, DEFAULT_SERVER_TIMEOUT)
    }
}

#[async_trait]
impl ServerTask for Watchdog {
    fn name(&self) -> &str {
        "server-watchdog"
    }

    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError> {
        let removed = ctx
            .store()
            .remove_timed_out_servers(self.server_timeout)
            .await?;
        if removed > 0 {
            info!(removed, "removed timed out servers");
        }
        ctx.wait(self.check_interval).await
    }
}
