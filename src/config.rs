//! # Server configuration.
//!
//! Provides [`ServerConfig`] centralized settings for a
//! [`JobServer`](crate::JobServer) instance.
//!
//! ## Field semantics
//! - `server_name`: explicit server identity; `None` derives
//!   `hostname:uuid` (lowercase), falling back to a bare uuid
//! - `queues`: queue names the workers listen on, in priority order
//! - `worker_count`: number of concurrent worker loops
//! - `heartbeat_interval`: period of the server liveness heartbeat
//! - `server_check_interval` / `server_timeout`: watchdog sweep period and
//!   the heartbeat age after which a peer counts as dead
//! - `shutdown_grace`: maximum wait for tasks to stop after shutdown is
//!   requested before they are aborted
//! - `retry`: attempt bound and delay curve applied to every hosted task

use std::time::Duration;

use crate::server::{
    RetryPolicy, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_SERVER_CHECK_INTERVAL, DEFAULT_SERVER_TIMEOUT,
};

/// Configuration for one server instance.
///
/// All fields are public; [`ServerConfig::default`] matches the behavior a
/// production deployment expects out of the box.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Explicit server identity, or `None` to derive one from the host.
    pub server_name: Option<String>,

    /// Queues the workers claim from, in priority order.
    pub queues: Vec<String>,

    /// Number of concurrent worker loops.
    pub worker_count: usize,

    /// Period of the server liveness heartbeat.
    pub heartbeat_interval: Duration,

    /// Period of the stale-server watchdog sweep.
    pub server_check_interval: Duration,

    /// Heartbeat age after which a server counts as dead.
    pub server_timeout: Duration,

    /// Maximum wait for hosted tasks to stop after shutdown is requested.
    pub shutdown_grace: Duration,

    /// Retry policy applied to every hosted task.
    pub retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: None,
            queues: vec!["default".to_string()],
            worker_count: 20,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            server_check_interval: DEFAULT_SERVER_CHECK_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            shutdown_grace: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_deployment() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.queues, vec!["default".to_string()]);
        assert_eq!(cfg.worker_count, 20);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(cfg.server_timeout, Duration::from_secs(300));
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(15));
    }
}
