//! The hosting side: worker loops, periodic tasks, resilience wrappers,
//! and the process supervisor.
//!
//! ## Contents
//! - [`ServerTask`] / [`ServerContext`] — the background task contract and
//!   its shared context
//! - [`Worker`] — claims and performs jobs
//! - [`Heartbeat`], [`Watchdog`] — server liveness and stale-peer eviction
//! - [`Retry`], [`RetryPolicy`], [`RepeatForever`] — resilience wrappers
//! - [`JobServer`] — spawns and supervises all of the above

mod context;
mod heartbeat;
mod repeat;
mod retry;
mod shutdown;
mod supervisor;
mod task;
mod watchdog;
mod worker;

pub use context::ServerContext;
pub use heartbeat::{Heartbeat, DEFAULT_HEARTBEAT_INTERVAL};
pub use repeat::RepeatForever;
pub use retry::{Retry, RetryPolicy};
pub use supervisor::JobServer;
pub use task::{ServerTask, ServerTaskRef};
pub use watchdog::{Watchdog, DEFAULT_SERVER_CHECK_INTERVAL, DEFAULT_SERVER_TIMEOUT};
pub use worker::Worker;
