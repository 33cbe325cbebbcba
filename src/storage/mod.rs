//! Storage seams: the queue, the job store, and activation.
//!
//! ## Contents
//! - [`Queue`] / [`Claim`] — blocking claim of the next job id with
//!   explicit settle (remove) or redeliver (requeue)
//! - [`JobStore`] — job state reads, guarded transitions, and server
//!   bookkeeping (announce, heartbeat, watchdog sweep)
//! - [`Activator`] / [`ActivatorScope`] — per-invocation resolution of the
//!   target callable
//! - [`MemoryStorage`] — in-process implementation of all three seams,
//!   for tests and embedded use

mod memory;
mod traits;

pub use memory::MemoryStorage;
pub use traits::{
    Activator, ActivatorScope, Claim, JobRecord, JobStore, Queue, ServerInfo,
};
