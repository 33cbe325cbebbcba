//! # jobvisor
//!
//! **Jobvisor** is a background-job execution engine for Rust.
//!
//! It pulls jobs from a shared work queue, runs each one through an
//! extensible pipeline of before/after and exception filters (blocking and
//! suspending implementations are treated uniformly), and records the
//! outcome as a terminal job state, while staying responsive to
//! cooperative cancellation at every suspension point.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   enqueue ──► [ Queue ]                    ┌─────────────────────────┐
//!                  │ claim                   │ JobServer (supervisor)  │
//!                  ▼                         │  - Heartbeat            │
//!        ┌──────────────────┐                │  - Watchdog             │
//!        │  Worker #1..N    │ ◄── spawned ── │  - Worker × N           │
//!        └──────┬───────────┘                │  each RepeatForever(    │
//!               │ perform                    │         Retry(task))    │
//!               ▼                            └─────────────────────────┘
//!        ┌──────────────────┐
//!        │   JobPerformer   │   before-hooks forward,
//!        │ (filter machine) │   after-hooks backward,
//!        └──────┬───────────┘   exception filters on unhandled failure
//!               │
//!               ▼
//!        ┌──────────────────┐
//!        │   CoreInvoker    │   activator scope → bind args → call
//!        └──────┬───────────┘
//!               ▼
//!        [ JobStore ]  Enqueued → Processing → Succeeded / Failed
//! ```
//!
//! ### Job lifecycle
//! ```text
//! Worker::execute:
//!   ├─► claim(queues)                      (blocks, shutdown-aware)
//!   ├─► transition to Processing           (1-minute bound, guarded)
//!   │       └─ rejected ─► forget the job
//!   ├─► JobPerformer::perform
//!   │       ├─ Ok(result)        ─► Succeeded { result, latency, duration }
//!   │       ├─ Aborted           ─► no terminal state (silently discard)
//!   │       ├─ ShutdownCanceled  ─► requeue the claim, rethrow
//!   │       └─ Perform { cause } ─► Failed { reason, cause }
//!   ├─► terminal transition                (guarded, from Processing only)
//!   └─► remove the claim
//!
//! any error on the way: requeue the claim and rethrow, so the Retry
//! wrapper re-executes the worker attempt with a growing randomized delay
//! ```
//!
//! ## Features
//! | Area            | Description                                           | Key types / traits                          |
//! |-----------------|-------------------------------------------------------|---------------------------------------------|
//! | **Filters**     | Hook before/after/exception phases of job execution.  | [`Filter`], [`PerformFilter`], [`AsyncPerformFilter`] |
//! | **Performing**  | Composable execution layers around the invocation.    | [`Performer`], [`JobPerformer`], [`CoreInvoker`] |
//! | **Jobs**        | Describe targets, arguments, and states.              | [`JobDescriptor`], [`JobCallable`], [`JobState`] |
//! | **Storage**     | Pluggable queue, job store, and activation seams.     | [`Queue`], [`JobStore`], [`Activator`]      |
//! | **Hosting**     | Worker loops, periodic tasks, supervised shutdown.    | [`JobServer`], [`Worker`], [`ServerTask`]   |
//! | **Resilience**  | Retry with randomized growing delays, infinite loops. | [`Retry`], [`RetryPolicy`], [`RepeatForever`] |
//! | **Errors**      | Typed errors per layer with strict propagation rules. | [`PerformError`], [`TaskError`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use jobvisor::{
//!     Argument, CallError, CoreInvoker, JobDescriptor, JobFn, JobPerformer, JobRegistry,
//!     JobServer, MemoryStorage, Parameter, ServerConfig, StaticFilterProvider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = MemoryStorage::new();
//!
//!     // Register the job targets.
//!     let registry = JobRegistry::new().with(
//!         "Mailer",
//!         "send",
//!         JobFn::arc(vec![Parameter::Recorded], |args: Vec<Argument>| async move {
//!             let to = args[0].as_recorded().unwrap_or_default().to_string();
//!             println!("sending to {to}");
//!             Ok::<_, CallError>(None)
//!         }),
//!     );
//!
//!     let performer = Arc::new(JobPerformer::new(
//!         Arc::new(StaticFilterProvider::empty()),
//!         Arc::new(CoreInvoker::new(Arc::new(registry))),
//!     ));
//!
//!     storage.enqueue(
//!         "default",
//!         JobDescriptor::new("Mailer", "send", vec!["alice".into()]),
//!     );
//!
//!     let server = JobServer::new(
//!         ServerConfig::default(),
//!         Arc::new(storage.clone()),
//!         Arc::new(storage),
//!         performer,
//!     );
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod filters;
mod jobs;
mod perform;
mod server;
mod storage;

// ---- Public re-exports ----

pub use config::ServerConfig;
pub use error::{
    BoxError, CallError, PerformError, RuntimeError, StorageError, TaskError,
};
pub use filters::{
    AsyncExceptionFilter, AsyncPerformFilter, ExceptionFilter, Filter, FilterProvider, FilterRef,
    PerformFilter, StaticFilterProvider,
};
pub use jobs::{
    Argument, JobCallable, JobDescriptor, JobFn, JobInstance, JobRegistry, JobState, Parameter,
};
pub use perform::{
    CancellationHandle, CoreInvoker, ExceptionContext, JobPerformer, PerformContext,
    PerformedContext, PerformingContext, Performer,
};
pub use server::{
    Heartbeat, JobServer, RepeatForever, Retry, RetryPolicy, ServerContext, ServerTask,
    ServerTaskRef, Watchdog, Worker,
};
pub use storage::{
    Activator, ActivatorScope, Claim, JobRecord, JobStore, MemoryStorage, Queue, ServerInfo,
};
