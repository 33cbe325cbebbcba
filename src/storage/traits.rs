//! # Storage and activation contracts.
//!
//! Everything the engine needs from the outside world lives behind these
//! traits. Implementations must be safe to share across workers.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{StorageError, TaskError};
use crate::jobs::{JobCallable, JobDescriptor, JobState};
use crate::perform::PerformContext;

/// A job as recorded in storage: what to run and when it was enqueued.
#[derive(Clone, Debug)]
pub struct JobRecord {
    /// The target callable and its recorded arguments.
    pub descriptor: JobDescriptor,
    /// When the job was enqueued.
    pub created_at: SystemTime,
}

/// Metadata announced for a running server instance.
#[derive(Clone, Debug)]
pub struct ServerInfo {
    /// Queues the server's workers listen on.
    pub queues: Vec<String>,
    /// Number of worker tasks the server runs.
    pub worker_count: usize,
}

/// # Source of claimable jobs.
#[async_trait]
pub trait Queue: Send + Sync + 'static {
    /// Claims the next job from any of `queues`, blocking until one is
    /// available or `shutdown` fires (then [`TaskError::Canceled`]).
    ///
    /// The claim stays invisible to other workers until settled.
    async fn claim(
        &self,
        queues: &[String],
        shutdown: &CancellationToken,
    ) -> Result<Box<dyn Claim>, TaskError>;
}

/// # A claimed job awaiting settlement.
///
/// Consuming methods guarantee the claim is settled at most once. Dropping
/// a claim without settling leaves redelivery to the implementation's
/// invisibility timeout, if it has one.
#[async_trait]
pub trait Claim: Send + Sync {
    /// Storage identifier of the claimed job.
    fn job_id(&self) -> &str;

    /// Settles the claim: the job will not be delivered again.
    async fn remove(self: Box<Self>) -> Result<(), StorageError>;

    /// Releases the claim for redelivery to another worker.
    async fn requeue(self: Box<Self>) -> Result<(), StorageError>;
}

/// # Job state reads, guarded transitions, and server bookkeeping.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Current state of the job, or `None` when unknown.
    async fn read_state(&self, job_id: &str) -> Result<Option<JobState>, StorageError>;

    /// Applies `to` only when the current state name is one of
    /// `allowed_from`. Returns the applied state, or `None` when the
    /// precondition failed (including an unknown job).
    async fn transition(
        &self,
        job_id: &str,
        to: JobState,
        allowed_from: &[&str],
    ) -> Result<Option<JobState>, StorageError>;

    /// Reads the job's record, or `None` when the job is unknown.
    async fn read_job(&self, job_id: &str) -> Result<Option<JobRecord>, StorageError>;

    /// Registers a server instance and its metadata.
    async fn announce_server(
        &self,
        server_id: &str,
        info: &ServerInfo,
    ) -> Result<(), StorageError>;

    /// Removes a server instance's registration.
    async fn remove_server(&self, server_id: &str) -> Result<(), StorageError>;

    /// Refreshes the server's liveness timestamp.
    async fn heartbeat(&self, server_id: &str) -> Result<(), StorageError>;

    /// Removes servers whose last heartbeat is older than `timeout`.
    /// Returns the number of servers removed.
    async fn remove_timed_out_servers(
        &self,
        timeout: std::time::Duration,
    ) -> Result<usize, StorageError>;
}

/// # Per-invocation resolution root.
///
/// A scope is opened for every invocation and dropped on every exit path,
/// successful or not.
pub trait Activator: Send + Sync + 'static {
    /// Opens a resolution scope for one invocation.
    fn begin_scope(&self, context: &PerformContext) -> Box<dyn ActivatorScope>;
}

/// A live resolution scope. Dropping it releases whatever the activation
/// strategy holds for the invocation.
pub trait ActivatorScope: Send {
    /// Resolves the callable for `descriptor`, or `None` when the target
    /// is unknown.
    fn resolve(&self, descriptor: &JobDescriptor) -> Option<Arc<dyn JobCallable>>;
}
