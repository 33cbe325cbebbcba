//! # The worker loop body.
//!
//! One [`Worker`] attempt claims a job, drives the performer against it,
//! and commits the terminal state:
//!
//! ```text
//! claim ──► Processing transition ──► perform ──► terminal transition ──► remove claim
//!   │           │ (wrong state)          │ (aborted)        │
//!   │           ▼                        ▼                  ▼
//!   │       forget job              no terminal        Succeeded / Failed
//!   │
//!   └── any error on the way: requeue the claim, rethrow to the retry layer
//! ```
//!
//! ## Rules
//! - The claim is settled exactly once: removed after the attempt
//!   completes, requeued on every error path.
//! - The initial `Processing` transition is bounded by a one minute
//!   timeout; an expired or rejected transition forgets the job unless
//!   shutdown explains it.
//! - A job aborted externally yields no terminal state at all.
//! - Shutdown-triggered cancellation propagates so the claim is
//!   redelivered after restart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{error_chain, PerformError, TaskError};
use crate::jobs::{JobInstance, JobState};
use crate::perform::{CancellationHandle, PerformContext, Performer};
use crate::server::{ServerContext, ServerTask};
use crate::storage::Queue;

/// Bound on the initial `Processing` transition of a claimed job.
const JOB_INIT_TIMEOUT: Duration = Duration::from_secs(60);

const FAILED_REASON: &str = "an exception occurred during performance of the job";

/// Claims jobs from a set of queues and performs them, one at a time.
pub struct Worker {
    queues: Vec<String>,
    queue: Arc<dyn Queue>,
    performer: Arc<dyn Performer>,
    worker_id: String,
    name: String,
}

impl Worker {
    /// Creates a worker listening on `queues` with a fresh identity.
    pub fn new(queues: Vec<String>, queue: Arc<dyn Queue>, performer: Arc<dyn Performer>) -> Self {
        let worker_id = Uuid::new_v4().to_string();
        let name = format!("Worker #{}", &worker_id[..8]);
        Self {
            queues,
            queue,
            performer,
            worker_id,
            name,
        }
    }

    /// Moves the claimed job to `Processing` and performs it. `Ok` means
    /// the attempt is settled and the claim may be removed; `Err` means
    /// the claim must be redelivered.
    async fn process(&self, ctx: &ServerContext, job_id: &str) -> Result<(), TaskError> {
        let processing = JobState::Processing {
            server_id: ctx.server_id().to_string(),
            worker_id: self.worker_id.clone(),
        };
        let transition = ctx.store().transition(
            job_id,
            processing,
            &[JobState::ENQUEUED, JobState::PROCESSING],
        );
        let applied = match time::timeout(JOB_INIT_TIMEOUT, transition).await {
            Ok(applied) => applied?,
            Err(_elapsed) => None,
        };

        if applied.is_none() {
            if ctx.is_shutdown_requested() {
                return Err(TaskError::Canceled);
            }
            // Someone else owns the job or it reached a terminal state
            // already; forget it.
            debug!(job_id, worker = %self.name, "job is not in a processable state; skipping");
            return Ok(());
        }

        if let Some(terminal) = self.perform_job(ctx, job_id).await? {
            // The transition may be rejected when the job was aborted in
            // the meantime; the outcome is discarded either way.
            ctx.store()
                .transition(job_id, terminal, &[JobState::PROCESSING])
                .await?;
        }
        Ok(())
    }

    /// Performs the job and computes its terminal state. `None` means the
    /// attempt must leave no terminal state (unknown or aborted job).
    async fn perform_job(
        &self,
        ctx: &ServerContext,
        job_id: &str,
    ) -> Result<Option<JobState>, TaskError> {
        let record = match ctx.store().read_job(job_id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let job = JobInstance::new(job_id, record.descriptor, record.created_at);
        let cancellation = CancellationHandle::new(
            ctx.store().clone(),
            job_id,
            ctx.server_id(),
            self.worker_id.as_str(),
            ctx.shutdown().clone(),
        );
        let context = PerformContext::new(job, cancellation);

        let latency_ms = record
            .created_at
            .elapsed()
            .unwrap_or_default()
            .as_millis() as u64;
        let started = Instant::now();

        match self.performer.perform(&context).await {
            Ok(result) => Ok(Some(JobState::Succeeded {
                result,
                latency_ms,
                duration_ms: started.elapsed().as_millis() as u64,
            })),
            Err(PerformError::Aborted) => {
                debug!(job_id, worker = %self.name, "job aborted; discarding the attempt");
                Ok(None)
            }
            Err(PerformError::ShutdownCanceled) if ctx.is_shutdown_requested() => {
                Err(TaskError::Canceled)
            }
            Err(err) => Ok(Some(JobState::Failed {
                reason: FAILED_REASON.to_string(),
                cause: error_chain(&err),
            })),
        }
    }
}

#[async_trait]
impl ServerTask for Worker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError> {
        let claim = self.queue.claim(&self.queues, ctx.shutdown()).await?;
        if ctx.is_shutdown_requested() {
            claim.requeue().await?;
            return Err(TaskError::Canceled);
        }

        let job_id = claim.job_id().to_string();
        match self.process(ctx, &job_id).await {
            Ok(()) => {
                claim.remove().await?;
                Ok(())
            }
            Err(err) => {
                if ctx.is_shutdown_requested() {
                    info!(job_id, worker = %self.name, "requeueing the job for shutdown");
                } else {
                    debug!(job_id, worker = %self.name, %err, "requeueing the job after a failed attempt");
                }
                claim.requeue().await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_util::sync::CancellationToken;

    use crate::error::{CallError, StorageError};
    use crate::jobs::{Argument, JobDescriptor, JobFn, JobRegistry, Parameter};
    use crate::perform::CoreInvoker;
    use crate::storage::{JobRecord, JobStore, MemoryStorage, ServerInfo};

    fn worker(storage: &MemoryStorage, registry: JobRegistry) -> Worker {
        Worker::new(
            vec!["default".to_string()],
            Arc::new(storage.clone()),
            Arc::new(CoreInvoker::new(Arc::new(registry))),
        )
    }

    fn context(storage: &MemoryStorage, shutdown: CancellationToken) -> ServerContext {
        ServerContext::new("server-1", Arc::new(storage.clone()), shutdown)
    }

    #[tokio::test]
    async fn test_successful_job_reaches_succeeded_and_leaves_the_queue() {
        let storage = MemoryStorage::new();
        let registry = JobRegistry::new().with(
            "Mailer",
            "send",
            JobFn::arc(vec![Parameter::Recorded], |args: Vec<Argument>| async move {
                let to = args[0].as_recorded().unwrap_or_default().to_string();
                Ok::<_, CallError>(Some(format!("sent to {to}")))
            }),
        );
        let job_id = storage.enqueue(
            "default",
            JobDescriptor::new("Mailer", "send", vec!["alice".into()]),
        );

        let worker = worker(&storage, registry);
        worker
            .execute(&context(&storage, CancellationToken::new()))
            .await
            .expect("attempt succeeds");

        match storage.read_state(&job_id).await.expect("read") {
            Some(JobState::Succeeded { result, .. }) => {
                assert_eq!(result.as_deref(), Some("sent to alice"));
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_job_is_recorded_with_its_cause() {
        let storage = MemoryStorage::new();
        let registry = JobRegistry::new().with(
            "Mailer",
            "send",
            JobFn::arc(vec![], |_args| async {
                Err(CallError::failed("smtp unreachable"))
            }),
        );
        let job_id = storage.enqueue("default", JobDescriptor::new("Mailer", "send", vec![]));

        let worker = worker(&storage, registry);
        worker
            .execute(&context(&storage, CancellationToken::new()))
            .await
            .expect("the attempt settles even though the job failed");

        match storage.read_state(&job_id).await.expect("read") {
            Some(JobState::Failed { reason, cause }) => {
                assert_eq!(reason, FAILED_REASON);
                assert!(cause.contains("smtp unreachable"));
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_aborted_job_leaves_no_terminal_state() {
        let storage = MemoryStorage::new();
        let registry = JobRegistry::new().with(
            "Mailer",
            "send",
            JobFn::arc(vec![], |_args| async { Err(CallError::Aborted) }),
        );
        let job_id = storage.enqueue("default", JobDescriptor::new("Mailer", "send", vec![]));

        let worker = worker(&storage, registry);
        worker
            .execute(&context(&storage, CancellationToken::new()))
            .await
            .expect("silently discarded");

        // The job stays in Processing, abandoned to the watchdog.
        assert!(matches!(
            storage.read_state(&job_id).await.expect("read"),
            Some(JobState::Processing { .. })
        ));
    }

    #[tokio::test]
    async fn test_terminal_job_is_forgotten_without_an_error() {
        let storage = MemoryStorage::new();
        let job_id = storage.enqueue("default", JobDescriptor::new("Mailer", "send", vec![]));
        storage
            .transition(
                &job_id,
                JobState::Failed {
                    reason: "earlier attempt".into(),
                    cause: "boom".into(),
                },
                &[JobState::ENQUEUED],
            )
            .await
            .expect("seed terminal state");

        let worker = worker(&storage, JobRegistry::new());
        worker
            .execute(&context(&storage, CancellationToken::new()))
            .await
            .expect("skipped without error");
    }

    #[tokio::test]
    async fn test_shutdown_during_claim_cancels_the_attempt() {
        let storage = MemoryStorage::new();
        let token = CancellationToken::new();
        token.cancel();

        let worker = worker(&storage, JobRegistry::new());
        assert!(matches!(
            worker.execute(&context(&storage, token)).await,
            Err(TaskError::Canceled)
        ));
    }

    /// Store whose `Processing` transition is overtaken by shutdown: the
    /// token is canceled while the transition is in flight and the
    /// precondition is reported as failed.
    struct CancelingStore {
        shutdown: CancellationToken,
    }

    #[async_trait]
    impl JobStore for CancelingStore {
        async fn read_state(&self, _job_id: &str) -> Result<Option<JobState>, StorageError> {
            Ok(None)
        }

        async fn transition(
            &self,
            _job_id: &str,
            _to: JobState,
            _allowed_from: &[&str],
        ) -> Result<Option<JobState>, StorageError> {
            self.shutdown.cancel();
            Ok(None)
        }

        async fn read_job(&self, _job_id: &str) -> Result<Option<JobRecord>, StorageError> {
            Ok(None)
        }

        async fn announce_server(
            &self,
            _server_id: &str,
            _info: &ServerInfo,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn remove_server(&self, _server_id: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn heartbeat(&self, _server_id: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn remove_timed_out_servers(
            &self,
            _timeout: Duration,
        ) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_rejected_processing_transition_under_shutdown_requeues_the_claim() {
        let storage = MemoryStorage::new();
        let job_id = storage.enqueue("default", JobDescriptor::new("Mailer", "send", vec![]));

        let token = CancellationToken::new();
        let ctx = ServerContext::new(
            "server-1",
            Arc::new(CancelingStore {
                shutdown: token.clone(),
            }),
            token,
        );

        let worker = worker(&storage, JobRegistry::new());
        assert!(matches!(
            worker.execute(&ctx).await,
            Err(TaskError::Canceled)
        ));

        // The claim went back to the queue for redelivery after restart.
        let reclaim = storage
            .claim(&["default".to_string()], &CancellationToken::new())
            .await
            .expect("redelivered");
        assert_eq!(reclaim.job_id(), job_id);
    }
}
