//! # Execution contexts and per-job cancellation.
//!
//! Each pipeline phase hands filters its own view:
//!
//! - [`PerformContext`] — the immutable core: job instance + cancellation
//! - [`PerformingContext`] — before-phase; filters may cancel the run
//! - [`PerformedContext`] — after-phase; carries result, the canceled
//!   flag, and a pending exception with its handled marker
//! - [`ExceptionContext`] — exception-phase; filters may mark the failure
//!   handled
//!
//! [`CancellationHandle`] combines the process-wide shutdown token with
//! storage-backed abort detection: a checkpoint re-reads the job state and
//! fails with [`PerformError::Aborted`] when the job is no longer
//! `Processing` under this server and worker.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::PerformError;
use crate::jobs::{JobInstance, JobState};
use crate::storage::JobStore;

/// Per-job cooperative cancellation handle.
///
/// Cheap to clone; all clones observe the same shutdown token and job.
#[derive(Clone)]
pub struct CancellationHandle {
    job_id: Arc<str>,
    server_id: Arc<str>,
    worker_id: Arc<str>,
    store: Arc<dyn JobStore>,
    shutdown: CancellationToken,
}

impl CancellationHandle {
    /// Creates a handle bound to one job under one server/worker pair.
    pub fn new(
        store: Arc<dyn JobStore>,
        job_id: impl Into<Arc<str>>,
        server_id: impl Into<Arc<str>>,
        worker_id: impl Into<Arc<str>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            server_id: server_id.into(),
            worker_id: worker_id.into(),
            store,
            shutdown,
        }
    }

    /// The process-wide shutdown token, for use in `select!` arms.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Whether cooperative shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Verifies the attempt may continue.
    ///
    /// Fails with [`PerformError::ShutdownCanceled`] when shutdown is in
    /// progress, and with [`PerformError::Aborted`] when the job is no
    /// longer `Processing` under this server and worker. Comparison of the
    /// owner ids ignores ASCII case.
    pub async fn checkpoint(&self) -> Result<(), PerformError> {
        if self.shutdown.is_cancelled() {
            return Err(PerformError::ShutdownCanceled);
        }
        let state = self
            .store
            .read_state(&self.job_id)
            .await
            .map_err(PerformError::perform)?;
        match state {
            Some(JobState::Processing {
                server_id,
                worker_id,
            }) if server_id.eq_ignore_ascii_case(&self.server_id)
                && worker_id.eq_ignore_ascii_case(&self.worker_id) =>
            {
                Ok(())
            }
            _ => Err(PerformError::Aborted),
        }
    }
}

/// Immutable core of a performance attempt: the claimed job plus its
/// cancellation handle. All other contexts are views derived from it.
#[derive(Clone)]
pub struct PerformContext {
    job: JobInstance,
    cancellation: CancellationHandle,
}

impl PerformContext {
    /// Creates the context for one attempt.
    pub fn new(job: JobInstance, cancellation: CancellationHandle) -> Self {
        Self { job, cancellation }
    }

    /// The job being performed.
    pub fn job(&self) -> &JobInstance {
        &self.job
    }

    /// The attempt's cancellation handle.
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }
}

/// Before-phase view handed to [`PerformFilter`](crate::PerformFilter)
/// hooks. A filter may [`cancel`](Self::cancel) the run; later before-hooks
/// and the job body are then skipped and earlier filters are rolled back.
pub struct PerformingContext {
    job: JobInstance,
    cancellation: CancellationHandle,
    canceled: bool,
}

impl PerformingContext {
    pub(crate) fn new(context: &PerformContext) -> Self {
        Self {
            job: context.job.clone(),
            cancellation: context.cancellation.clone(),
            canceled: false,
        }
    }

    /// The job being performed.
    pub fn job(&self) -> &JobInstance {
        &self.job
    }

    /// The attempt's cancellation handle.
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }

    /// Whether a filter has canceled the run.
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Cancels the run: the job body will not execute and earlier filters
    /// see a canceled after-phase.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }
}

/// After-phase view: the outcome of the attempt as seen by
/// [`PerformFilter`](crate::PerformFilter) after-hooks.
pub struct PerformedContext {
    job: JobInstance,
    result: Option<String>,
    canceled: bool,
    exception: Option<PerformError>,
    exception_handled: bool,
}

impl PerformedContext {
    pub(crate) fn completed(job: JobInstance, result: Option<String>) -> Self {
        Self {
            job,
            result,
            canceled: false,
            exception: None,
            exception_handled: false,
        }
    }

    pub(crate) fn canceled(job: JobInstance) -> Self {
        Self {
            job,
            result: None,
            canceled: true,
            exception: None,
            exception_handled: false,
        }
    }

    pub(crate) fn faulted(job: JobInstance, exception: PerformError) -> Self {
        Self {
            job,
            result: None,
            canceled: false,
            exception: Some(exception),
            exception_handled: false,
        }
    }

    pub(crate) fn take_exception(&mut self) -> Option<PerformError> {
        self.exception.take()
    }

    pub(crate) fn into_result(self) -> Option<String> {
        self.result
    }

    /// The job that was performed.
    pub fn job(&self) -> &JobInstance {
        &self.job
    }

    /// The result string returned by the job body, if any.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Whether the run was canceled by a before-hook.
    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// The pending exception, when the body or a filter failed.
    pub fn exception(&self) -> Option<&PerformError> {
        self.exception.as_ref()
    }

    /// Whether the pending exception has been marked handled.
    pub fn is_exception_handled(&self) -> bool {
        self.exception_handled
    }

    /// Marks the pending exception handled (or un-handled). A handled
    /// exception is not rethrown and not shown to exception filters.
    pub fn set_exception_handled(&mut self, handled: bool) {
        self.exception_handled = handled;
    }
}

/// Exception-phase view handed to
/// [`ExceptionFilter`](crate::ExceptionFilter) hooks.
pub struct ExceptionContext {
    job: JobInstance,
    exception: PerformError,
    exception_handled: bool,
}

impl ExceptionContext {
    pub(crate) fn new(job: JobInstance, exception: PerformError) -> Self {
        Self {
            job,
            exception,
            exception_handled: false,
        }
    }

    pub(crate) fn into_error(self) -> PerformError {
        self.exception
    }

    /// The job whose performance failed.
    pub fn job(&self) -> &JobInstance {
        &self.job
    }

    /// The failure under consideration.
    pub fn exception(&self) -> &PerformError {
        &self.exception
    }

    /// Whether a filter has marked the failure handled.
    pub fn is_exception_handled(&self) -> bool {
        self.exception_handled
    }

    /// Marks the failure handled: it will not be rethrown and the attempt
    /// ends without a `Failed` state.
    pub fn set_exception_handled(&mut self, handled: bool) {
        self.exception_handled = handled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::SystemTime;

    use crate::jobs::JobDescriptor;
    use crate::storage::MemoryStorage;

    fn job() -> JobInstance {
        JobInstance::new(
            "job-1",
            JobDescriptor::new("Mailer", "send", vec![]),
            SystemTime::now(),
        )
    }

    fn handle(store: Arc<MemoryStorage>, shutdown: CancellationToken) -> CancellationHandle {
        CancellationHandle::new(store, "job-1", "server-1", "worker-1", shutdown)
    }

    #[tokio::test]
    async fn test_checkpoint_passes_while_processing_under_owner() {
        let store = Arc::new(MemoryStorage::new());
        store.insert_processing("job-1", "Mailer", "send", "server-1", "worker-1");

        let handle = handle(store, CancellationToken::new());
        handle.checkpoint().await.expect("owner matches");
    }

    #[tokio::test]
    async fn test_checkpoint_aborts_on_missing_or_foreign_job() {
        let store = Arc::new(MemoryStorage::new());
        let handle = handle(store.clone(), CancellationToken::new());
        assert!(matches!(
            handle.checkpoint().await,
            Err(PerformError::Aborted)
        ));

        store.insert_processing("job-1", "Mailer", "send", "server-2", "worker-9");
        assert!(matches!(
            handle.checkpoint().await,
            Err(PerformError::Aborted)
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_owner_comparison_ignores_case() {
        let store = Arc::new(MemoryStorage::new());
        store.insert_processing("job-1", "Mailer", "send", "SERVER-1", "WORKER-1");

        let handle = handle(store, CancellationToken::new());
        handle.checkpoint().await.expect("case must not matter");
    }

    #[tokio::test]
    async fn test_checkpoint_prefers_shutdown_over_abort() {
        let store = Arc::new(MemoryStorage::new());
        let token = CancellationToken::new();
        token.cancel();

        let handle = handle(store, token);
        assert!(matches!(
            handle.checkpoint().await,
            Err(PerformError::ShutdownCanceled)
        ));
    }

    #[test]
    fn test_canceled_context_carries_no_result() {
        let ctx = PerformedContext::canceled(job());
        assert!(ctx.is_canceled());
        assert!(ctx.result().is_none());
        assert!(ctx.exception().is_none());
    }

    #[test]
    fn test_faulted_context_releases_its_exception_once() {
        let mut ctx = PerformedContext::faulted(job(), PerformError::perform("boom"));
        assert!(ctx.exception().is_some());
        assert!(ctx.take_exception().is_some());
        assert!(ctx.take_exception().is_none());
    }
}
