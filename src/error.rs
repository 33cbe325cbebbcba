//! Error types used by the jobvisor runtime and job execution.
//!
//! The taxonomy follows the propagation rules of the engine:
//!
//! - [`PerformError`] — outcome of one job performance attempt. Only the
//!   [`PerformError::Perform`] variant is ever delivered to exception
//!   filters; `Aborted` and `ShutdownCanceled` bypass them.
//! - [`CallError`] — raised by job callables; classified by the invoker.
//! - [`StorageError`] — infrastructure faults from the queue or job store;
//!   retried with backoff by the [`Retry`](crate::Retry) wrapper.
//! - [`TaskError`] — errors surfaced by background server tasks to the
//!   resilience wrappers. `Canceled` is never retried.
//! - [`RuntimeError`] — failures of the server runtime itself.
//!
//! All types provide `as_label` for logs/metrics in addition to `Display`.

use std::time::Duration;

use thiserror::Error;

/// Boxed error cause, preserved through wrapping so filters and terminal
/// states can observe the original failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Outcome of a single job performance attempt.
///
/// Produced by [`Performer::perform`](crate::Performer::perform) and by the
/// cancellation checkpoints inside the filter pipeline.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PerformError {
    /// The job's ownership changed externally (state no longer `Processing`
    /// under this worker). The attempt must be discarded, never retried,
    /// and never shown to exception filters.
    #[error("job aborted by a state change")]
    Aborted,

    /// Cooperative shutdown is in progress. Rethrown verbatim, never
    /// retried, never shown to exception filters; causes claim redelivery.
    #[error("shutdown requested during job performance")]
    ShutdownCanceled,

    /// The job body or one of its filters failed. Delivered to exception
    /// filters; if unhandled there, recorded as a `Failed` terminal state.
    #[error("an exception occurred during performance of the job")]
    Perform {
        /// The original failure, unwrapped to the innermost cause.
        #[source]
        cause: BoxError,
    },
}

impl PerformError {
    /// Wraps an arbitrary failure into the [`PerformError::Perform`] variant.
    pub fn perform(cause: impl Into<BoxError>) -> Self {
        PerformError::Perform {
            cause: cause.into(),
        }
    }

    /// Returns `true` for the distinguished conditions (`Aborted`,
    /// `ShutdownCanceled`) that bypass exception filters entirely.
    pub fn is_distinguished(&self) -> bool {
        matches!(self, PerformError::Aborted | PerformError::ShutdownCanceled)
    }

    /// The original cause, when this is a [`PerformError::Perform`].
    pub fn cause(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PerformError::Perform { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PerformError::Aborted => "job_aborted",
            PerformError::ShutdownCanceled => "shutdown_canceled",
            PerformError::Perform { .. } => "job_failed",
        }
    }
}

/// # Errors raised by job callables.
///
/// Job bodies return `CallError`; the invoker classifies each variant into
/// a [`PerformError`] (see [`CoreInvoker`](crate::CoreInvoker)).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallError {
    /// The job observed cooperative cancellation and stopped early.
    #[error("job canceled")]
    Canceled,

    /// The job observed the aborted condition via its cancellation handle.
    #[error("job aborted")]
    Aborted,

    /// Any other failure of the job body.
    #[error("job execution failed")]
    Failed {
        #[source]
        cause: BoxError,
    },
}

impl CallError {
    /// Wraps an arbitrary failure into the [`CallError::Failed`] variant.
    pub fn failed(cause: impl Into<BoxError>) -> Self {
        CallError::Failed {
            cause: cause.into(),
        }
    }
}

/// # Infrastructure fault from the queue or the job store.
///
/// Never passed through the filter pipeline; propagates to the resilience
/// wrappers, which retry with backoff unless shutdown is active.
#[derive(Error, Debug)]
#[error("storage operation failed: {message}")]
pub struct StorageError {
    /// Human-readable description of the fault.
    pub message: String,
}

impl StorageError {
    /// Creates a new storage error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// # Errors surfaced by background server tasks.
///
/// A [`ServerTask`](crate::ServerTask) attempt ends with one of these; the
/// [`Retry`](crate::Retry) wrapper decides whether to re-execute.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Shutdown requested; the task must not be retried.
    #[error("shutdown requested")]
    Canceled,

    /// The queue or job store failed; safe to retry.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Any other task failure; safe to retry.
    #[error("{0}")]
    Other(String),
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Storage(_) => "task_storage_fault",
            TaskError::Other(_) => "task_failed",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `false` only for [`TaskError::Canceled`]: a shutdown-triggered
    /// cancellation must propagate immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TaskError::Canceled)
    }
}

/// # Errors produced by the server runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some tasks remained stuck.
    #[error("shutdown grace {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not stop in time.
        stuck: Vec<String>,
    },

    /// Server bookkeeping (announce/remove) failed against storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Storage(_) => "runtime_storage_fault",
        }
    }
}

/// Renders an error together with its source chain, outermost first.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_conditions() {
        assert!(PerformError::Aborted.is_distinguished());
        assert!(PerformError::ShutdownCanceled.is_distinguished());
        assert!(!PerformError::perform("boom").is_distinguished());
    }

    #[test]
    fn test_perform_error_preserves_cause() {
        let err = PerformError::perform(StorageError::new("disk on fire"));
        let cause = err.cause().expect("cause must be preserved");
        assert!(cause.to_string().contains("disk on fire"));
    }

    #[test]
    fn test_canceled_is_not_retryable() {
        assert!(!TaskError::Canceled.is_retryable());
        assert!(TaskError::Storage(StorageError::new("x")).is_retryable());
        assert!(TaskError::Other("x".into()).is_retryable());
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let err = PerformError::perform(StorageError::new("inner fault"));
        let chain = error_chain(&err);
        assert!(chain.contains("an exception occurred"));
        assert!(chain.contains("inner fault"));
    }
}
