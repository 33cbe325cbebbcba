//! # Job identity: descriptors, instances, and argument binding.
//!
//! A [`JobDescriptor`] names the target callable (type + method) and carries
//! the recorded positional arguments. A [`JobInstance`] is one claimed job:
//! descriptor plus id and creation timestamp, immutable for the lifetime of
//! an execution attempt.
//!
//! [`Parameter`] and [`Argument`] describe how recorded arguments map onto a
//! callable's declared parameters: well-known parameter kinds are substituted
//! from the execution context instead of the recorded list.

use std::fmt;
use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::perform::CancellationHandle;

/// Identity of a job target plus its recorded positional arguments.
///
/// Immutable once the job is read from storage.
///
/// ## Invariant
/// The recorded argument count must equal the target callable's declared
/// parameter count; the invoker rejects mismatches before invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobDescriptor {
    type_name: String,
    method: String,
    args: Vec<String>,
}

impl JobDescriptor {
    /// Creates a new descriptor.
    pub fn new(
        type_name: impl Into<String>,
        method: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            args,
        }
    }

    /// Name of the target type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the target method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Recorded positional arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method)
    }
}

/// One claimed job: id, descriptor, and creation timestamp.
///
/// Created when a job is claimed from the queue; never mutated. Owned by
/// the pipeline for the duration of one execution attempt.
#[derive(Clone, Debug)]
pub struct JobInstance {
    id: String,
    descriptor: JobDescriptor,
    created_at: SystemTime,
}

impl JobInstance {
    /// Creates a new job instance.
    pub fn new(id: impl Into<String>, descriptor: JobDescriptor, created_at: SystemTime) -> Self {
        Self {
            id: id.into(),
            descriptor,
            created_at,
        }
    }

    /// Storage identifier of the job.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The job's descriptor.
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// When the job was created (enqueued).
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Declared parameter of a job callable, positional.
///
/// `Recorded` slots are filled from the descriptor's argument list; the
/// other kinds are substituted from the execution context (the well-known
/// parameter table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parameter {
    /// Bound from the recorded argument at the same position.
    Recorded,
    /// Substituted with the job's [`CancellationHandle`].
    Cancellation,
    /// Substituted with the process-wide shutdown token.
    Shutdown,
    /// Substituted with a snapshot of the job instance.
    Context,
}

/// A bound argument passed to a job callable, matching its [`Parameter`]
/// declaration position by position.
#[derive(Clone)]
pub enum Argument {
    /// A recorded argument from the descriptor.
    Recorded(String),
    /// The job's cancellation handle (abort check + shutdown signal).
    Cancellation(CancellationHandle),
    /// The process-wide shutdown token.
    Shutdown(CancellationToken),
    /// Snapshot of the job instance being performed.
    Context(JobInstance),
}

impl Argument {
    /// The recorded value, when this argument was bound from the descriptor.
    pub fn as_recorded(&self) -> Option<&str> {
        match self {
            Argument::Recorded(value) => Some(value),
            _ => None,
        }
    }

    /// The cancellation handle, when substituted.
    pub fn as_cancellation(&self) -> Option<&CancellationHandle> {
        match self {
            Argument::Cancellation(handle) => Some(handle),
            _ => None,
        }
    }

    /// The shutdown token, when substituted.
    pub fn as_shutdown(&self) -> Option<&CancellationToken> {
        match self {
            Argument::Shutdown(token) => Some(token),
            _ => None,
        }
    }

    /// The job instance snapshot, when substituted.
    pub fn as_context(&self) -> Option<&JobInstance> {
        match self {
            Argument::Context(job) => Some(job),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_display_is_type_dot_method() {
        let descriptor = JobDescriptor::new("Mailer", "send", vec!["to@example.org".into()]);
        assert_eq!(descriptor.to_string(), "Mailer.send");
        assert_eq!(descriptor.args().len(), 1);
    }

    #[test]
    fn test_argument_accessors() {
        let arg = Argument::Recorded("42".into());
        assert_eq!(arg.as_recorded(), Some("42"));
        assert!(arg.as_shutdown().is_none());
        assert!(arg.as_context().is_none());
    }
}
