//! # Named job states with associated data.
//!
//! A [`JobState`] records where a job is in its lifecycle. `Enqueued` and
//! `Processing` are intermediate; `Succeeded` and `Failed` are terminal
//! outcomes of one execution attempt. State names are stable strings used
//! as transition preconditions by the job store.

/// State of a job, with state-specific data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Waiting in a queue for a worker to claim it.
    Enqueued,

    /// Claimed by a worker; carries the owning server and worker identity.
    /// The cancellation handle re-reads this state to detect abortion.
    Processing {
        /// Identifier of the owning server process.
        server_id: String,
        /// Identifier of the owning worker loop.
        worker_id: String,
    },

    /// Terminal: the job completed and returned a (possibly empty) result.
    Succeeded {
        /// The job's serialized return value, if any.
        result: Option<String>,
        /// Time between creation and the start of the attempt.
        latency_ms: u64,
        /// Duration of the performance itself.
        duration_ms: u64,
    },

    /// Terminal: the job (or its pipeline) failed.
    Failed {
        /// Human-readable reason for the failure.
        reason: String,
        /// Rendered cause chain of the underlying error.
        cause: String,
    },
}

impl JobState {
    /// Stable name of the `Enqueued` state.
    pub const ENQUEUED: &'static str = "Enqueued";
    /// Stable name of the `Processing` state.
    pub const PROCESSING: &'static str = "Processing";
    /// Stable name of the `Succeeded` state.
    pub const SUCCEEDED: &'static str = "Succeeded";
    /// Stable name of the `Failed` state.
    pub const FAILED: &'static str = "Failed";

    /// Returns the stable name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Enqueued => Self::ENQUEUED,
            JobState::Processing { .. } => Self::PROCESSING,
            JobState::Succeeded { .. } => Self::SUCCEEDED,
            JobState::Failed { .. } => Self::FAILED,
        }
    }

    /// Whether this state is a terminal outcome of an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_are_stable() {
        assert_eq!(JobState::Enqueued.name(), "Enqueued");
        let processing = JobState::Processing {
            server_id: "s".into(),
            worker_id: "w".into(),
        };
        assert_eq!(processing.name(), "Processing");
        assert!(!processing.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        let succeeded = JobState::Succeeded {
            result: None,
            latency_ms: 0,
            duration_ms: 0,
        };
        let failed = JobState::Failed {
            reason: "r".into(),
            cause: "c".into(),
        };
        assert!(succeeded.is_terminal());
        assert!(failed.is_terminal());
    }
}
