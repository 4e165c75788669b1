//! Scheduler errors.

use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors reported by the scheduler and its data structures.
///
/// All variants except [`SchedError::EmptyQueue`] are recoverable: they are returned to the caller
/// without modifying the scheduler state.
#[derive(Debug, Error)]
pub enum SchedError {
    /// The referenced job id was never seen by the scheduler.
    #[error("job {0} does not exist")]
    NotFound(JobId),
    /// The operation is not legal for the current job status.
    #[error("cannot {operation} job {id} in state {status:?}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        operation: &'static str,
    },
    /// Bad parameter passed to a constructor or a submission.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Pop or peek on an empty run queue.
    #[error("run queue is empty")]
    EmptyQueue,
    /// Incomplete or non-numeric line of a batch workload.
    #[error("malformed line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("can't parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl SchedError {
    pub(crate) fn invalid_state(id: JobId, status: JobStatus, operation: &'static str) -> Self {
        Self::InvalidState { id, status, operation }
    }
}

pub type SchedResult<T> = Result<T, SchedError>;
