use std::time::Duration;

use thiserror::Error;
use tonic::Status;

use common::status::{classify, Failure};

use crate::jobs::JobState;

/// Why a job was aborted. Names the step the job was in and the first
/// worker that failed it.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("worker `{worker}` is unavailable ({state}): {reason}")]
    Unavailable {
        state: JobState,
        worker: String,
        reason: String,
    },

    #[error("transform failed on worker `{worker}` ({state}): {reason}")]
    TransformFailure {
        state: JobState,
        worker: String,
        reason: String,
    },

    #[error("worker `{worker}` could not deliver its shuffle output: {reason}")]
    DeliveryFailure {
        state: JobState,
        worker: String,
        reason: String,
    },

    #[error("worker `{worker}` did not answer within {after:?} ({state})")]
    Timeout {
        state: JobState,
        worker: String,
        after: Duration,
    },

    #[error("worker `{worker}` rejected the command ({state}): {reason}")]
    Rejected {
        state: JobState,
        worker: String,
        reason: String,
    },

    #[error("invalid job: {0}")]
    InvalidJob(String),
}

impl JobError {
    /// Turn a failed call to `worker` into the error the job reports.
    ///
    /// A task that ran and failed is a delivery failure while shuffling and
    /// a transform failure otherwise. `limit` is the bound the call ran under.
    pub fn from_status(state: JobState, worker: &str, limit: Duration, status: Status) -> Self {
        let worker = worker.to_string();
        let reason = status.message().to_string();
        match classify(&status) {
            Failure::Unavailable => JobError::Unavailable {
                state,
                worker,
                reason: format!("{:?}: {reason}", status.code()),
            },
            Failure::Aborted if state == JobState::Shuffling => JobError::DeliveryFailure {
                state,
                worker,
                reason,
            },
            Failure::Aborted => JobError::TransformFailure {
                state,
                worker,
                reason,
            },
            Failure::Rejected => JobError::Rejected {
                state,
                worker,
                reason,
            },
            Failure::Timeout => JobError::Timeout {
                state,
                worker,
                after: limit,
            },
        }
    }

    /// The step the job was in when it failed.
    pub fn state(&self) -> Option<JobState> {
        match self {
            JobError::Unavailable { state, .. }
            | JobError::TransformFailure { state, .. }
            | JobError::DeliveryFailure { state, .. }
            | JobError::Timeout { state, .. }
            | JobError::Rejected { state, .. } => Some(*state),
            JobError::InvalidJob(_) => None,
        }
    }

    /// The worker that failed first.
    pub fn worker(&self) -> Option<&str> {
        match self {
            JobError::Unavailable { worker, .. }
            | JobError::TransformFailure { worker, .. }
            | JobError::DeliveryFailure { worker, .. }
            | JobError::Timeout { worker, .. }
            | JobError::Rejected { worker, .. } => Some(worker),
            JobError::InvalidJob(_) => None,
        }
    }
}
