use thiserror::Error;
use tonic::Status;

use common::roster::RosterError;
use common::rpc::WorkerPhase;
use common::status;

/// Why a worker refused or failed a command.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("`{command}` is not allowed while the worker is {phase}")]
    InvalidPhase {
        command: &'static str,
        phase: WorkerPhase,
    },

    #[error("request is for job {requested}, worker holds job {active}")]
    JobMismatch { requested: u64, active: u64 },

    #[error("unknown workload `{0}`")]
    UnknownWorkload(String),

    #[error("invalid roster: {0}")]
    Roster(#[from] RosterError),

    #[error("worker `{0}` is not in the job roster")]
    NotInRoster(String),

    #[error("map failed: {0:#}")]
    Map(anyhow::Error),

    #[error("reduce failed: {0:#}")]
    Reduce(anyhow::Error),

    #[error("shuffle delivery to `{peer}` failed: {reason}")]
    Delivery { peer: String, reason: String },

    #[error("task was discarded by a reset")]
    Superseded,
}

impl From<WorkerError> for Status {
    fn from(err: WorkerError) -> Self {
        let message = err.to_string();
        match err {
            WorkerError::InvalidPhase { .. }
            | WorkerError::JobMismatch { .. }
            | WorkerError::Superseded => status::rejected(message),
            WorkerError::UnknownWorkload(_)
            | WorkerError::Roster(_)
            | WorkerError::NotInRoster(_) => status::invalid(message),
            WorkerError::Map(_) | WorkerError::Reduce(_) | WorkerError::Delivery { .. } => {
                status::aborted(message)
            }
        }
    }
}
