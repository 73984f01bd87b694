//! How failures travel over the wire.
//!
//! Workers answer with a [`tonic::Status`] whose code tells the caller which
//! kind of failure happened; [`classify`] is the caller's side of that
//! contract.

use tonic::{Code, Status};

/// What a failed call means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The worker could not be reached, or the transport broke mid-call.
    Unavailable,
    /// The task ran on the worker and failed (a transform raised, or a
    /// shuffle delivery to a peer failed).
    Aborted,
    /// The worker refused the command without running anything.
    Rejected,
    /// The call ran out of time.
    Timeout,
}

/// A task that ran and failed.
pub fn aborted(message: impl Into<String>) -> Status {
    Status::aborted(message)
}

/// A command that is not allowed in the worker's current state.
pub fn rejected(message: impl Into<String>) -> Status {
    Status::failed_precondition(message)
}

/// A command whose payload the worker cannot act on.
pub fn invalid(message: impl Into<String>) -> Status {
    Status::invalid_argument(message)
}

pub fn classify(status: &Status) -> Failure {
    match status.code() {
        Code::Aborted => Failure::Aborted,
        Code::DeadlineExceeded | Code::Cancelled => Failure::Timeout,
        Code::Unavailable | Code::Unknown | Code::Internal => Failure::Unavailable,
        _ => Failure::Rejected,
    }
}
