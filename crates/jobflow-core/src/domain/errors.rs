//! Domain-level errors.

use super::ids::JobId;
use super::state::JobStatus;

/// An attempted status change that is not an edge of the state machine.
///
/// The record is left untouched when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {id}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Failure raised by an executor.
///
/// Every failure is treated the same way (retried up to `max_retries`);
/// the message ends up in the record's `error_message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
