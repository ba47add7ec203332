use thiserror::Error;

use crate::domain::TransitionError;
use crate::ports::{QueueError, StoreError};

/// Errors surfaced by the application services.
///
/// Executor failures are not in here: they are part of the normal job
/// lifecycle and end up on the record, not in a `Result`.
#[derive(Debug, Error)]
pub enum JobflowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
