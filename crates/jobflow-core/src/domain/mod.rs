//! Domain model (ids, status state machine, records, decisions).
//!
//! Pure logic only: nothing in here touches a queue, a store or the clock.

pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod outcome;
pub mod spec;
pub mod state;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ExecutionError, TransitionError};
pub use ids::{JobId, ParseJobIdError};
pub use job::JobRecord;
pub use outcome::Outcome;
pub use spec::{DEFAULT_JOB_TYPE, DEFAULT_MAX_RETRIES, DEFAULT_PAYLOAD, JobSpec, NewJob};
pub use state::{JobStatus, ParseJobStatusError};
