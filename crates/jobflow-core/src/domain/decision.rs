//! Decision model: what to do with a job after a failed attempt.
//!
//! The Decider is a pure function of the record (as it was while Running)
//! and the failure. Applying the decision to the record and the queues is
//! `app::Lifecycle`'s job.

use super::job::JobRecord;

/// The next action for a job whose attempt just failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Put the job back on the main queue.
    Retry { reason: String },

    /// Mark the job Failed and move its id to the dead-letter queue.
    DeadLetter { reason: String },
}

/// Decides the next action after a failure.
///
/// `job.retry_count` is the count *before* this failure is recorded.
pub trait Decider: Send + Sync {
    fn decide(&self, job: &JobRecord, error: &str) -> Decision;
}

/// Uniform bounded retry: every failure is retried until the incremented
/// `retry_count` reaches `max_retries`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDecider;

impl Decider for DefaultDecider {
    fn decide(&self, job: &JobRecord, _error: &str) -> Decision {
        let failed_attempts = job.retry_count + 1;
        if failed_attempts < job.max_retries {
            Decision::Retry {
                reason: format!(
                    "retry attempt {}/{}",
                    failed_attempts + 1,
                    job.max_retries
                ),
            }
        } else {
            Decision::DeadLetter {
                reason: format!(
                    "retries exhausted: {failed_attempts}/{}",
                    job.max_retries
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, NewJob};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn running(retry_count: u32, max_retries: u32) -> JobRecord {
        let mut job = JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            NewJob {
                job_type: "fail".to_string(),
                payload: "{}".to_string(),
                max_retries,
                created_at: Utc::now(),
            },
        );
        job.retry_count = retry_count;
        job
    }

    #[rstest]
    #[case::first_of_three(0, 3)]
    #[case::second_of_three(1, 3)]
    #[case::first_of_two(0, 2)]
    fn retries_while_below_ceiling(#[case] retry_count: u32, #[case] max_retries: u32) {
        let decision = DefaultDecider.decide(&running(retry_count, max_retries), "boom");
        assert!(matches!(decision, Decision::Retry { .. }), "{decision:?}");
    }

    #[rstest]
    #[case::third_of_three(2, 3)]
    #[case::single_retry(0, 1)]
    #[case::no_retries(0, 0)]
    fn dead_letters_at_ceiling(#[case] retry_count: u32, #[case] max_retries: u32) {
        let decision = DefaultDecider.decide(&running(retry_count, max_retries), "boom");
        assert!(matches!(decision, Decision::DeadLetter { .. }), "{decision:?}");
    }

    #[test]
    fn reason_mentions_counts() {
        let decision = DefaultDecider.decide(&running(2, 3), "boom");
        assert_eq!(
            decision,
            Decision::DeadLetter {
                reason: "retries exhausted: 3/3".to_string()
            }
        );
    }
}
