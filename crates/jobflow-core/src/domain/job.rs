//! Job record and its transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TransitionError;
use super::ids::JobId;
use super::spec::NewJob;
use super::state::JobStatus;

/// A job and its execution history.
///
/// Design:
/// - The record store holds the single source of truth; queues only carry ids.
/// - All status changes go through the methods below, which check the edge
///   against [`JobStatus::can_transition_to`] before touching any field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: String,
    pub payload: String,
    pub status: JobStatus,

    /// Number of attempts that have failed so far.
    pub retry_count: u32,
    pub max_retries: u32,

    /// Cause of the most recent failure, cleared on success.
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Start of the most recent attempt.
    pub started_at: Option<DateTime<Utc>>,

    /// Set once the job is Completed or Failed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(id: JobId, job: NewJob) -> Self {
        Self {
            id,
            job_type: job.job_type,
            payload: job.payload,
            status: JobStatus::Created,
            retry_count: 0,
            max_retries: job.max_retries,
            error_message: None,
            created_at: job.created_at,
            started_at: None,
            completed_at: None,
        }
    }

    /// 1-based number of the attempt that is running (or would run next).
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Created -> Queued.
    pub fn mark_queued(&mut self) -> Result<(), TransitionError> {
        if self.status != JobStatus::Created {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to: JobStatus::Queued,
            });
        }
        self.transition(JobStatus::Queued)
    }

    /// Queued -> Running, stamping `started_at`.
    pub fn start_attempt(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running -> Completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.completed_at = Some(now);
        self.error_message = None;
        Ok(())
    }

    /// Running -> Queued after a failed attempt with retries left.
    pub fn schedule_retry(&mut self, error: String) -> Result<(), TransitionError> {
        if self.status != JobStatus::Running {
            return Err(TransitionError {
                id: self.id,
                from: self.status,
                to: JobStatus::Queued,
            });
        }
        self.transition(JobStatus::Queued)?;
        self.retry_count += 1;
        self.error_message = Some(error);
        Ok(())
    }

    /// Running -> Failed after a failed attempt with no retries left.
    ///
    /// `retry_count` never goes past `max_retries`, so a job submitted with
    /// `max_retries == 0` fails with a count of 0.
    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.error_message = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn new_record(max_retries: u32) -> JobRecord {
        let job = NewJob {
            job_type: "email".to_string(),
            payload: "{}".to_string(),
            max_retries,
            created_at: t0(),
        };
        JobRecord::new(JobId::from_ulid(Ulid::new()), job)
    }

    #[test]
    fn new_record_starts_created() {
        let job = new_record(3);
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.attempt(), 1);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn happy_path_stamps_timestamps() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        job.start_attempt(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(job.started_at, Some(t0() + Duration::seconds(1)));

        job.mark_completed(t0() + Duration::seconds(4)).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(t0() + Duration::seconds(4)));
        assert_eq!(job.created_at, t0());
    }

    #[test]
    fn success_after_retry_clears_error() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        job.start_attempt(t0()).unwrap();
        job.schedule_retry("boom".to_string()).unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert_eq!(job.attempt(), 2);

        let second_start = t0() + Duration::seconds(10);
        job.start_attempt(second_start).unwrap();
        assert_eq!(job.started_at, Some(second_start));

        job.mark_completed(second_start).unwrap();
        assert_eq!(job.error_message, None);
        assert_eq!(job.retry_count, 1);
    }

    #[test]
    fn mark_failed_stamps_completion() {
        let mut job = new_record(1);
        job.mark_queued().unwrap();
        job.start_attempt(t0()).unwrap();
        job.mark_failed("nope".to_string(), t0()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 1);
        assert_eq!(job.completed_at, Some(t0()));
    }

    #[test]
    fn zero_max_retries_keeps_count_within_ceiling() {
        let mut job = new_record(0);
        job.mark_queued().unwrap();
        job.start_attempt(t0()).unwrap();
        job.mark_failed("nope".to_string(), t0()).unwrap();
        assert_eq!(job.retry_count, 0);
        assert!(job.retry_count <= job.max_retries);
    }

    #[test]
    fn created_cannot_complete_directly() {
        let mut job = new_record(3);
        let err = job.mark_completed(t0()).unwrap_err();
        assert_eq!(err.from, JobStatus::Created);
        assert_eq!(err.to, JobStatus::Completed);
        assert_eq!(job.status, JobStatus::Created);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn queued_cannot_fail_directly() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        assert!(job.mark_failed("x".to_string(), t0()).is_err());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn queued_cannot_be_retried_without_running() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        assert!(job.schedule_retry("x".to_string()).is_err());
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn mark_queued_only_from_created() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        job.start_attempt(t0()).unwrap();
        let err = job.mark_queued().unwrap_err();
        assert_eq!(err.from, JobStatus::Running);
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn terminal_records_reject_everything() {
        let mut job = new_record(3);
        job.mark_queued().unwrap();
        job.start_attempt(t0()).unwrap();
        job.mark_completed(t0()).unwrap();

        assert!(job.start_attempt(t0()).is_err());
        assert!(job.schedule_retry("x".to_string()).is_err());
        assert!(job.mark_failed("x".to_string(), t0()).is_err());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error_message, None);
    }

    #[test]
    fn serializes_camel_case() {
        let job = new_record(3);
        let v = serde_json::to_value(&job).unwrap();
        assert_eq!(v["jobType"], "email");
        assert_eq!(v["status"], "CREATED");
        assert_eq!(v["retryCount"], 0);
        assert_eq!(v["maxRetries"], 3);
        assert!(v["errorMessage"].is_null());
        assert!(v["id"].as_str().unwrap().starts_with("job-"));
    }
}
