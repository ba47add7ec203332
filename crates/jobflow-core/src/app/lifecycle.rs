//! Lifecycle - 試行結果をレコードとキューへ反映する
//!
//! WorkerLoop と ReaperLoop はどちらもここを通して結果を適用します。
//! リトライ/DLQ の方針が 1 か所にまとまるので、両者で挙動がずれません。
//!
//! # 順序
//! 1. レコードを遷移させて保存
//! 2. その後で id をキューへ push
//!
//! push を後にするのは、別の worker が id を pop したときに
//! 必ず保存済みの状態を読めるようにするためです。

use std::sync::Arc;

use crate::config::{JobflowConfig, RetryPlacement};
use crate::domain::{Decider, Decision, JobId, JobRecord, JobStatus, Outcome};
use crate::error::JobflowError;
use crate::ports::{Clock, JobStore, QueueChannel};

/// What a single worker cycle (or reaper settlement) ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing arrived within the pop timeout.
    Idle,
    /// The popped id had no record; the reference was dropped.
    MissingRecord(JobId),
    /// The popped record was not `QUEUED` (duplicate delivery or terminal).
    Skipped { id: JobId, status: JobStatus },
    Completed(JobId),
    Retried { id: JobId, retry_count: u32 },
    DeadLettered { id: JobId, retry_count: u32 },
    /// A `QUEUED` record that was on no queue got its id pushed again.
    Requeued(JobId),
}

impl CycleOutcome {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            CycleOutcome::Idle => None,
            CycleOutcome::MissingRecord(id)
            | CycleOutcome::Completed(id)
            | CycleOutcome::Requeued(id) => Some(*id),
            CycleOutcome::Skipped { id, .. }
            | CycleOutcome::Retried { id, .. }
            | CycleOutcome::DeadLettered { id, .. } => Some(*id),
        }
    }
}

/// Shared handles plus the retry/DLQ policy.
pub struct Lifecycle {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueChannel>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    config: Arc<JobflowConfig>,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn QueueChannel>,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        config: Arc<JobflowConfig>,
    ) -> Self {
        Self {
            store,
            queue,
            decider,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<dyn QueueChannel> {
        &self.queue
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &JobflowConfig {
        &self.config
    }

    /// `QUEUED -> RUNNING`, persisted before any work starts.
    pub async fn begin(&self, job: &mut JobRecord) -> Result<(), JobflowError> {
        job.start_attempt(self.clock.now())?;
        self.store.update(job).await?;
        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempt(),
            "job started"
        );
        Ok(())
    }

    /// Apply the outcome of the attempt `job` is currently running.
    pub async fn settle(
        &self,
        mut job: JobRecord,
        outcome: Outcome,
    ) -> Result<CycleOutcome, JobflowError> {
        let message = match outcome {
            Outcome::Success => {
                job.mark_completed(self.clock.now())?;
                self.store.update(&job).await?;
                tracing::info!(job_id = %job.id, job_type = %job.job_type, "job completed");
                return Ok(CycleOutcome::Completed(job.id));
            }
            Outcome::Failure { message } => message,
        };

        match self.decider.decide(&job, &message) {
            Decision::Retry { reason } => {
                job.schedule_retry(message)?;
                self.store.update(&job).await?;
                match self.config.retry_placement {
                    RetryPlacement::Front => {
                        self.queue.push_front(&self.config.queue_name, job.id).await?
                    }
                    RetryPlacement::Back => self.queue.push(&self.config.queue_name, job.id).await?,
                }
                tracing::warn!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    error = job.error_message.as_deref().unwrap_or_default(),
                    %reason,
                    "job failed, retrying"
                );
                Ok(CycleOutcome::Retried {
                    id: job.id,
                    retry_count: job.retry_count,
                })
            }
            Decision::DeadLetter { reason } => {
                job.mark_failed(message, self.clock.now())?;
                self.store.update(&job).await?;
                self.queue.push(&self.config.dlq_name, job.id).await?;
                tracing::error!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    error = job.error_message.as_deref().unwrap_or_default(),
                    %reason,
                    "job moved to dead-letter queue"
                );
                Ok(CycleOutcome::DeadLettered {
                    id: job.id,
                    retry_count: job.retry_count,
                })
            }
        }
    }
}
