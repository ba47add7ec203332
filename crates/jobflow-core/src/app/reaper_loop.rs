//! ReaperLoop - 取り残されたジョブの回収
//!
//! 1 回の sweep で 2 種類のジョブを拾います。
//!
//! - **期限切れ RUNNING**: worker が RUNNING を保存した後にクラッシュすると、
//!   そのジョブはどのキューにも載らないまま残ります。`started_at` が
//!   lease_timeout より古い RUNNING ジョブを「失敗した試行」として扱い、
//!   worker と同じ Lifecycle でリトライ or DLQ に振り分けます。
//! - **キューに載っていない QUEUED**: 保存の後の push が失敗したジョブ。
//!   lease_timeout より古く、main queue に id が無ければ push し直します。
//!
//! reaper は worker と並行して動くので、一覧は古くなり得ます。回収の直前に
//! レコードを読み直し、一覧時と同じ状態のときだけ手を出します。
//! lease_timeout > execution_timeout は AppBuilder::build が保証するので、
//! 生きている worker の試行は lease が切れる前に必ず決着しています。

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::lifecycle::{CycleOutcome, Lifecycle};
use crate::domain::{JobRecord, JobStatus, Outcome};
use crate::error::JobflowError;

pub struct ReaperLoop {
    lifecycle: Arc<Lifecycle>,
}

impl ReaperLoop {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// One sweep. Returns what happened to each job the reaper touched.
    pub async fn reap_once(&self) -> Result<Vec<CycleOutcome>, JobflowError> {
        let mut reaped = self.reap_expired_leases().await?;
        reaped.extend(self.requeue_orphans().await?);
        Ok(reaped)
    }

    fn lease(&self) -> TimeDelta {
        TimeDelta::from_std(self.lifecycle.config().lease_timeout).unwrap_or(TimeDelta::MAX)
    }

    /// Re-read `job` and return the current record if it still has the
    /// status and `started_at` it was listed with.
    async fn still_as_listed(&self, job: &JobRecord) -> Result<Option<JobRecord>, JobflowError> {
        let current = self.lifecycle.store().get(job.id).await?;
        Ok(current.filter(|c| c.status == job.status && c.started_at == job.started_at))
    }

    async fn reap_expired_leases(&self) -> Result<Vec<CycleOutcome>, JobflowError> {
        let lease_timeout = self.lifecycle.config().lease_timeout;
        let lease = self.lease();
        let now = self.lifecycle.clock().now();

        let running = self
            .lifecycle
            .store()
            .list_by_status(JobStatus::Running)
            .await?;

        let mut reaped = Vec::new();
        for listed in running {
            let Some(started_at) = listed.started_at else {
                continue;
            };
            if now.signed_duration_since(started_at) < lease {
                continue;
            }
            let Some(job) = self.still_as_listed(&listed).await? else {
                tracing::debug!(job_id = %listed.id, "job moved on since listing, not reaping");
                continue;
            };

            tracing::warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                %started_at,
                "lease expired, reaping job"
            );
            let outcome = Outcome::failure(format!("lease expired after {lease_timeout:?}"));
            reaped.push(self.lifecycle.settle(job, outcome).await?);
        }

        Ok(reaped)
    }

    async fn requeue_orphans(&self) -> Result<Vec<CycleOutcome>, JobflowError> {
        let lease = self.lease();
        let now = self.lifecycle.clock().now();
        let queue_name = &self.lifecycle.config().queue_name;

        let queued = self
            .lifecycle
            .store()
            .list_by_status(JobStatus::Queued)
            .await?;

        let mut requeued = Vec::new();
        for listed in queued {
            if now.signed_duration_since(last_activity(&listed)) < lease {
                continue;
            }
            if self.lifecycle.queue().contains(queue_name, listed.id).await? {
                continue;
            }
            if self.still_as_listed(&listed).await?.is_none() {
                continue;
            }

            self.lifecycle.queue().push(queue_name, listed.id).await?;
            tracing::warn!(
                job_id = %listed.id,
                job_type = %listed.job_type,
                "queued job was on no queue, pushed again"
            );
            requeued.push(CycleOutcome::Requeued(listed.id));
        }

        Ok(requeued)
    }

    /// Sweep on `reaper_interval` until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.lifecycle.config().reaper_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("reaper started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match self.reap_once().await {
                Ok(reaped) if reaped.is_empty() => {}
                Ok(reaped) => tracing::info!(count = reaped.len(), "reaped expired jobs"),
                Err(e) => tracing::error!(error = %e, "reaper sweep aborted"),
            }
        }

        tracing::info!("reaper stopped");
    }
}

fn last_activity(job: &JobRecord) -> DateTime<Utc> {
    job.started_at.unwrap_or(job.created_at)
}
