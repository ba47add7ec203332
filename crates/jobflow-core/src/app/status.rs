//! Status - キューとレコードの集計
//!
//! 毎回ストアとキューから読み直す（キャッシュしない）。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::JobflowConfig;
use crate::domain::JobStatus;
use crate::error::JobflowError;
use crate::ports::{JobStore, QueueChannel};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub queue_size: usize,
    pub dlq_size: usize,
    pub total_jobs: usize,
    pub created_jobs: usize,
    pub queued_jobs: usize,
    pub running_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
}

impl StatsSnapshot {
    pub fn count(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Created => self.created_jobs,
            JobStatus::Queued => self.queued_jobs,
            JobStatus::Running => self.running_jobs,
            JobStatus::Completed => self.completed_jobs,
            JobStatus::Failed => self.failed_jobs,
        }
    }

    fn bump(&mut self, status: JobStatus) {
        let slot = match status {
            JobStatus::Created => &mut self.created_jobs,
            JobStatus::Queued => &mut self.queued_jobs,
            JobStatus::Running => &mut self.running_jobs,
            JobStatus::Completed => &mut self.completed_jobs,
            JobStatus::Failed => &mut self.failed_jobs,
        };
        *slot += 1;
    }
}

#[derive(Clone)]
pub struct Stats {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueChannel>,
    config: Arc<JobflowConfig>,
}

impl Stats {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn QueueChannel>,
        config: Arc<JobflowConfig>,
    ) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    pub async fn snapshot(&self) -> Result<StatsSnapshot, JobflowError> {
        let mut snapshot = StatsSnapshot {
            queue_size: self.queue.size(&self.config.queue_name).await?,
            dlq_size: self.queue.size(&self.config.dlq_name).await?,
            ..StatsSnapshot::default()
        };

        let jobs = self.store.list_all().await?;
        snapshot.total_jobs = jobs.len();
        for job in &jobs {
            snapshot.bump(job.status);
        }
        Ok(snapshot)
    }
}
