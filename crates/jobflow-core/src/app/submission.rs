//! Submitter - 投入と照会
//!
//! 投入は「作成 → QUEUED へ遷移して保存 → main queue へ push」の順です。
//! push が失敗しても CREATED/QUEUED のレコードは残ります（core は削除しない）。

use std::sync::Arc;

use crate::config::JobflowConfig;
use crate::domain::{JobId, JobRecord, JobSpec, JobStatus};
use crate::error::JobflowError;
use crate::ports::{Clock, JobStore, QueueChannel};

#[derive(Clone)]
pub struct Submitter {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn QueueChannel>,
    clock: Arc<dyn Clock>,
    config: Arc<JobflowConfig>,
}

impl Submitter {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn QueueChannel>,
        clock: Arc<dyn Clock>,
        config: Arc<JobflowConfig>,
    ) -> Self {
        Self {
            store,
            queue,
            clock,
            config,
        }
    }

    /// Create a job and put it on the main queue. Returns the queued record.
    pub async fn submit(&self, spec: JobSpec) -> Result<JobRecord, JobflowError> {
        let new_job = spec.resolve(self.config.default_max_retries, self.clock.now());
        let mut job = self.store.create(new_job).await?;

        job.mark_queued()?;
        self.store.update(&job).await?;
        self.queue.push(&self.config.queue_name, job.id).await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            max_retries = job.max_retries,
            "job submitted"
        );
        Ok(job)
    }

    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>, JobflowError> {
        Ok(self.store.get(id).await?)
    }

    /// All jobs, newest first.
    pub async fn list_all(&self) -> Result<Vec<JobRecord>, JobflowError> {
        Ok(self.store.list_all().await?)
    }

    pub async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, JobflowError> {
        Ok(self.store.list_by_status(status).await?)
    }
}
