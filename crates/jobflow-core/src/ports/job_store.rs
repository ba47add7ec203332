//! JobStore port - ジョブレコードの正本（source of truth）
//!
//! Queue は JobId のみを流し、状態・payload・履歴はここに保存します。
//!
//! # 設計原則
//! - update は比較なしの上書き（last-writer-wins）
//! - 同時に 1 つの JobId を持つ worker は高々 1 つ（QueueChannel の配送保証）なので、
//!   ロックなしで十分
//! - core はレコードを削除しない（保持期間・掃除は外部の責務）

use async_trait::async_trait;

use crate::domain::{JobId, JobRecord, JobStatus, NewJob};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record in `CREATED`, assigning its id.
    async fn create(&self, job: NewJob) -> Result<JobRecord, StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Full overwrite of an existing record.
    async fn update(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Records in `status`, in creation order.
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError>;

    /// All records, newest first.
    async fn list_all(&self) -> Result<Vec<JobRecord>, StoreError>;
}
