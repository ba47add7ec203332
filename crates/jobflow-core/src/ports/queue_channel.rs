//! QueueChannel port - 配送キュー（Redis または InMemory）
//!
//! QueueChannel は JobId のみを流します（状態や payload は JobStore に保存）。
//!
//! # 設計原則
//! - 名前付きの FIFO リスト（main queue と DLQ の 2 つを使う）
//! - blocking pop（timeout 付き）
//! - pop は複数 worker 間でアトミック: 1 つの push は高々 1 つの pop にだけ届く

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::JobId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    OperationFailed(String),

    /// The backend returned a value that is not a job id.
    #[error("invalid queue item: {0:?}")]
    InvalidItem(String),
}

#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// Append `id` behind everything already in `queue`.
    async fn push(&self, queue: &str, id: JobId) -> Result<(), QueueError>;

    /// Put `id` at the pop end of `queue`, ahead of everything already in it.
    async fn push_front(&self, queue: &str, id: JobId) -> Result<(), QueueError>;

    /// Remove and return the oldest id, or `None` once `timeout` elapses.
    async fn blocking_pop(&self, queue: &str, timeout: Duration)
    -> Result<Option<JobId>, QueueError>;

    async fn size(&self, queue: &str) -> Result<usize, QueueError>;

    /// Whether `id` is currently waiting in `queue`. Linear in the queue
    /// length; only the reaper calls it.
    async fn contains(&self, queue: &str, id: JobId) -> Result<bool, QueueError>;
}
