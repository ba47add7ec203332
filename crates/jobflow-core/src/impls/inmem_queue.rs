//! InMemoryQueueChannel - 開発・テスト用の配送キュー
//!
//! # 実装詳細
//! - Mutex + Condvar による blocking pop
//! - Condvar の wait は spawn_blocking 上で行う（async worker を止めない）
//! - 名前ごとに VecDeque を持つ（main queue と DLQ を同じインスタンスで扱える）
//!
//! pop は 1 つの Mutex の中で完結するので、複数 worker が同時に pop しても
//! 同じ JobId が 2 回取り出されることはありません。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::JobId;
use crate::ports::{QueueChannel, QueueError};

type Queues = HashMap<String, VecDeque<JobId>>;

/// In-memory implementation of [`QueueChannel`].
///
/// Each named queue is a `VecDeque`: `push` appends to the back,
/// `push_front` inserts at the front, `blocking_pop` takes from the front.
#[derive(Clone, Default)]
pub struct InMemoryQueueChannel {
    queues: Arc<Mutex<Queues>>,
    /// push 時の通知用
    condvar: Arc<Condvar>,
}

impl InMemoryQueueChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `queue`, pop end first.
    pub fn contents(&self, queue: &str) -> Result<Vec<JobId>, QueueError> {
        let queues = lock(&self.queues)?;
        Ok(queues
            .get(queue)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, queue: &str, id: JobId, front: bool) -> Result<(), QueueError> {
        let queues = Arc::clone(&self.queues);
        let condvar = Arc::clone(&self.condvar);
        let name = queue.to_string();

        tokio::task::spawn_blocking(move || {
            let mut queues = lock(&queues)?;
            let q = queues.entry(name).or_default();
            if front {
                q.push_front(id);
            } else {
                q.push_back(id);
            }
            // 待機中のスレッドは別の queue 名を待っているかもしれないので全員起こす
            condvar.notify_all();
            Ok(())
        })
        .await
        .map_err(|e| QueueError::OperationFailed(format!("push failed: {e}")))?
    }
}

fn lock(queues: &Mutex<Queues>) -> Result<MutexGuard<'_, Queues>, QueueError> {
    queues
        .lock()
        .map_err(|_| QueueError::OperationFailed("queue mutex poisoned".to_string()))
}

#[async_trait]
impl QueueChannel for InMemoryQueueChannel {
    async fn push(&self, queue: &str, id: JobId) -> Result<(), QueueError> {
        self.insert(queue, id, false).await
    }

    async fn push_front(&self, queue: &str, id: JobId) -> Result<(), QueueError> {
        self.insert(queue, id, true).await
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobId>, QueueError> {
        let queues = Arc::clone(&self.queues);
        let condvar = Arc::clone(&self.condvar);
        let name = queue.to_string();

        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let mut guard = lock(&queues)?;
            loop {
                if let Some(q) = guard.get_mut(&name)
                    && let Some(id) = q.pop_front()
                {
                    return Ok(Some(id));
                }

                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Ok(None);
                }

                let remaining = timeout - elapsed;
                let (next, _) = condvar.wait_timeout(guard, remaining).map_err(|_| {
                    QueueError::OperationFailed("queue mutex poisoned".to_string())
                })?;
                guard = next;
            }
        })
        .await
        .map_err(|e| QueueError::OperationFailed(format!("pop failed: {e}")))?
    }

    async fn size(&self, queue: &str) -> Result<usize, QueueError> {
        let queues = lock(&self.queues)?;
        Ok(queues.get(queue).map_or(0, VecDeque::len))
    }

    async fn contains(&self, queue: &str, id: JobId) -> Result<bool, QueueError> {
        let queues = lock(&self.queues)?;
        Ok(queues.get(queue).is_some_and(|q| q.contains(&id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use ulid::Ulid;

    fn new_id() -> JobId {
        JobId::from_ulid(Ulid::new())
    }

    #[tokio::test]
    async fn push_pop_is_fifo() {
        let queue = InMemoryQueueChannel::new();
        let (a, b, c) = (new_id(), new_id(), new_id());
        queue.push("main", a).await.unwrap();
        queue.push("main", b).await.unwrap();
        queue.push("main", c).await.unwrap();

        let timeout = Duration::from_millis(100);
        assert_eq!(queue.blocking_pop("main", timeout).await.unwrap(), Some(a));
        assert_eq!(queue.blocking_pop("main", timeout).await.unwrap(), Some(b));
        assert_eq!(queue.blocking_pop("main", timeout).await.unwrap(), Some(c));
    }

    #[tokio::test]
    async fn push_front_jumps_the_line() {
        let queue = InMemoryQueueChannel::new();
        let (a, b, retried) = (new_id(), new_id(), new_id());
        queue.push("main", a).await.unwrap();
        queue.push("main", b).await.unwrap();
        queue.push_front("main", retried).await.unwrap();

        assert_eq!(queue.contents("main").unwrap(), vec![retried, a, b]);
        let popped = queue
            .blocking_pop("main", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(popped, Some(retried));
    }

    #[tokio::test]
    async fn contains_sees_waiting_ids_only() {
        let queue = InMemoryQueueChannel::new();
        let (a, b) = (new_id(), new_id());
        queue.push("main", a).await.unwrap();

        assert!(queue.contains("main", a).await.unwrap());
        assert!(!queue.contains("main", b).await.unwrap());
        assert!(!queue.contains("job:dlq", a).await.unwrap());

        queue
            .blocking_pop("main", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(!queue.contains("main", a).await.unwrap());
    }

    #[tokio::test]
    async fn pop_times_out_on_empty_queue() {
        let queue = InMemoryQueueChannel::new();
        let start = Instant::now();
        let popped = queue
            .blocking_pop("main", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(popped, None);
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let queue = InMemoryQueueChannel::new();
        let (a, b) = (new_id(), new_id());
        queue.push("job:queue", a).await.unwrap();
        queue.push("job:dlq", b).await.unwrap();

        assert_eq!(queue.size("job:queue").await.unwrap(), 1);
        assert_eq!(queue.size("job:dlq").await.unwrap(), 1);
        assert_eq!(queue.size("other").await.unwrap(), 0);

        let timeout = Duration::from_millis(100);
        assert_eq!(queue.blocking_pop("job:dlq", timeout).await.unwrap(), Some(b));
        assert_eq!(queue.blocking_pop("job:queue", timeout).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn push_wakes_waiting_pop() {
        let queue = InMemoryQueueChannel::new();
        let id = new_id();

        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.blocking_pop("main", Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.push("main", id).await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), Some(id));
    }

    #[tokio::test]
    async fn push_to_other_queue_does_not_starve_waiter() {
        let queue = InMemoryQueueChannel::new();
        let id = new_id();

        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.blocking_pop("main", Duration::from_secs(5)).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.push("job:dlq", new_id()).await.unwrap();
        queue.push("main", id).await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), Some(id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pops_deliver_each_id_once() {
        let queue = InMemoryQueueChannel::new();
        let mut pushed = HashSet::new();
        for _ in 0..50 {
            let id = new_id();
            pushed.insert(id);
            queue.push("main", id).await.unwrap();
        }

        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some(id) = queue
                    .blocking_pop("main", Duration::from_millis(100))
                    .await
                    .unwrap()
                {
                    got.push(id);
                }
                got
            }));
        }

        let mut seen = Vec::new();
        for consumer in consumers {
            seen.extend(consumer.await.unwrap());
        }
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 50);
        assert_eq!(unique, pushed);
    }
}
