//! In-memory job record store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{JobId, JobRecord, JobStatus, NewJob};
use crate::ports::{IdGenerator, JobStore, StoreError};

#[derive(Default)]
struct StoreState {
    records: HashMap<JobId, JobRecord>,
    /// Creation order.
    order: Vec<JobId>,
}

/// In-memory implementation of [`JobStore`].
///
/// Not durable: good for tests, the demo, and single-process deployments
/// where losing job history on restart is acceptable.
pub struct InMemoryJobStore {
    state: RwLock<StoreState>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryJobStore {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            ids,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        let id = self.ids.generate_job_id();
        let record = JobRecord::new(id, job);

        let mut state = self.state.write().await;
        state.records.insert(id, record.clone());
        state.order.push(id);
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn update(&self, job: &JobRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let Some(slot) = state.records.get_mut(&job.id) else {
            return Err(StoreError::NotFound(job.id));
        };
        *slot = job.clone();
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|record| record.status == status)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<JobRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.records.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobSpec;
    use crate::ports::{SystemClock, UlidGenerator};
    use chrono::Utc;
    use ulid::Ulid;

    fn store() -> InMemoryJobStore {
        InMemoryJobStore::new(Arc::new(UlidGenerator::new(Arc::new(SystemClock))))
    }

    fn new_job(job_type: &str) -> NewJob {
        JobSpec::new(job_type).resolve(3, Utc::now())
    }

    #[tokio::test]
    async fn create_assigns_id_and_created_status() {
        let store = store();
        let a = store.create(new_job("email")).await.unwrap();
        let b = store.create(new_job("email")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, JobStatus::Created);
        assert_eq!(store.get(a.id).await.unwrap(), Some(a));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let store = store();
        let missing = JobId::from_ulid(Ulid::new());
        assert_eq!(store.get(missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_overwrites() {
        let store = store();
        let mut job = store.create(new_job("email")).await.unwrap();
        job.mark_queued().unwrap();
        store.update(&job).await.unwrap();

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn update_unknown_is_not_found() {
        let store = store();
        let other = self::store();
        let job = other.create(new_job("email")).await.unwrap();

        let err = store.update(&job).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound(job.id));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn list_all_is_newest_first() {
        let store = store();
        let first = store.create(new_job("a")).await.unwrap();
        let second = store.create(new_job("b")).await.unwrap();
        let third = store.create(new_job("c")).await.unwrap();

        let ids: Vec<_> = store.list_all().await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test]
    async fn list_by_status_filters_in_creation_order() {
        let store = store();
        let mut a = store.create(new_job("a")).await.unwrap();
        let _b = store.create(new_job("b")).await.unwrap();
        let mut c = store.create(new_job("c")).await.unwrap();
        a.mark_queued().unwrap();
        c.mark_queued().unwrap();
        store.update(&c).await.unwrap();
        store.update(&a).await.unwrap();

        let queued: Vec<_> = store
            .list_by_status(JobStatus::Queued)
            .await
            .unwrap()
            .iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(queued, vec![a.id, c.id]);
        assert_eq!(store.list_by_status(JobStatus::Created).await.unwrap().len(), 1);
        assert!(store.list_by_status(JobStatus::Failed).await.unwrap().is_empty());
    }
}
