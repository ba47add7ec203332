//! Redis-backed job record store.
//!
//! Lets several processes (API and worker instances) share one source of
//! truth next to [`RedisQueueChannel`](super::RedisQueueChannel).
//!
//! # キー
//! - `{prefix}:records`: hash、field は JobId、値は JobRecord の JSON
//! - `{prefix}:order`: list、作成順の JobId
//!
//! create は HSET と RPUSH を MULTI/EXEC でまとめるので、order にだけ載った
//! id やその逆は生まれません。

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::{JobId, JobRecord, JobStatus, NewJob};
use crate::ports::{IdGenerator, JobStore, StoreError};

pub struct RedisJobStore {
    conn: ConnectionManager,
    ids: Arc<dyn IdGenerator>,
    records_key: String,
    order_key: String,
}

impl RedisJobStore {
    /// Connect to Redis and keep records under `key_prefix`.
    pub async fn connect(
        redis_url: &str,
        key_prefix: &str,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("Redis connection error: {e}")))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("Redis connection manager error: {e}"))
        })?;

        Ok(Self {
            conn,
            ids,
            records_key: records_key(key_prefix),
            order_key: order_key(key_prefix),
        })
    }

    /// Records for `ids`, in that order. Ids without a record are skipped.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<JobRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(&self.records_key)
            .arg(ids)
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        ids.iter()
            .zip(raw)
            .filter_map(|(id, raw)| raw.map(|raw| decode(id, &raw)))
            .collect()
    }

    /// Every id, in creation order.
    async fn order(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.lrange(&self.order_key, 0, -1)
            .await
            .map_err(command_error)
    }
}

fn records_key(prefix: &str) -> String {
    format!("{prefix}:records")
}

fn order_key(prefix: &str) -> String {
    format!("{prefix}:order")
}

fn command_error(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn encode(job: &JobRecord) -> Result<String, StoreError> {
    serde_json::to_string(job)
        .map_err(|e| StoreError::Unavailable(format!("cannot encode job {}: {e}", job.id)))
}

fn decode(id: &str, raw: &str) -> Result<JobRecord, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Unavailable(format!("corrupt record for {id}: {e}")))
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn create(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(self.ids.generate_job_id(), job);
        let id = record.id.to_string();
        let json = encode(&record)?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset(&self.records_key, &id, json)
            .ignore()
            .rpush(&self.order_key, &id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let id = id.to_string();
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .hget(&self.records_key, &id)
            .await
            .map_err(command_error)?;
        raw.map(|raw| decode(&id, &raw)).transpose()
    }

    async fn update(&self, job: &JobRecord) -> Result<(), StoreError> {
        let id = job.id.to_string();
        let json = encode(job)?;
        let mut conn = self.conn.clone();

        let exists: bool = conn
            .hexists(&self.records_key, &id)
            .await
            .map_err(command_error)?;
        if !exists {
            return Err(StoreError::NotFound(job.id));
        }
        let _: () = conn
            .hset(&self.records_key, &id, json)
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError> {
        let ids = self.order().await?;
        let mut records = self.fetch(&ids).await?;
        records.retain(|record| record.status == status);
        Ok(records)
    }

    async fn list_all(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut ids = self.order().await?;
        ids.reverse();
        self.fetch(&ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobSpec;
    use chrono::Utc;
    use ulid::Ulid;

    #[test]
    fn keys_share_the_prefix() {
        assert_eq!(records_key("jobflow"), "jobflow:records");
        assert_eq!(order_key("jobflow"), "jobflow:order");
    }

    #[test]
    fn records_survive_encoding() {
        let mut job = JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            JobSpec::new("email").resolve(3, Utc::now()),
        );
        job.mark_queued().unwrap();
        let raw = encode(&job).unwrap();
        assert_eq!(decode(&job.id.to_string(), &raw).unwrap(), job);
    }

    #[test]
    fn corrupt_record_is_reported_with_its_id() {
        let err = decode("job-123", "{not json").unwrap_err();
        assert!(
            matches!(&err, StoreError::Unavailable(msg) if msg.contains("job-123")),
            "{err:?}"
        );
    }
}
