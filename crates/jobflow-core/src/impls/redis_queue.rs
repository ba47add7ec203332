//! Redis-backed queue channel.
//!
//! Each named queue is a Redis list. New work is `LPUSH`ed and workers
//! `BRPOP` from the other end, so the list is FIFO. `push_front` uses
//! `RPUSH`, which puts the id right where the next `BRPOP` looks.
//!
//! `BRPOP` is atomic on the server, which is what gives exclusive delivery
//! across worker processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::JobId;
use crate::ports::{QueueChannel, QueueError};

pub struct RedisQueueChannel {
    client: redis::Client,
    /// Shared connection for non-blocking commands.
    conn: ConnectionManager,
}

impl RedisQueueChannel {
    /// Connect to Redis (e.g. "redis://localhost:6379").
    pub async fn connect(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| QueueError::OperationFailed(format!("Redis connection error: {e}")))?;

        let conn = ConnectionManager::new(client.clone()).await.map_err(|e| {
            QueueError::OperationFailed(format!("Redis connection manager error: {e}"))
        })?;

        Ok(Self { client, conn })
    }
}

fn command_error(e: redis::RedisError) -> QueueError {
    QueueError::OperationFailed(e.to_string())
}

#[async_trait]
impl QueueChannel for RedisQueueChannel {
    async fn push(&self, queue: &str, id: JobId) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(queue, id.to_string())
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn push_front(&self, queue: &str, id: JobId) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .rpush(queue, id.to_string())
            .await
            .map_err(command_error)?;
        Ok(())
    }

    async fn blocking_pop(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<JobId>, QueueError> {
        // A blocked BRPOP would stall every other command multiplexed on the
        // shared connection, so each pop gets its own.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(command_error)?;

        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(queue)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;

        match popped {
            None => Ok(None),
            Some((_, value)) => value
                .parse::<JobId>()
                .map(Some)
                .map_err(|_| QueueError::InvalidItem(value)),
        }
    }

    async fn size(&self, queue: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(queue).await.map_err(command_error)?;
        Ok(len)
    }

    async fn contains(&self, queue: &str, id: JobId) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let position: Option<i64> = redis::cmd("LPOS")
            .arg(queue)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await
            .map_err(command_error)?;
        Ok(position.is_some())
    }
}
