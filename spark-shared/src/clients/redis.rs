use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::errors::StoreError;

/// Redis connection shared by every handler. Each call is bounded by `timeout`.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(timeout, client.get_connection_manager()).await??;
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "connected to Redis");
        Ok(Self { conn, timeout })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        Ok(tokio::time::timeout(self.timeout, fut).await??)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self.bounded(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(conn.smembers(key)).await
    }

    /// SMEMBERS for each key in one round trip.
    pub async fn smembers_many(&self, keys: &[String]) -> Result<Vec<Vec<String>>, StoreError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.smembers(key.as_str());
        }
        self.bounded(pipe.query_async(&mut conn)).await
    }

    pub async fn scard(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(conn.scard(key)).await
    }

    pub async fn sinter(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        self.bounded(conn.sinter(keys)).await
    }

    pub async fn sunion(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        if keys.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        self.bounded(conn.sunion(keys)).await
    }

    /// Runs `pipe` inside MULTI/EXEC so the commands apply together or not at all.
    pub async fn exec_atomic(&self, pipe: &mut redis::Pipeline) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        pipe.atomic();
        self.bounded(pipe.query_async::<_, ()>(&mut conn)).await
    }
}
