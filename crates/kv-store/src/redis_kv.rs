//! Raw Redis backend over a multiplexed connection manager.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub(crate) struct RedisKv {
    manager: ConnectionManager,
}

impl RedisKv {
    pub(crate) async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(RedisKv { manager })
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.manager.clone();
        conn.get(key).await
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.manager.clone();
        match ttl_seconds {
            Some(ttl) => conn.set_ex(key, value, ttl).await,
            None => conn.set(key, value).await,
        }
    }

    /// `SET key value NX EX ttl`; true when the key was freshly set.
    pub(crate) async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, redis::RedisError> {
        let mut conn = self.manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}
