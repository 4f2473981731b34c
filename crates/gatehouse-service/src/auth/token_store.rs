//! Server-side token registry.
//!
//! A token is only valid while its key is present here, which is what makes logout
//! effective even though the signature of a destroyed token still verifies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::ServiceResult;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// ## Summary
    /// Records `key` for `ttl`.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the backing store fails.
    async fn set(&self, key: &str, ttl: Duration) -> ServiceResult<()>;

    /// ## Summary
    /// Returns `true` if `key` is present and not expired.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the backing store fails.
    async fn check(&self, key: &str) -> ServiceResult<bool>;

    /// ## Summary
    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the backing store fails.
    async fn delete(&self, key: &str) -> ServiceResult<()>;
}

/// Sharded in-process token registry.
///
/// Concurrent logins for different subjects touch different shards and never contend on a
/// single lock.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, Instant>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, deadline| *deadline > now);
        before.saturating_sub(self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawns a task that periodically purges expired entries.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "Purged expired tokens");
                }
            }
        })
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set(&self, key: &str, ttl: Duration) -> ServiceResult<()> {
        self.entries.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn check(&self, key: &str) -> ServiceResult<bool> {
        Ok(self
            .entries
            .get(key)
            .is_some_and(|deadline| *deadline > Instant::now()))
    }

    async fn delete(&self, key: &str) -> ServiceResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(feature = "redis")]
pub use redis_store::RedisTokenStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::time::Duration;

    use async_trait::async_trait;
    use redis::aio::ConnectionManager;

    use super::TokenStore;
    use crate::error::{ServiceError, ServiceResult};

    /// Token registry kept in Redis with native key expiry.
    #[derive(Clone)]
    pub struct RedisTokenStore {
        conn: ConnectionManager,
        key_prefix: String,
    }

    impl RedisTokenStore {
        /// ## Summary
        /// Connects to Redis at `redis_url`.
        ///
        /// ## Errors
        /// Returns `InternalServer` if the URL is invalid or the connection cannot be established.
        #[tracing::instrument(skip(redis_url))]
        pub async fn connect(redis_url: &str, key_prefix: &str) -> ServiceResult<Self> {
            let client = redis::Client::open(redis_url)
                .map_err(|e| ServiceError::internal("invalid redis url", e))?;
            let conn = ConnectionManager::new(client)
                .await
                .map_err(|e| ServiceError::internal("connecting to redis", e))?;
            tracing::info!("Connected to redis token store");
            Ok(Self {
                conn,
                key_prefix: key_prefix.to_string(),
            })
        }

        fn key(&self, key: &str) -> String {
            format!("{}{key}", self.key_prefix)
        }
    }

    #[async_trait]
    impl TokenStore for RedisTokenStore {
        async fn set(&self, key: &str, ttl: Duration) -> ServiceResult<()> {
            let mut conn = self.conn.clone();
            let () = redis::cmd("SET")
                .arg(self.key(key))
                .arg(1)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| ServiceError::internal("redis SET", e))?;
            Ok(())
        }

        async fn check(&self, key: &str) -> ServiceResult<bool> {
            let mut conn = self.conn.clone();
            let exists: u64 = redis::cmd("EXISTS")
                .arg(self.key(key))
                .query_async(&mut conn)
                .await
                .map_err(|e| ServiceError::internal("redis EXISTS", e))?;
            Ok(exists > 0)
        }

        async fn delete(&self, key: &str) -> ServiceResult<()> {
            let mut conn = self.conn.clone();
            let _removed: u64 = redis::cmd("DEL")
                .arg(self.key(key))
                .query_async(&mut conn)
                .await
                .map_err(|e| ServiceError::internal("redis DEL", e))?;
            Ok(())
        }
    }
}
