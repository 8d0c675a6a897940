use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::AppResult;

/// Prefix for every key this service writes, so a shared Redis stays tidy
const KEY_NAMESPACE: &str = "anime-rec";

/// Writes queued beyond this are dropped rather than buffered without bound
const WRITE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Search results for a query and result limit
    Search { query: String, limit: usize },
    /// Generated explanation for an anime under a preference fingerprint
    Explanation { anime_id: String, profile: String },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Search { query, limit } => {
                let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
                write!(f, "search:{}:{}", limit, normalized.to_lowercase())
            }
            CacheKey::Explanation { anime_id, profile } => {
                write!(f, "explain:{}:{}", anime_id, profile)
            }
        }
    }
}

impl CacheKey {
    fn storage_key(&self) -> String {
        format!("{}:{}", KEY_NAMESPACE, self)
    }
}

/// Opens a Redis client. No connection is made until first use.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

struct PendingWrite {
    key: String,
    json: String,
    ttl: u64,
}

/// Read-through JSON cache backed by Redis
///
/// Reads hit Redis directly. Writes are queued to a single background task
/// so a slow or unavailable Redis never delays a response.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    writes: mpsc::Sender<PendingWrite>,
}

/// Controls the background writer. Dropping it stops the writer too.
pub struct CacheWriterHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Stops accepting new work, writes out what is queued, then returns
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    pub async fn new(client: Client) -> (Self, CacheWriterHandle) {
        let (writes, queue) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let (stop, stopped) = oneshot::channel();

        let task = tokio::spawn(CacheWriter::new(client.clone()).run(queue, stopped));

        (Self { client, writes }, CacheWriterHandle { stop, task })
    }

    /// Returns the cached value for `key`, `None` on a miss
    ///
    /// An entry that no longer deserializes into `T` is reported as a miss.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key.storage_key()).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Queues `value` to be stored under `key` for `ttl` seconds
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.storage_key(),
            json,
            ttl,
        };

        match self.writes.try_send(write) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(key = %key, "Cache write queue full, dropping write");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(key = %key, "Cache writer stopped, dropping write");
            }
        }
    }
}

/// Owns the write side: one connection, reopened after an error
struct CacheWriter {
    client: Client,
    conn: Option<MultiplexedConnection>,
    written: u64,
    failed: u64,
}

impl CacheWriter {
    fn new(client: Client) -> Self {
        Self {
            client,
            conn: None,
            written: 0,
            failed: 0,
        }
    }

    async fn run(mut self, mut queue: mpsc::Receiver<PendingWrite>, mut stopped: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                write = queue.recv() => match write {
                    Some(write) => self.write(write).await,
                    None => break,
                },
                _ = &mut stopped => {
                    queue.close();
                    while let Some(write) = queue.recv().await {
                        self.write(write).await;
                    }
                    break;
                }
            }
        }

        tracing::info!(
            written = self.written,
            failed = self.failed,
            "Cache writer stopped"
        );
    }

    async fn write(&mut self, write: PendingWrite) {
        match self.try_write(&write).await {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.failed += 1;
                tracing::error!(key = %write.key, error = %e, "Failed to write to Redis cache");
            }
        }
    }

    /// A connection that errored is dropped and reopened on the next write
    async fn try_write(&mut self, write: &PendingWrite) -> AppResult<()> {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.client.get_multiplexed_async_connection().await?,
        };

        let _: () = conn.set_ex(&write.key, &write.json, write.ttl).await?;
        self.conn = Some(conn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_search_key_ignores_case_and_spacing() {
        let a = CacheKey::Search {
            query: " ATTACK  on titan ".to_string(),
            limit: 5,
        };
        let b = CacheKey::Search {
            query: "attack on Titan".to_string(),
            limit: 5,
        };

        assert_eq!(a.to_string(), "search:5:attack on titan");
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_explanation_key_is_namespaced() {
        let key = CacheKey::Explanation {
            anime_id: "2".to_string(),
            profile: "l=1|d=|g=|m=dark".to_string(),
        };

        assert_eq!(key.to_string(), "explain:2:l=1|d=|g=|m=dark");
        assert_eq!(key.storage_key(), "anime-rec:explain:2:l=1|d=|g=|m=dark");
    }

    #[tokio::test]
    async fn test_shutdown_completes_when_redis_is_unreachable() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client).await;

        let key = CacheKey::Search {
            query: "mecha".to_string(),
            limit: 1,
        };
        cache.set_in_background(&key, &vec!["Code Geass"], 60);

        tokio::time::timeout(Duration::from_secs(10), handle.shutdown())
            .await
            .expect("writer should stop even if every write fails");

        // Writes after shutdown are dropped, not panics
        cache.set_in_background(&key, &vec!["Code Geass"], 60);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_round_trip_through_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let client = create_redis_client(&url).unwrap();
        let (cache, handle) = Cache::new(client.clone()).await;

        let key = CacheKey::Search {
            query: "round trip".to_string(),
            limit: 3,
        };
        let missing: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert!(missing.is_none());

        let value = vec!["Monster".to_string(), "Death Note".to_string()];
        cache.set_in_background(&key, &value, 60);
        handle.shutdown().await;

        let stored: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(stored, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(key.storage_key()).await.unwrap();
    }
}
