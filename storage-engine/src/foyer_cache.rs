use async_trait::async_trait;
use foyer::{Cache, CacheBuilder};
use recordstore::{CacheClient, Connector};
use shared::{Result, TtlMs};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Foyer-based in-memory cache client.
///
/// Foyer has no TTL of its own, so each entry carries its expiry instant and
/// expired entries read as misses. They are reclaimed by normal eviction.
pub struct FoyerCacheClient {
    cache: Arc<Cache<String, Entry>>,
    default_ttl: Option<Duration>,
}

impl FoyerCacheClient {
    /// `capacity` counts entries.
    pub fn new(name: String, capacity: usize, default_ttl: Option<Duration>) -> Self {
        let cache = CacheBuilder::new(capacity).with_name(name).build();

        Self {
            cache: Arc::new(cache),
            default_ttl,
        }
    }
}

#[async_trait]
impl CacheClient for FoyerCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .cache
            .get(&key.to_string())
            .map(|entry| entry.value().clone())
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<TtlMs>) -> Result<()> {
        let expires_at = ttl
            .map(|t| t.as_duration())
            .or(self.default_ttl)
            .map(|d| Instant::now() + d);
        self.cache.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.cache.remove(&key.to_string());
        Ok(())
    }
}

impl std::fmt::Debug for FoyerCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoyerCacheClient")
            .field("cache", &"<foyer::Cache>")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct FoyerCacheConnector {
    pub name: String,
    pub capacity: usize,
    pub default_ttl: Option<Duration>,
}

#[async_trait]
impl Connector for FoyerCacheConnector {
    type Client = FoyerCacheClient;

    async fn connect(&self) -> Result<Arc<FoyerCacheClient>> {
        Ok(Arc::new(FoyerCacheClient::new(
            self.name.clone(),
            self.capacity,
            self.default_ttl,
        )))
    }

    fn describe(&self) -> String {
        format!("foyer://{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_foyer_set_get_del() {
        let cache = FoyerCacheClient::new("test".to_string(), 1024, None);

        cache.set("hello", "world".to_string(), None).await.unwrap();
        assert_eq!(cache.get("hello").await.unwrap(), Some("world".to_string()));

        cache.del("hello").await.unwrap();
        assert_eq!(cache.get("hello").await.unwrap(), None);
        cache.del("hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_foyer_overwrite() {
        let cache = FoyerCacheClient::new("test".to_string(), 1024, None);

        cache.set("key", "value1".to_string(), None).await.unwrap();
        cache.set("key", "value2".to_string(), None).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_foyer_entry_expires() {
        let cache = FoyerCacheClient::new("test".to_string(), 1024, Some(Duration::from_millis(30)));

        cache.set("default", "a".to_string(), None).await.unwrap();
        cache.set("explicit", "b".to_string(), Some(TtlMs(60_000))).await.unwrap();
        assert!(cache.get("default").await.unwrap().is_some());

        sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("default").await.unwrap(), None);
        assert_eq!(cache.get("explicit").await.unwrap(), Some("b".to_string()));
    }
}
