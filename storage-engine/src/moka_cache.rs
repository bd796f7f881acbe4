use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use recordstore::{CacheClient, Connector};
use shared::{Result, TtlMs};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

/// Per-entry TTL: each entry carries its own lifetime, reset on overwrite.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Moka-based cache client with per-entry TTL and optional size bound
pub struct MokaCacheClient {
    cache: Cache<String, Entry>,
    default_ttl: Option<Duration>,
}

impl MokaCacheClient {
    /// `default_ttl` applies to entries set without one.
    pub fn new(name: &str, max_entries: Option<u64>, default_ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().name(name).expire_after(EntryExpiry);

        if let Some(capacity) = max_entries {
            builder = builder.max_capacity(capacity);
        }

        Self {
            cache: builder.build(),
            default_ttl,
        }
    }
}

#[async_trait]
impl CacheClient for MokaCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<TtlMs>) -> Result<()> {
        let ttl = ttl.map(|t| t.as_duration()).or(self.default_ttl);
        self.cache.insert(key.to_string(), Entry { value, ttl }).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

impl std::fmt::Debug for MokaCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheClient")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct MokaCacheConnector {
    pub name: String,
    pub max_entries: Option<u64>,
    pub default_ttl: Option<Duration>,
}

#[async_trait]
impl Connector for MokaCacheConnector {
    type Client = MokaCacheClient;

    async fn connect(&self) -> Result<Arc<MokaCacheClient>> {
        Ok(Arc::new(MokaCacheClient::new(
            &self.name,
            self.max_entries,
            self.default_ttl,
        )))
    }

    fn describe(&self) -> String {
        format!("moka://{}", self.name)
    }
}
