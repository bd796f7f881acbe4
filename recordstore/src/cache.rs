use crate::ports::CacheClient;
use crate::record::{Record, RecordKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Error, Result, TtlMs};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Typed view over a raw string cache.
///
/// # Caller obligations
///
/// This cache never reads through to a repository and never hears about
/// repository writes. Services that cache records must:
///
/// * on a miss, load from the source of truth and `set` the result themselves;
/// * `del` (or overwrite) the entry after every update or delete of the record,
///   or readers keep seeing the old value until its TTL runs out.
///
/// Concurrent `set`s on one key are last-writer-wins at the backend. Entries
/// may be stale; treat every hit as a hint, not as the record.
pub struct StandardCache<K, V> {
    client: Arc<dyn CacheClient>,
    namespace: String,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> StandardCache<K, V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(client: Arc<dyn CacheClient>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            _marker: PhantomData,
        }
    }

    /// Cache for a record type, namespaced by its collection.
    pub fn for_records(client: Arc<dyn CacheClient>) -> Self
    where
        K: RecordKey,
        V: Record<K>,
    {
        Self::new(client, V::COLLECTION)
    }

    fn entry_key(&self, key: &K) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// `Ok(None)` on a miss. An entry that does not decode is `Internal`.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let entry_key = self.entry_key(key);
        let Some(raw) = self.client.get(&entry_key).await? else {
            debug!("Cache miss for '{}'", entry_key);
            return Ok(None);
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!("Undecodable cache entry '{}': {}", entry_key, e);
            Error::Internal(format!("cache entry '{}' does not decode: {}", entry_key, e))
        })
    }

    /// Overwrite the entry. Without `duration` the backend's default expiry applies.
    pub async fn set(&self, key: &K, value: &V, duration: Option<Duration>) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| Error::Validation(format!("value does not serialize: {}", e)))?;
        self.client
            .set(&self.entry_key(key), raw, duration.map(TtlMs::from))
            .await
    }

    /// Safe to call when nothing is cached.
    pub async fn del(&self, key: &K) -> Result<()> {
        self.client.del(&self.entry_key(key)).await
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<K, V> Clone for StandardCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            namespace: self.namespace.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V> std::fmt::Debug for StandardCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardCache")
            .field("namespace", &self.namespace)
            .finish()
    }
}
