use crate::filter::RecordFilter;
use crate::patch::apply_merge_patch;
use crate::ports::{CacheClient, Connector, Document, MergeGuard, RecordClient};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared::{Error, Result, TtlMs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Collection {
    next_seq: u64,
    // key -> (insertion sequence, document)
    rows: HashMap<String, (u64, Document)>,
}

/// In-process record store. Scans return records in insertion order.
#[derive(Default)]
pub struct MemoryRecordClient {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RecordClient for MemoryRecordClient {
    async fn insert(&self, collection: &str, key: &str, document: Document) -> Result<Document> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.rows.contains_key(key) {
            return Err(Error::Conflict(format!("{}/{}", collection, key)));
        }

        let seq = coll.next_seq;
        coll.next_seq += 1;
        coll.rows.insert(key.to_string(), (seq, document.clone()));

        Ok(document)
    }

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.rows.get(key))
            .map(|(_, doc)| doc.clone()))
    }

    async fn scan(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Document>> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&(u64, Document)> = coll.rows.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);

        Ok(filter.apply(rows.into_iter().map(|(_, doc)| doc.clone())))
    }

    async fn merge(
        &self,
        collection: &str,
        key: &str,
        patch: &Document,
        guard: MergeGuard<'_>,
    ) -> Result<Option<Document>> {
        let mut collections = self.collections.write();
        let Some((_, current)) = collections
            .get_mut(collection)
            .and_then(|c| c.rows.get_mut(key))
        else {
            return Ok(None);
        };

        let mut merged = current.clone();
        apply_merge_patch(&mut merged, patch);
        guard(&merged)?;
        *current = merged.clone();

        Ok(Some(merged))
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|c| c.rows.remove(key))
            .is_some())
    }
}

/// Hands out a fresh [`MemoryRecordClient`] per connection.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnector;

#[async_trait]
impl Connector for MemoryConnector {
    type Client = MemoryRecordClient;

    async fn connect(&self) -> Result<Arc<MemoryRecordClient>> {
        Ok(Arc::new(MemoryRecordClient::new()))
    }

    fn describe(&self) -> String {
        "memory://records".to_string()
    }
}

/// In-process cache with per-entry expiry, checked lazily on read.
pub struct MemoryCacheClient {
    entries: RwLock<HashMap<String, (String, Option<Instant>)>>,
    default_ttl: Option<Duration>,
}

impl MemoryCacheClient {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if expires_at.is_none_or(|at| at > now) => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: drop it unless a writer replaced it meanwhile
        let mut entries = self.entries.write();
        if entries
            .get(key)
            .is_some_and(|(_, expires_at)| expires_at.is_some_and(|at| at <= now))
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<TtlMs>) -> Result<()> {
        let expires_at = ttl
            .map(|t| t.as_duration())
            .or(self.default_ttl)
            .map(|d| Instant::now() + d);
        self.entries
            .write()
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCacheConnector {
    pub default_ttl: Option<Duration>,
}

#[async_trait]
impl Connector for MemoryCacheConnector {
    type Client = MemoryCacheClient;

    async fn connect(&self) -> Result<Arc<MemoryCacheClient>> {
        Ok(Arc::new(MemoryCacheClient::new(self.default_ttl)))
    }

    fn describe(&self) -> String {
        "memory://cache".to_string()
    }
}
