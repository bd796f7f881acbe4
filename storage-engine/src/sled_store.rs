use async_trait::async_trait;
use recordstore::patch::apply_merge_patch;
use recordstore::{Connector, Document, MergeGuard, RecordClient, RecordFilter};
use shared::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

fn storage_err(context: &str, e: sled::Error) -> Error {
    Error::Internal(format!("{}: {}", context, e))
}

fn decode(collection: &str, key: &[u8], bytes: &[u8]) -> Result<Document> {
    serde_json::from_slice(bytes).map_err(|e| {
        Error::Internal(format!(
            "corrupt record {}/{}: {}",
            collection,
            String::from_utf8_lossy(key),
            e
        ))
    })
}

fn encode(document: &Document) -> Result<Vec<u8>> {
    serde_json::to_vec(document)
        .map_err(|e| Error::Internal(format!("Failed to serialize record: {}", e)))
}

/// Sled-backed record store. One tree per collection; scans come back in key order.
#[derive(Clone)]
pub struct SledRecordClient {
    db: sled::Db,
}

impl SledRecordClient {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())
            .map_err(|e| Error::Connection(format!("Failed to create directory: {}", e)))?;

        let db = sled::open(path)
            .map_err(|e| Error::Connection(format!("Failed to open Sled database: {}", e)))?;

        Ok(Self { db })
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree> {
        self.db
            .open_tree(collection)
            .map_err(|e| storage_err("Failed to open tree", e))
    }
}

#[async_trait]
impl RecordClient for SledRecordClient {
    async fn insert(&self, collection: &str, key: &str, document: Document) -> Result<Document> {
        let tree = self.tree(collection)?;
        let bytes = encode(&document)?;

        // Only succeeds if nothing is stored under the key yet
        tree.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))
            .map_err(|e| storage_err("Failed to insert record", e))?
            .map_err(|_| Error::Conflict(format!("{}/{}", collection, key)))?;

        Ok(document)
    }

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let tree = self.tree(collection)?;
        match tree
            .get(key.as_bytes())
            .map_err(|e| storage_err("Failed to get record", e))?
        {
            Some(bytes) => Ok(Some(decode(collection, key.as_bytes(), &bytes)?)),
            None => Ok(None),
        }
    }

    async fn scan(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Document>> {
        let tree = self.tree(collection)?;
        let mut documents = Vec::new();

        for item in tree.iter() {
            let (key, bytes) = item.map_err(|e| storage_err("Failed to iterate tree", e))?;
            documents.push(decode(collection, &key, &bytes)?);
        }

        Ok(filter.apply(documents))
    }

    async fn merge(
        &self,
        collection: &str,
        key: &str,
        patch: &Document,
        guard: MergeGuard<'_>,
    ) -> Result<Option<Document>> {
        let tree = self.tree(collection)?;

        // Optimistic loop: retry if another writer swapped the record under us
        loop {
            let Some(current) = tree
                .get(key.as_bytes())
                .map_err(|e| storage_err("Failed to get record", e))?
            else {
                return Ok(None);
            };

            let mut merged = decode(collection, key.as_bytes(), &current)?;
            apply_merge_patch(&mut merged, patch);
            guard(&merged)?;

            let swapped = tree
                .compare_and_swap(key.as_bytes(), Some(&current), Some(encode(&merged)?))
                .map_err(|e| storage_err("Failed to update record", e))?;

            match swapped {
                Ok(()) => return Ok(Some(merged)),
                Err(_) => debug!("Concurrent write on {}/{}, retrying merge", collection, key),
            }
        }
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool> {
        let tree = self.tree(collection)?;
        let removed = tree
            .remove(key.as_bytes())
            .map_err(|e| storage_err("Failed to delete record", e))?
            .is_some();
        Ok(removed)
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| storage_err("Failed to flush database", e))?;
        Ok(())
    }
}

/// Opens a sled database directory on first use.
#[derive(Clone, Debug)]
pub struct SledConnector {
    path: PathBuf,
}

impl SledConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for SledConnector {
    type Client = SledRecordClient;

    async fn connect(&self) -> Result<Arc<SledRecordClient>> {
        Ok(Arc::new(SledRecordClient::open(&self.path)?))
    }

    async fn disconnect(&self, client: &SledRecordClient) -> Result<()> {
        client.flush().await
    }

    fn describe(&self) -> String {
        format!("sled://{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore::domain::Task;
    use recordstore::{
        ClientFactory, CreateRecordRequest, GetAllRecordsRequest, GetRecordRequest, Patch,
        RepositoryContext, StandardRepository, UpdateRecordRequest,
    };
    use serde_json::json;
    use tempfile::TempDir;

    fn accept(_: &Document) -> Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn test_sled_insert_fetch_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let client = SledRecordClient::open(temp_dir.path().join("records.sled")).unwrap();

        client
            .insert("tasks", "t1", json!({"id": "t1", "name": "task-1"}))
            .await
            .unwrap();

        let doc = client.fetch("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(doc["name"], "task-1");

        let err = client
            .insert("tasks", "t1", json!({"id": "t1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        assert!(client.fetch("tasks", "t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_scan_is_key_ordered() {
        let temp_dir = TempDir::new().unwrap();
        let client = SledRecordClient::open(temp_dir.path().join("records.sled")).unwrap();

        for key in ["b", "c", "a"] {
            client
                .insert("tasks", key, json!({"id": key, "keep": key != "b"}))
                .await
                .unwrap();
        }

        let all = client.scan("tasks", &RecordFilter::new()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let filtered = client
            .scan("tasks", &RecordFilter::new().eq("keep", true))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);

        assert!(client.scan("empty", &RecordFilter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sled_merge_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let client = SledRecordClient::open(temp_dir.path().join("records.sled")).unwrap();

        client
            .insert("tasks", "t1", json!({"id": "t1", "name": "task-1"}))
            .await
            .unwrap();

        let merged = client
            .merge("tasks", "t1", &json!({"name": "renamed"}), &accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged, json!({"id": "t1", "name": "renamed"}));

        let reject = |_: &Document| -> Result<()> { Err(Error::Validation("nope".into())) };
        assert!(client
            .merge("tasks", "t1", &json!({"name": ""}), &reject)
            .await
            .is_err());
        assert_eq!(
            client.fetch("tasks", "t1").await.unwrap().unwrap()["name"],
            "renamed"
        );

        assert!(client.remove("tasks", "t1").await.unwrap());
        assert!(!client.remove("tasks", "t1").await.unwrap());
        assert!(client
            .merge("tasks", "t1", &json!({"name": "x"}), &accept)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_merges_all_apply() {
        let temp_dir = TempDir::new().unwrap();
        let client = Arc::new(SledRecordClient::open(temp_dir.path().join("records.sled")).unwrap());
        client
            .insert("counters", "c", json!({"id": "c"}))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                let patch = Patch::new().set(format!("f{}", i), i).to_document();
                client.merge("counters", "c", &patch, &accept).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let doc = client.fetch("counters", "c").await.unwrap().unwrap();
        assert_eq!(doc.as_object().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_repository_over_sled_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let factory = ClientFactory::new(SledConnector::new(temp_dir.path().join("db")));
        let repo: StandardRepository<String, Task> = StandardRepository::new();

        {
            let ctx = RepositoryContext::new(factory.get_client().await.unwrap());
            repo.create_record(&ctx, CreateRecordRequest::with_key("t1".into(), Task::new("task-1")))
                .await
                .unwrap();
            repo.update_record(
                &ctx,
                UpdateRecordRequest {
                    key: "t1".into(),
                    patch: Patch::new().set("name", "task-1-renamed"),
                },
            )
            .await
            .unwrap();
        }
        factory.close().await.unwrap();

        let ctx = RepositoryContext::new(factory.get_client().await.unwrap());
        let task = repo
            .get_record(&ctx, GetRecordRequest { key: "t1".into() })
            .await
            .unwrap();
        assert_eq!(task.name, "task-1-renamed");

        let all = repo
            .get_all_records(&ctx, GetAllRecordsRequest::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }
}
