#![deny(clippy::all)]

use crate::filter::RecordFilter;
use async_trait::async_trait;
use shared::{Result, TtlMs};
use std::sync::Arc;

// Ports are the capability surfaces concrete backends plug into.
// Each component asks only for the verbs it uses.

/// A stored record as the backend sees it.
pub type Document = serde_json::Value;

/// Check run against a merged document before the backend commits it.
pub type MergeGuard<'a> = &'a (dyn Fn(&Document) -> Result<()> + Send + Sync);

/// Port for acquiring a backend client. Driven by [`crate::ClientFactory`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Client: ?Sized + Send + Sync + 'static;

    /// Open a new client. Called again after a failure, never after a success.
    async fn connect(&self) -> Result<Arc<Self::Client>>;

    /// Release a client handed out by `connect`.
    async fn disconnect(&self, _client: &Self::Client) -> Result<()> {
        Ok(())
    }

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Port for a database-capable (or HTTP-peer) record store.
///
/// Keys are unique per collection. Every verb is atomic for a single record;
/// nothing spans records.
#[async_trait]
pub trait RecordClient: Send + Sync + 'static {
    /// Store `document` under `key`. `Error::Conflict` if the key is taken.
    async fn insert(&self, collection: &str, key: &str, document: Document) -> Result<Document>;

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Matching documents in backend order.
    async fn scan(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Document>>;

    /// Merge-patch the record under `key` in one step. `guard` sees the merged
    /// document first; if it fails nothing is written. `Ok(None)` if absent.
    async fn merge(
        &self,
        collection: &str,
        key: &str,
        patch: &Document,
        guard: MergeGuard<'_>,
    ) -> Result<Option<Document>>;

    /// `Ok(false)` if there was nothing to remove.
    async fn remove(&self, collection: &str, key: &str) -> Result<bool>;

    /// Persist buffered writes. Called on shutdown.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Port for a raw key/value cache.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite any previous entry. `None` leaves expiry to the backend default.
    async fn set(&self, key: &str, value: String, ttl: Option<TtlMs>) -> Result<()>;

    /// Succeeds whether or not the entry existed.
    async fn del(&self, key: &str) -> Result<()>;
}
