// Generic CRUD over any record type, identical for every domain entity.

pub mod actions;

use crate::filter::RecordFilter;
use crate::patch::Patch;
use crate::ports::{Document, RecordClient};
use crate::record::{Record, RecordKey};
use async_trait::async_trait;
use shared::{Error, Result};
use std::marker::PhantomData;
use std::sync::Arc;

pub use actions::{CreateRecord, DeleteRecord, GetAllRecords, GetRecord, UpdateRecord};

/// Everything a repository action needs besides its request.
#[derive(Clone)]
pub struct RepositoryContext {
    client: Arc<dyn RecordClient>,
}

impl RepositoryContext {
    pub fn new(client: Arc<dyn RecordClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn RecordClient {
        self.client.as_ref()
    }
}

impl std::fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryContext").finish_non_exhaustive()
    }
}

/// The one shape every repository operation has: a context, a request, and a
/// result typed per operation.
#[async_trait]
pub trait Action<Ctx: Sync>: Send + Sync {
    type Request: Send;
    type Output: Send;

    async fn execute(&self, ctx: &Ctx, request: Self::Request) -> Result<Self::Output>;
}

#[derive(Clone, Debug)]
pub struct CreateRecordRequest<K, V> {
    /// Overrides the value's own key. Generated when both are absent.
    pub key: Option<K>,
    pub value: V,
}

impl<K, V> CreateRecordRequest<K, V> {
    pub fn new(value: V) -> Self {
        Self { key: None, value }
    }

    pub fn with_key(key: K, value: V) -> Self {
        Self {
            key: Some(key),
            value,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GetRecordRequest<K> {
    pub key: K,
}

#[derive(Clone, Debug, Default)]
pub struct GetAllRecordsRequest {
    pub filter: Option<RecordFilter>,
}

#[derive(Clone, Debug)]
pub struct UpdateRecordRequest<K> {
    pub key: K,
    pub patch: Patch,
}

#[derive(Clone, Debug)]
pub struct DeleteRecordRequest<K> {
    pub key: K,
}

/// Stateless CRUD facade. All record state lives in the backend reached
/// through the context; this type only carries the key and value types.
pub struct StandardRepository<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> StandardRepository<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    pub async fn create_record(
        &self,
        ctx: &RepositoryContext,
        request: CreateRecordRequest<K, V>,
    ) -> Result<V> {
        CreateRecord::<K, V>::new().execute(ctx, request).await
    }

    pub async fn get_record(&self, ctx: &RepositoryContext, request: GetRecordRequest<K>) -> Result<V> {
        GetRecord::<K, V>::new().execute(ctx, request).await
    }

    pub async fn get_all_records(
        &self,
        ctx: &RepositoryContext,
        request: GetAllRecordsRequest,
    ) -> Result<Vec<V>> {
        GetAllRecords::<K, V>::new().execute(ctx, request).await
    }

    pub async fn update_record(
        &self,
        ctx: &RepositoryContext,
        request: UpdateRecordRequest<K>,
    ) -> Result<V> {
        UpdateRecord::<K, V>::new().execute(ctx, request).await
    }

    pub async fn delete_record(
        &self,
        ctx: &RepositoryContext,
        request: DeleteRecordRequest<K>,
    ) -> Result<()> {
        DeleteRecord::<K, V>::new().execute(ctx, request).await
    }
}

impl<K, V> Default for StandardRepository<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for StandardRepository<K, V> {
    fn clone(&self) -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> std::fmt::Debug for StandardRepository<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardRepository")
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

// A value that won't serialize was rejected by the caller's own data.
fn to_document<V: serde::Serialize>(value: &V) -> Result<Document> {
    serde_json::to_value(value)
        .map_err(|e| Error::Validation(format!("record does not serialize: {}", e)))
}

// A stored document that no longer fits the type is a backend-side problem.
fn from_stored<K: RecordKey, V: Record<K>>(document: Document) -> Result<V> {
    serde_json::from_value(document).map_err(|e| {
        Error::Internal(format!(
            "stored {} record does not deserialize: {}",
            V::COLLECTION,
            e
        ))
    })
}

fn record_ref<K: RecordKey, V: Record<K>>(key: &K) -> String {
    format!("{}/{}", V::COLLECTION, key)
}
