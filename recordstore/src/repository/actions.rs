use super::{
    Action, CreateRecordRequest, DeleteRecordRequest, GetAllRecordsRequest, GetRecordRequest,
    RepositoryContext, UpdateRecordRequest, from_stored, record_ref, to_document,
};
use crate::ports::Document;
use crate::record::{Record, RecordKey};
use async_trait::async_trait;
use shared::{Error, Result};
use std::marker::PhantomData;
use tracing::debug;

macro_rules! action_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<K, V> {
            _marker: PhantomData<fn() -> (K, V)>,
        }

        impl<K, V> $name<K, V> {
            pub fn new() -> Self {
                Self {
                    _marker: PhantomData,
                }
            }
        }

        impl<K, V> Default for $name<K, V> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// A key is usable only if it reads back through [`RecordKey::parse`].
fn checked_key<K: RecordKey>(key: &K) -> Result<String> {
    let raw = key.to_string();
    K::parse(&raw)?;
    Ok(raw)
}

action_type!(
    /// `Conflict` if the key exists, `Validation` if the value is rejected.
    CreateRecord
);
action_type!(
    /// `NotFound` if no record has the key.
    GetRecord
);
action_type!(
    /// Never fails for an empty result.
    GetAllRecords
);
action_type!(
    /// Merge a patch into one record atomically. `NotFound` if absent.
    UpdateRecord
);
action_type!(
    /// Not idempotent: a missing key is `NotFound`.
    DeleteRecord
);

#[async_trait]
impl<K, V> Action<RepositoryContext> for CreateRecord<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    type Request = CreateRecordRequest<K, V>;
    type Output = V;

    async fn execute(&self, ctx: &RepositoryContext, request: Self::Request) -> Result<V> {
        let CreateRecordRequest { key, mut value } = request;

        let key = match (key, value.key()) {
            (Some(requested), Some(own)) if &requested != own => {
                return Err(Error::Validation(format!(
                    "requested key '{}' does not match record key '{}'",
                    requested, own
                )));
            }
            (Some(requested), _) => requested,
            (None, Some(own)) => own.clone(),
            (None, None) => K::generate(),
        };
        let key_str = checked_key(&key)?;

        value.assign_key(key.clone());
        value.validate()?;

        let document = to_document(&value)?;
        debug!("Creating {}", record_ref::<K, V>(&key));

        let stored = ctx
            .client()
            .insert(V::COLLECTION, &key_str, document)
            .await?;

        from_stored::<K, V>(stored)
    }
}

#[async_trait]
impl<K, V> Action<RepositoryContext> for GetRecord<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    type Request = GetRecordRequest<K>;
    type Output = V;

    async fn execute(&self, ctx: &RepositoryContext, request: Self::Request) -> Result<V> {
        let document = ctx
            .client()
            .fetch(V::COLLECTION, &checked_key(&request.key)?)
            .await?
            .ok_or_else(|| Error::NotFound(record_ref::<K, V>(&request.key)))?;

        from_stored::<K, V>(document)
    }
}

#[async_trait]
impl<K, V> Action<RepositoryContext> for GetAllRecords<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    type Request = GetAllRecordsRequest;
    type Output = Vec<V>;

    async fn execute(&self, ctx: &RepositoryContext, request: Self::Request) -> Result<Vec<V>> {
        let filter = request.filter.unwrap_or_default();
        let documents = ctx.client().scan(V::COLLECTION, &filter).await?;

        debug!("Scanned {} {} record(s)", documents.len(), V::COLLECTION);

        documents.into_iter().map(from_stored::<K, V>).collect()
    }
}

#[async_trait]
impl<K, V> Action<RepositoryContext> for UpdateRecord<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    type Request = UpdateRecordRequest<K>;
    type Output = V;

    async fn execute(&self, ctx: &RepositoryContext, request: Self::Request) -> Result<V> {
        let UpdateRecordRequest { key, mut patch } = request;
        let key_str = checked_key(&key)?;

        // Re-keying would break the one-record-per-key rule.
        if let Some(value) = patch.get(V::KEY_FIELD) {
            let same_key = value
                .as_str()
                .and_then(|raw| K::parse(raw).ok())
                .is_some_and(|patched| patched == key);
            if !same_key {
                return Err(Error::Validation(format!(
                    "patch may not change '{}' of {}",
                    V::KEY_FIELD,
                    record_ref::<K, V>(&key)
                )));
            }
            // Store the canonical spelling
            patch = patch.set(V::KEY_FIELD, key_str.clone());
        }

        let guard = |merged: &Document| -> Result<()> {
            let candidate: V = serde_json::from_value(merged.clone())
                .map_err(|e| Error::Validation(format!("patched record is invalid: {}", e)))?;
            candidate.validate()
        };

        debug!("Updating {}", record_ref::<K, V>(&key));

        let merged = ctx
            .client()
            .merge(V::COLLECTION, &key_str, &patch.to_document(), &guard)
            .await?
            .ok_or_else(|| Error::NotFound(record_ref::<K, V>(&key)))?;

        from_stored::<K, V>(merged)
    }
}

#[async_trait]
impl<K, V> Action<RepositoryContext> for DeleteRecord<K, V>
where
    K: RecordKey,
    V: Record<K>,
{
    type Request = DeleteRecordRequest<K>;
    type Output = ();

    async fn execute(&self, ctx: &RepositoryContext, request: Self::Request) -> Result<()> {
        let removed = ctx
            .client()
            .remove(V::COLLECTION, &checked_key(&request.key)?)
            .await?;

        if !removed {
            return Err(Error::NotFound(record_ref::<K, V>(&request.key)));
        }

        debug!("Deleted {}", record_ref::<K, V>(&request.key));
        Ok(())
    }
}
