use crate::api::ApiError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use recordstore::{Document, RecordFilter};
use shared::Error;
use storage_engine::http_peer::wire::{InsertRecordBody, MergeRecordBody};
use tracing::info;

/// A merge must leave the record a JSON object.
fn keep_object(merged: &Document) -> shared::Result<()> {
    if merged.is_object() {
        Ok(())
    } else {
        Err(Error::Validation("record must remain a JSON object".into()))
    }
}

/// POST /collections/:collection/records
pub async fn insert_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<InsertRecordBody>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    info!("INSERT: collection={}, key={}", collection, body.key);

    let stored = state
        .records
        .insert(&collection, &body.key, body.document)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /collections/:collection/records/:key
pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    info!("GET: collection={}, key={}", collection, key);

    state
        .records
        .fetch(&collection, &key)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, key)).into())
}

/// POST /collections/:collection/query
pub async fn query_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(filter): Json<RecordFilter>,
) -> Result<Json<Vec<Document>>, ApiError> {
    info!("QUERY: collection={}", collection);

    Ok(Json(state.records.scan(&collection, &filter).await?))
}

/// PATCH /collections/:collection/records/:key
///
/// Commits only if the merge reproduces the caller's `expected` document;
/// 409 tells the caller to redo its preview.
pub async fn patch_record(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
    Json(body): Json<MergeRecordBody>,
) -> Result<Json<Document>, ApiError> {
    info!("PATCH: collection={}, key={}", collection, key);

    let MergeRecordBody { patch, expected } = body;
    let matches_preview = |merged: &Document| -> shared::Result<()> {
        keep_object(merged)?;
        if *merged == expected {
            Ok(())
        } else {
            Err(Error::Conflict(format!(
                "{}/{} changed since the merge preview",
                collection, key
            )))
        }
    };

    state
        .records
        .merge(&collection, &key, &patch, &matches_preview)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, key)).into())
}

/// DELETE /collections/:collection/records/:key
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    info!("DELETE: collection={}, key={}", collection, key);

    if state.records.remove(&collection, &key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound(format!("{}/{}", collection, key)).into())
    }
}
