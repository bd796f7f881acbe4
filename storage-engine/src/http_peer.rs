use async_trait::async_trait;
use recordstore::patch::apply_merge_patch;
use recordstore::{Connector, Document, MergeGuard, RecordClient, RecordFilter};
use reqwest::{StatusCode, Url};
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Request and error bodies spoken between [`HttpRecordClient`] and a record peer.
pub mod wire {
    use recordstore::Document;
    use serde::{Deserialize, Serialize};
    use shared::{Error, ErrorKind};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InsertRecordBody {
        pub key: String,
        pub document: Document,
    }

    /// `expected` is the merged document the caller validated. The peer
    /// commits only if applying `patch` to its current copy yields exactly
    /// that document, and answers 409 otherwise.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MergeRecordBody {
        pub patch: Document,
        pub expected: Document,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        pub error: String,
        pub message: String,
    }

    impl ErrorBody {
        pub fn from_error(err: &Error) -> Self {
            Self {
                error: err.kind().as_str().to_string(),
                message: err.message().to_string(),
            }
        }

        /// Falls back to the status code when the kind is unknown.
        pub fn into_error(self, status: u16) -> Error {
            let kind = ErrorKind::parse(&self.error).unwrap_or_else(|| kind_for_status(status));
            Error::from_kind(kind, self.message)
        }
    }

    pub fn status_for(kind: ErrorKind) -> u16 {
        match kind {
            ErrorKind::Connection => 503,
            ErrorKind::Validation => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    pub fn kind_for_status(status: u16) -> ErrorKind {
        match status {
            400 | 422 => ErrorKind::Validation,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            502..=504 => ErrorKind::Connection,
            _ => ErrorKind::Internal,
        }
    }
}

use wire::{ErrorBody, InsertRecordBody, MergeRecordBody, kind_for_status};

const MAX_MERGE_ATTEMPTS: usize = 16;

fn transport_err(context: &str, e: reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Internal(format!("{}: undecodable peer response: {}", context, e))
    } else {
        Error::Connection(format!("{}: {}", context, e))
    }
}

/// Record client that forwards every verb to a remote record peer over REST.
#[derive(Clone, Debug)]
pub struct HttpRecordClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpRecordClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Connection(format!("invalid peer url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Connection(format!("peer url '{}' cannot be a base", base_url)));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| transport_err("build http client", e))?;

        Ok(Self { http, base_url })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn record_url(&self, collection: &str, key: &str) -> Url {
        self.url(&["collections", collection, "records", key])
    }

    /// Probe `GET /health`. Any failure is a connection failure.
    #[tracing::instrument(level = "debug", skip(self), fields(peer = %self.base_url))]
    pub async fn health(&self) -> Result<()> {
        let response = self
            .http
            .get(self.url(&["health"]))
            .send()
            .await
            .map_err(|e| Error::Connection(format!("peer health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Connection(format!(
                "peer health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn error_from(response: reqwest::Response) -> Error {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => body.into_error(status.as_u16()),
            Err(_) => Error::from_kind(
                kind_for_status(status.as_u16()),
                format!("peer returned {}", status),
            ),
        }
    }
}

#[async_trait]
impl RecordClient for HttpRecordClient {
    async fn insert(&self, collection: &str, key: &str, document: Document) -> Result<Document> {
        let response = self
            .http
            .post(self.url(&["collections", collection, "records"]))
            .json(&InsertRecordBody {
                key: key.to_string(),
                document,
            })
            .send()
            .await
            .map_err(|e| transport_err("insert", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response.json().await.map_err(|e| transport_err("insert", e))
    }

    async fn fetch(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        let response = self
            .http
            .get(self.record_url(collection, key))
            .send()
            .await
            .map_err(|e| transport_err("fetch", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => response
                .json()
                .await
                .map(Some)
                .map_err(|e| transport_err("fetch", e)),
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn scan(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Document>> {
        let response = self
            .http
            .post(self.url(&["collections", collection, "query"]))
            .json(filter)
            .send()
            .await
            .map_err(|e| transport_err("scan", e))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response.json().await.map_err(|e| transport_err("scan", e))
    }

    /// The guard runs on a local preview. The PATCH carries that preview and
    /// the peer commits only if its own merge produces the same document, so
    /// nothing the guard did not see is written. A stale preview is redone.
    async fn merge(
        &self,
        collection: &str,
        key: &str,
        patch: &Document,
        guard: MergeGuard<'_>,
    ) -> Result<Option<Document>> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let Some(mut preview) = self.fetch(collection, key).await? else {
                return Ok(None);
            };
            apply_merge_patch(&mut preview, patch);
            guard(&preview)?;

            let response = self
                .http
                .patch(self.record_url(collection, key))
                .json(&MergeRecordBody {
                    patch: patch.clone(),
                    expected: preview,
                })
                .send()
                .await
                .map_err(|e| transport_err("merge", e))?;

            match response.status() {
                StatusCode::NOT_FOUND => {
                    debug!("{}/{} vanished between preview and patch", collection, key);
                    return Ok(None);
                }
                StatusCode::CONFLICT => {
                    debug!(
                        "{}/{} changed under merge attempt {}, retrying",
                        collection, key, attempt
                    );
                }
                s if s.is_success() => {
                    return response
                        .json()
                        .await
                        .map(Some)
                        .map_err(|e| transport_err("merge", e));
                }
                _ => return Err(Self::error_from(response).await),
            }
        }

        Err(Error::Conflict(format!(
            "{}/{} kept changing during {} merge attempts",
            collection, key, MAX_MERGE_ATTEMPTS
        )))
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<bool> {
        let response = self
            .http
            .delete(self.record_url(collection, key))
            .send()
            .await
            .map_err(|e| transport_err("remove", e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(Self::error_from(response).await),
        }
    }
}

/// Connects to a record peer and checks it answers before handing out a client.
#[derive(Clone, Debug)]
pub struct HttpPeerConnector {
    base_url: String,
    timeout: Duration,
}

impl HttpPeerConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Connector for HttpPeerConnector {
    type Client = HttpRecordClient;

    async fn connect(&self) -> Result<Arc<HttpRecordClient>> {
        let client = HttpRecordClient::new(&self.base_url, self.timeout)?;
        client.health().await.inspect_err(|e| {
            warn!("Record peer {} is not healthy: {}", self.base_url, e);
        })?;
        Ok(Arc::new(client))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordstore::ClientFactory;
    use shared::ErrorKind;

    #[test]
    fn test_status_mapping_round_trips() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Internal,
            ErrorKind::Connection,
        ] {
            assert_eq!(wire::kind_for_status(wire::status_for(kind)), kind);
        }
        assert_eq!(wire::kind_for_status(400), ErrorKind::Validation);
        assert_eq!(wire::kind_for_status(418), ErrorKind::Internal);
    }

    #[test]
    fn test_error_body_keeps_kind() {
        let body = ErrorBody::from_error(&Error::Conflict("tasks/t1".into()));
        assert_eq!(body.error, "conflict");
        assert_eq!(body.into_error(500), Error::Conflict("tasks/t1".into()));

        let unknown = ErrorBody {
            error: "mystery".into(),
            message: "?".into(),
        };
        assert_eq!(unknown.into_error(404), Error::NotFound("?".into()));
    }

    #[test]
    fn test_keys_are_path_encoded() {
        let client = HttpRecordClient::new("http://peer:9000/api/", Duration::from_secs(1)).unwrap();
        let url = client.record_url("tasks", "a/b c");
        assert_eq!(
            url.as_str(),
            "http://peer:9000/api/collections/tasks/records/a%2Fb%20c"
        );
    }

    #[test]
    fn test_invalid_url_is_connection_error() {
        let err = HttpRecordClient::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_unreachable_peer_fails_without_poisoning() {
        let factory = ClientFactory::new(HttpPeerConnector::new(
            "http://127.0.0.1:1",
            Duration::from_millis(500),
        ));

        for _ in 0..2 {
            let err = factory.get_client().await.unwrap_err();
            assert!(matches!(err, Error::Connection(_)));
            assert!(!factory.is_connected().await);
        }
    }
}
