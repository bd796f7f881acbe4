use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use storage_engine::http_peer::wire::{ErrorBody, status_for};
use tracing::error;

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}

/// A `shared::Error` rendered as `{"error": kind, "message": text}`.
#[derive(Debug)]
pub struct ApiError(pub shared::Error);

impl From<shared::Error> for ApiError {
    fn from(err: shared::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(status_for(self.0.kind()))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorBody::from_error(&self.0))).into_response()
    }
}
