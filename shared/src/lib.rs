// shared/src/lib.rs

use std::time::Duration;

/// Failure kinds shared by every record-store, cache and factory operation.
///
/// The variant is decided where the failure happens and is carried unchanged
/// up to whoever finally handles it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Field-less mirror of [`Error`] for matching and wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) => ErrorKind::Connection,
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a kind and message, e.g. after crossing the wire.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Connection => Error::Connection(message),
            ErrorKind::Validation => Error::Validation(message),
            ErrorKind::NotFound => Error::NotFound(message),
            ErrorKind::Conflict => Error::Conflict(message),
            ErrorKind::Internal => Error::Internal(message),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Connection(m)
            | Error::Validation(m)
            | Error::NotFound(m)
            | Error::Conflict(m)
            | Error::Internal(m) => m,
        }
    }

    /// Whether a caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Internal(_))
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "connection" => Some(ErrorKind::Connection),
            "validation" => Some(ErrorKind::Validation),
            "not_found" => Some(ErrorKind::NotFound),
            "conflict" => Some(ErrorKind::Conflict),
            "internal" => Some(ErrorKind::Internal),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for TtlMs {
    fn from(d: Duration) -> Self {
        TtlMs(d.as_millis() as u64)
    }
}

pub mod config;
