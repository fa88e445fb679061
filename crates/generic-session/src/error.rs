use std::fmt;

use http::{header::CONTENT_TYPE, Response, StatusCode};
use thiserror::Error;

use crate::session_http::{GenericBody, GenericBodyExt};

pub type SessionResult<T> = core::result::Result<T, SessionError>;

/// The store operation a [`SessionError::Store`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Get,
    Set,
    Destroy,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::Get => "get",
            StoreOperation::Set => "set",
            StoreOperation::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Errors reported by a [`SessionStore`](crate::SessionStore) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key does not exist. Never surfaced to request handlers.
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("session store is unavailable")]
    StoreUnavailable,

    #[error("session store {operation} error: {source}")]
    Store {
        operation: StoreOperation,
        #[source]
        source: StoreError,
    },

    #[error("Session serialization error: {0}")]
    Serialization(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("{0}")]
    HttpError(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

impl SessionError {
    pub fn store(operation: StoreOperation, source: StoreError) -> Self {
        SessionError::Store { operation, source }
    }

    /// Returns the store operation if the error is of type `SessionError::Store`.
    pub fn operation(&self) -> Option<StoreOperation> {
        if let SessionError::Store { operation, .. } = self {
            return Some(*operation);
        }
        None
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SessionError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain text error response for hosts that do not map errors themselves.
    pub fn into_http_response(self) -> Response<GenericBody> {
        let mut response = Response::new(GenericBody::from_string(self.to_string()));
        *response.status_mut() = self.status_code();
        response.headers_mut().insert(
            CONTENT_TYPE,
            http::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for SessionError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code(), self.to_string()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
