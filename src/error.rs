//! Unified error type.

use http::StatusCode;
use tracing::error;

use crate::data::StoreError;
use crate::method::Method;
use crate::response::{IntoResponse, Response};

/// The error type returned by mindless's fallible operations.
///
/// Lookup and routing failures are raised synchronously; store failures wrap
/// the driver's [`StoreError`] so the original cause stays reachable through
/// [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Request parameters ──────────────────────────────────────────────────────
    #[error("key not found: '{key}'")]
    KeyNotFound { key: String },

    #[error("key '{key}' already exists")]
    KeyAlreadyExists { key: String },

    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    // Routing ─────────────────────────────────────────────────────────────────
    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    #[error("invalid route `{path}`: {reason}")]
    InvalidRoute { path: String, reason: String },

    // Table store ─────────────────────────────────────────────────────────────
    #[error("failed reading from table '{table}'")]
    StoreRead {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed writing to table '{table}'")]
    StoreWrite {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("record from table '{table}' does not fit the model: {reason}")]
    Transform { table: String, reason: String },

    // Infrastructure ──────────────────────────────────────────────────────────
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn key_not_found(key: &str) -> Self {
        Self::KeyNotFound { key: key.to_owned() }
    }

    pub(crate) fn key_already_exists(key: &str) -> Self {
        Self::KeyAlreadyExists { key: key.to_owned() }
    }

    /// Status used when the error escapes a handler.
    ///
    /// Only a routing miss is client-visible; everything else is the
    /// framework's internal error boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Renders the error boundary response. Server errors are logged and their
/// text is withheld from the client.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, cause = ?std::error::Error::source(&self), "request failed");
            "Internal Server Error"
        } else {
            status.canonical_reason().unwrap_or("Error")
        };
        Response::builder()
            .status(status)
            .json(serde_json::json!({ "message": message }))
    }
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_key() {
        assert_eq!(Error::key_not_found("abc").to_string(), "key not found: 'abc'");
        assert_eq!(Error::key_already_exists("abc").to_string(), "key 'abc' already exists");
    }

    #[test]
    fn route_not_found_is_404_everything_else_500() {
        let missing = Error::RouteNotFound { method: Method::Get, path: "/x".into() };
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.into_response().status_code(), 404);

        let internal = Error::key_not_found("id").into_response();
        assert_eq!(internal.status_code(), 500);
        assert_eq!(
            internal.into_envelope().body,
            r#"{"message":"Internal Server Error"}"#,
        );
    }
}
