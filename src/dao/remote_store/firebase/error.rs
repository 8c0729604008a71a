//! Error types shared by the realtime-database storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StoreError;

/// Convenient result alias returning [`FirebaseError`] failures.
pub type FirebaseResult<T> = Result<T, FirebaseError>;

/// Failures that can occur while interacting with the realtime database REST API.
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build realtime database client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request to a path could not be sent.
    #[error("failed to send realtime database request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Security rules rejected the request.
    #[error("permission denied for `{path}`")]
    PermissionDenied { path: String },
    /// The database returned an unexpected status code.
    #[error("unexpected realtime database response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode realtime database response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The event stream broke while reading.
    #[error("event stream for `{path}` failed")]
    Stream {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server ended the event stream.
    #[error("event stream for `{path}` closed by the server")]
    StreamClosed { path: String },
    /// An event carried a payload that does not follow the streaming protocol.
    #[error("malformed stream event for `{path}`: {message}")]
    MalformedEvent { path: String, message: String },
}

impl From<FirebaseError> for StoreError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::PermissionDenied { path } => StoreError::permission_denied(path),
            FirebaseError::MalformedEvent { path, message } => {
                StoreError::Malformed { path, message }
            }
            other => StoreError::unavailable(other.to_string(), other),
        }
    }
}
