use std::error::Error;
use thiserror::Error;

/// Result alias for remote store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by remote store backends regardless of the underlying service.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The store rejected the caller's credentials for this path.
    #[error("permission denied on `{path}`")]
    PermissionDenied { path: String },
    /// A stored value could not be decoded into the expected shape.
    #[error("malformed value at `{path}`: {message}")]
    Malformed { path: String, message: String },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a permission-denied error for `path`.
    pub fn permission_denied(path: impl Into<String>) -> Self {
        StoreError::PermissionDenied { path: path.into() }
    }

    /// Whether the backend refused access rather than failing.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied { .. })
    }
}

impl Clone for StoreError {
    fn clone(&self) -> Self {
        match self {
            StoreError::Unavailable { message, source } => StoreError::Unavailable {
                message: message.clone(),
                source: source.to_string().into(),
            },
            StoreError::PermissionDenied { path } => StoreError::PermissionDenied { path: path.clone() },
            StoreError::Malformed { path, message } => StoreError::Malformed {
                path: path.clone(),
                message: message.clone(),
            },
        }
    }
}
