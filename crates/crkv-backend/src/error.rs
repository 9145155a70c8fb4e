//! Error types for document store operations.

use thiserror::Error;

/// Errors reported by a document store backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The namespace, document or resource type already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// The namespace or document does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    /// An update presented a version that is no longer current.
    #[error("conflict on {name}: presented version {presented}, current version {current}")]
    Conflict {
        name: String,
        presented: String,
        current: String,
    },

    /// The backend could not be reached or failed server-side.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// What kind of backend resource an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Namespace,
    Document,
    ResourceType,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace => f.write_str("namespace"),
            Self::Document => f.write_str("document"),
            Self::ResourceType => f.write_str("resource type"),
        }
    }
}

/// Convenience type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
