use std::fmt;

use crkv_backend::BackendError;
use crkv_types::DocumentRef;

use crate::context::Interrupted;

/// Store operation names, carried by every error for diagnosis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Boot,
    RegisterResourceType,
    Exists,
    Search,
    List,
    Put,
    Delete,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boot => "boot",
            Self::RegisterResourceType => "register resource type",
            Self::Exists => "exists",
            Self::Search => "search",
            Self::List => "list",
            Self::Put => "put",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Coarse error classes of the key-value contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    NotFound,
    Conflict,
    Backend,
    Cancelled,
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A construction parameter is missing or malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The key is not present in the mapping.
    #[error("{op} key={key}: key not found")]
    KeyNotFound { op: Op, key: String },

    /// The backing document does not exist; the store was not booted.
    #[error("{op}: backing document {document} not found")]
    DocumentNotFound { op: Op, document: DocumentRef },

    /// The document changed between fetch and write.
    #[error("{op} key={key}: backing document {document} was modified concurrently")]
    Conflict {
        op: Op,
        document: DocumentRef,
        key: String,
        #[source]
        source: BackendError,
    },

    /// Transport, authentication or server-side failure.
    #[error("{op}{}: {source}", key_suffix(.key))]
    Backend {
        op: Op,
        key: Option<String>,
        #[source]
        source: BackendError,
    },

    /// The caller cancelled the operation.
    #[error("{op}{}: cancelled", key_suffix(.key))]
    Cancelled { op: Op, key: Option<String> },

    /// The caller's deadline passed before the operation finished.
    #[error("{op}{}: deadline exceeded", key_suffix(.key))]
    DeadlineExceeded { op: Op, key: Option<String> },
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref().map(|k| format!(" key={k}")).unwrap_or_default()
}

impl StoreError {
    pub(crate) fn interrupted(op: Op, key: Option<String>, reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => Self::Cancelled { op, key },
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded { op, key },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::KeyNotFound { .. } | Self::DocumentNotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
