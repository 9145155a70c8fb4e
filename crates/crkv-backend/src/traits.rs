use async_trait::async_trait;
use crkv_types::{DocumentRef, ResourceType, StorageDocument};

use crate::error::BackendResult;

/// Remote control plane holding namespaces and versioned documents.
///
/// Implementations must be thread-safe (`Send + Sync`). Every call is a single
/// round trip; implementations never cache documents between calls.
///
/// - Creates fail with `AlreadyExists` when the target is already present.
/// - `get_document` fails with `NotFound` when the document is absent.
/// - `update_document` replaces the whole document in one step. It fails with
///   `Conflict` when the presented `resourceVersion` is not the current one,
///   and with `NotFound` when the document no longer exists.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    async fn create_namespace(&self, name: &str) -> BackendResult<()>;

    /// Create a document. The returned copy carries the assigned version.
    async fn create_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument>;

    async fn get_document(&self, document: &DocumentRef) -> BackendResult<StorageDocument>;

    /// Replace a document, guarded by its `resourceVersion`. The returned copy
    /// carries the new version.
    async fn update_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument>;
}

/// Registers the document's resource type with the control plane.
///
/// Registration is a precondition for creating documents. It is run by the
/// embedding application before bootstrapping a store.
#[async_trait]
pub trait ResourceTypeRegistrar: Send + Sync {
    /// Register `resource_type`, succeeding if it is already registered.
    async fn ensure_registered(&self, resource_type: &ResourceType) -> BackendResult<()>;
}
