//! In-memory document store for testing and ephemeral use.
//!
//! [`InMemoryBackend`] keeps namespaces, documents and registered resource
//! types in maps behind a single `RwLock`. Version tokens come from one
//! monotonically increasing counter, so every successful write produces a
//! token that was never issued before.
//!
//! The backend also carries test hooks: injected failures, artificial
//! latency and per-operation call counters.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use crkv_types::{DocumentRef, ResourceType, ResourceVersion, StorageDocument};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BackendError, BackendResult, ResourceKind};
use crate::traits::{DocumentApi, ResourceTypeRegistrar};

/// Backend calls, used to target injected failures and count calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateNamespace,
    CreateDocument,
    GetDocument,
    UpdateDocument,
    EnsureRegistered,
}

#[derive(Debug, Default)]
struct State {
    namespaces: HashSet<String>,
    documents: HashMap<DocumentRef, StorageDocument>,
    resource_types: HashSet<String>,
    last_version: u64,
}

impl State {
    fn next_version(&mut self) -> ResourceVersion {
        self.last_version += 1;
        ResourceVersion::new(self.last_version.to_string())
    }
}

#[derive(Debug, Default)]
struct Hooks {
    failures: HashMap<Operation, usize>,
    calls: HashMap<Operation, usize>,
    latency: Option<Duration>,
}

/// An in-memory implementation of [`DocumentApi`] and
/// [`ResourceTypeRegistrar`].
///
/// Data is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
    hooks: Mutex<Hooks>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `op` fail with `Unavailable`.
    pub fn fail_next(&self, op: Operation, count: usize) {
        if let Ok(mut hooks) = self.hooks.lock() {
            *hooks.failures.entry(op).or_default() += count;
        }
    }

    /// Delay every call by `latency` before it touches any state.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut hooks) = self.hooks.lock() {
            hooks.latency = latency;
        }
    }

    /// Number of calls of `op` seen so far, including failed ones.
    pub fn calls(&self, op: Operation) -> usize {
        self.hooks
            .lock()
            .map(|hooks| hooks.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Peek at a stored document without counting a call.
    pub fn document(&self, document: &DocumentRef) -> Option<StorageDocument> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.documents.get(document).cloned())
    }

    /// Number of stored documents across all namespaces.
    pub fn document_count(&self) -> usize {
        self.state.read().map(|s| s.documents.len()).unwrap_or(0)
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state
            .read()
            .map(|s| s.namespaces.contains(name))
            .unwrap_or(false)
    }

    pub fn is_registered(&self, resource_type: &ResourceType) -> bool {
        self.state
            .read()
            .map(|s| s.resource_types.contains(&resource_type.qualified_name()))
            .unwrap_or(false)
    }

    /// Store a document as-is, bypassing create semantics, and assign it a
    /// fresh version. The namespace is created if missing.
    pub fn seed_document(&self, mut document: StorageDocument) -> BackendResult<StorageDocument> {
        let mut state = self.write_state()?;
        state.namespaces.insert(document.metadata.namespace.clone());
        document.metadata.resource_version = Some(state.next_version());
        state
            .documents
            .insert(document.document_ref(), document.clone());
        Ok(document)
    }

    /// Record the call, apply latency and consume an injected failure.
    async fn enter(&self, op: Operation) -> BackendResult<()> {
        let (latency, fail) = {
            let mut hooks = self
                .hooks
                .lock()
                .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))?;
            *hooks.calls.entry(op).or_default() += 1;
            let fail = match hooks.failures.get_mut(&op) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };
            (hooks.latency, fail)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if fail {
            debug!(?op, "injected backend failure");
            return Err(BackendError::Unavailable(format!("injected failure for {op:?}")));
        }
        Ok(())
    }

    fn read_state(&self) -> BackendResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> BackendResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| BackendError::Unavailable(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl DocumentApi for InMemoryBackend {
    async fn create_namespace(&self, name: &str) -> BackendResult<()> {
        self.enter(Operation::CreateNamespace).await?;
        let mut state = self.write_state()?;
        if !state.namespaces.insert(name.to_string()) {
            return Err(BackendError::AlreadyExists {
                kind: ResourceKind::Namespace,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn create_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument> {
        self.enter(Operation::CreateDocument).await?;
        let key = document.document_ref();
        let mut state = self.write_state()?;

        if !state.namespaces.contains(&key.namespace) {
            return Err(BackendError::NotFound {
                kind: ResourceKind::Namespace,
                name: key.namespace,
            });
        }
        if state.documents.contains_key(&key) {
            return Err(BackendError::AlreadyExists {
                kind: ResourceKind::Document,
                name: key.to_string(),
            });
        }

        let mut created = document.clone();
        created.metadata.resource_version = Some(state.next_version());
        created.metadata.uid = Some(Uuid::now_v7());
        created.metadata.creation_timestamp = Some(Utc::now());
        state.documents.insert(key, created.clone());
        Ok(created)
    }

    async fn get_document(&self, document: &DocumentRef) -> BackendResult<StorageDocument> {
        self.enter(Operation::GetDocument).await?;
        let state = self.read_state()?;
        state
            .documents
            .get(document)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                kind: ResourceKind::Document,
                name: document.to_string(),
            })
    }

    async fn update_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument> {
        self.enter(Operation::UpdateDocument).await?;
        let key = document.document_ref();
        let mut state = self.write_state()?;

        let current = state
            .documents
            .get(&key)
            .ok_or_else(|| BackendError::NotFound {
                kind: ResourceKind::Document,
                name: key.to_string(),
            })?;

        let Some(presented) = document.resource_version() else {
            return Err(BackendError::Invalid(format!(
                "update of {key} must carry a resourceVersion"
            )));
        };
        if current.resource_version() != Some(presented) {
            return Err(BackendError::Conflict {
                name: key.to_string(),
                presented: presented.to_string(),
                current: current
                    .resource_version()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            });
        }

        let mut updated = document.clone();
        updated.metadata.uid = current.metadata.uid;
        updated.metadata.creation_timestamp = current.metadata.creation_timestamp;
        updated.metadata.resource_version = Some(state.next_version());
        state.documents.insert(key, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl ResourceTypeRegistrar for InMemoryBackend {
    async fn ensure_registered(&self, resource_type: &ResourceType) -> BackendResult<()> {
        self.enter(Operation::EnsureRegistered).await?;
        let mut state = self.write_state()?;
        state.resource_types.insert(resource_type.qualified_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_ref() -> DocumentRef {
        DocumentRef::new("kv", "main")
    }

    fn empty_doc() -> StorageDocument {
        StorageDocument::empty(&doc_ref(), &ResourceType::default())
    }

    async fn provisioned() -> (InMemoryBackend, StorageDocument) {
        let backend = InMemoryBackend::new();
        backend.create_namespace("kv").await.unwrap();
        let doc = backend.create_document(&empty_doc()).await.unwrap();
        (backend, doc)
    }

    #[tokio::test]
    async fn create_namespace_twice_reports_already_exists() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("kv").await.unwrap();
        let err = backend.create_namespace("kv").await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(backend.has_namespace("kv"));
    }

    #[tokio::test]
    async fn create_document_requires_namespace() {
        let backend = InMemoryBackend::new();
        let err = backend.create_document(&empty_doc()).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::NotFound { kind: ResourceKind::Namespace, .. }
        ));
    }

    #[tokio::test]
    async fn create_assigns_metadata() {
        let (_backend, doc) = provisioned().await;
        assert!(doc.resource_version().is_some());
        assert!(doc.metadata.uid.is_some());
        assert!(doc.metadata.creation_timestamp.is_some());
    }

    #[tokio::test]
    async fn create_document_twice_reports_already_exists() {
        let (backend, _) = provisioned().await;
        let err = backend.create_document(&empty_doc()).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(backend.document_count(), 1);
    }

    #[tokio::test]
    async fn get_missing_document_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.get_document(&doc_ref()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let (backend, mut doc) = provisioned().await;
        let before = doc.resource_version().cloned();
        doc.data_mut().insert("/a".into(), "1".into());

        let updated = backend.update_document(&doc).await.unwrap();
        assert_ne!(updated.resource_version().cloned(), before);
        assert_eq!(updated.metadata.uid, doc.metadata.uid);

        let stored = backend.get_document(&doc_ref()).await.unwrap();
        assert_eq!(stored.data().unwrap().get("/a").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let (backend, doc) = provisioned().await;
        let mut first = doc.clone();
        first.data_mut().insert("/a".into(), "1".into());
        backend.update_document(&first).await.unwrap();

        let mut stale = doc;
        stale.data_mut().insert("/b".into(), "2".into());
        let err = backend.update_document(&stale).await.unwrap_err();
        assert!(err.is_conflict(), "expected conflict, got: {err}");

        let stored = backend.get_document(&doc_ref()).await.unwrap();
        assert!(!stored.data().unwrap().contains_key("/b"));
    }

    #[tokio::test]
    async fn update_without_version_is_invalid() {
        let (backend, _) = provisioned().await;
        let err = backend.update_document(&empty_doc()).await.unwrap_err();
        assert!(matches!(err, BackendError::Invalid(_)));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let backend = InMemoryBackend::new();
        let mut doc = empty_doc();
        doc.metadata.resource_version = Some(ResourceVersion::new("1"));
        let err = backend.update_document(&doc).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Operation::CreateNamespace, 2);

        assert!(backend.create_namespace("kv").await.is_err());
        assert!(backend.create_namespace("kv").await.is_err());
        backend.create_namespace("kv").await.unwrap();
        assert_eq!(backend.calls(Operation::CreateNamespace), 3);
    }

    #[tokio::test]
    async fn seed_document_keeps_absent_mapping() {
        let backend = InMemoryBackend::new();
        let mut doc = empty_doc();
        doc.spec.storage.data = None;
        let seeded = backend.seed_document(doc).unwrap();
        assert!(seeded.resource_version().is_some());

        let fetched = backend.get_document(&doc_ref()).await.unwrap();
        assert!(fetched.data().is_none());
        assert_eq!(backend.calls(Operation::GetDocument), 1);
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let backend = InMemoryBackend::new();
        let rt = ResourceType::default();
        backend.ensure_registered(&rt).await.unwrap();
        backend.ensure_registered(&rt).await.unwrap();
        assert!(backend.is_registered(&rt));
    }
}
