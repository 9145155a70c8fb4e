//! Key-value operations over the backing document's flat mapping.
//!
//! Every call fetches the whole document. Mutations edit a local copy of the
//! mapping and replace the whole document under the version they fetched, so
//! a concurrent writer makes the replace fail with `Conflict` instead of
//! being overwritten. Writers that fetched before either write landed still
//! race; the store does not serialize them and does not retry conflicts.

use std::sync::Arc;

use async_trait::async_trait;
use crkv_backend::DocumentApi;
use crkv_types::{DataMap, DocumentRef, Key, KeyValue, StorageDocument};
use tracing::debug;

use crate::boot::Bootstrapper;
use crate::config::StoreConfig;
use crate::context::Context;
use crate::error::{Op, StoreError, StoreResult};
use crate::listing::list_under;
use crate::traits::KeyValueStore;

/// A key-value store bound to one backing document.
///
/// Holds no keyspace state between calls; clones of the API handle may be
/// shared freely across tasks.
pub struct Store {
    api: Arc<dyn DocumentApi>,
    config: StoreConfig,
    document: DocumentRef,
}

impl Store {
    /// Create a store. [`KeyValueStore::boot`] must succeed before any other
    /// operation can.
    pub fn new(config: StoreConfig, api: Arc<dyn DocumentApi>) -> StoreResult<Self> {
        config.validate()?;
        let document = config.document();
        Ok(Self {
            api,
            config,
            document,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    async fn fetch_document(
        &self,
        ctx: &Context,
        op: Op,
        key: &Key,
    ) -> StoreResult<StorageDocument> {
        match ctx.run(self.api.get_document(&self.document)).await {
            Ok(Ok(doc)) => Ok(doc),
            Ok(Err(e)) if e.is_not_found() => Err(StoreError::DocumentNotFound {
                op,
                document: self.document.clone(),
            }),
            Ok(Err(e)) => Err(StoreError::Backend {
                op,
                key: Some(key.to_string()),
                source: e,
            }),
            Err(reason) => Err(StoreError::interrupted(op, Some(key.to_string()), reason)),
        }
    }

    async fn fetch_mapping(&self, ctx: &Context, op: Op, key: &Key) -> StoreResult<DataMap> {
        Ok(self.fetch_document(ctx, op, key).await?.into_data())
    }

    /// Replace the document under the version it was fetched with.
    ///
    /// A cancelled write may or may not have been applied; the replace itself
    /// is all-or-nothing.
    async fn write_document(
        &self,
        ctx: &Context,
        op: Op,
        key: &Key,
        document: &StorageDocument,
    ) -> StoreResult<()> {
        match ctx.run(self.api.update_document(document)).await {
            Ok(Ok(updated)) => {
                debug!(
                    document = %self.document,
                    key = %key,
                    version = %updated.resource_version().map(|v| v.as_str()).unwrap_or(""),
                    "document replaced"
                );
                Ok(())
            }
            Ok(Err(e)) if e.is_conflict() => Err(StoreError::Conflict {
                op,
                document: self.document.clone(),
                key: key.to_string(),
                source: e,
            }),
            Ok(Err(e)) if e.is_not_found() => Err(StoreError::DocumentNotFound {
                op,
                document: self.document.clone(),
            }),
            Ok(Err(e)) => Err(StoreError::Backend {
                op,
                key: Some(key.to_string()),
                source: e,
            }),
            Err(reason) => Err(StoreError::interrupted(op, Some(key.to_string()), reason)),
        }
    }
}

#[async_trait]
impl KeyValueStore for Store {
    async fn boot(&self, ctx: &Context) -> StoreResult<()> {
        Bootstrapper::new(self.config.clone(), Arc::clone(&self.api))?
            .boot(ctx)
            .await
    }

    async fn exists(&self, ctx: &Context, key: &Key) -> StoreResult<bool> {
        debug!(document = %self.document, key = %key, "exists");
        let data = self.fetch_mapping(ctx, Op::Exists, key).await?;
        Ok(data.contains_key(key.as_str()))
    }

    async fn search(&self, ctx: &Context, key: &Key) -> StoreResult<KeyValue> {
        debug!(document = %self.document, key = %key, "search");
        let mut data = self.fetch_mapping(ctx, Op::Search, key).await?;
        match data.remove(key.as_str()) {
            Some(value) => Ok(KeyValue::new(key.as_str(), value)),
            None => Err(StoreError::KeyNotFound {
                op: Op::Search,
                key: key.to_string(),
            }),
        }
    }

    async fn list(&self, ctx: &Context, prefix: &Key) -> StoreResult<Vec<KeyValue>> {
        debug!(document = %self.document, prefix = %prefix, "list");
        let data = self.fetch_mapping(ctx, Op::List, prefix).await?;
        Ok(list_under(&data, prefix))
    }

    async fn put(&self, ctx: &Context, key: &Key, value: &str) -> StoreResult<()> {
        debug!(document = %self.document, key = %key, "put");
        let mut doc = self.fetch_document(ctx, Op::Put, key).await?;
        doc.data_mut().insert(key.to_string(), value.to_string());
        self.write_document(ctx, Op::Put, key, &doc).await
    }

    async fn delete(&self, ctx: &Context, key: &Key) -> StoreResult<()> {
        debug!(document = %self.document, key = %key, "delete");
        let mut doc = self.fetch_document(ctx, Op::Delete, key).await?;
        doc.data_mut().remove(key.as_str());
        self.write_document(ctx, Op::Delete, key, &doc).await
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("document", &self.document)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crkv_backend::{BackendError, InMemoryBackend, Operation};
    use crkv_types::ResourceType;
    use std::time::Duration;

    fn key(s: &str) -> Key {
        Key::new(s).unwrap()
    }

    async fn booted() -> (Arc<InMemoryBackend>, Store) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Store::new(StoreConfig::new("kv", "main"), backend.clone()).unwrap();
        store.boot(&Context::background()).await.unwrap();
        (backend, store)
    }

    #[tokio::test]
    async fn operations_before_boot_report_missing_document() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Store::new(StoreConfig::new("kv", "main"), backend).unwrap();
        let ctx = Context::background();

        let err = store.exists(&ctx, &key("/a")).await.unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { op: Op::Exists, .. }));
        let err = store.put(&ctx, &key("/a"), "1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_then_search() {
        let (_backend, store) = booted().await;
        let ctx = Context::background();

        store.put(&ctx, &key("/foo/bar"), "baz").await.unwrap();
        let kv = store.search(&ctx, &key("/foo/bar")).await.unwrap();
        assert_eq!(kv, KeyValue::new("/foo/bar", "baz"));
        assert!(store.exists(&ctx, &key("/foo/bar")).await.unwrap());
    }

    #[tokio::test]
    async fn search_miss_carries_key() {
        let (_backend, store) = booted().await;
        let err = store
            .search(&Context::background(), &key("/nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("key=/nope"));
    }

    #[tokio::test]
    async fn put_overwrites() {
        let (backend, store) = booted().await;
        let ctx = Context::background();
        store.put(&ctx, &key("/k"), "1").await.unwrap();
        store.put(&ctx, &key("/k"), "2").await.unwrap();

        assert_eq!(store.search(&ctx, &key("/k")).await.unwrap().value, "2");
        let doc = backend.document(store.document()).unwrap();
        assert_eq!(doc.data().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_put_leaves_mapping_unchanged() {
        let (backend, store) = booted().await;
        let ctx = Context::background();
        store.put(&ctx, &key("/other"), "x").await.unwrap();

        store.put(&ctx, &key("/k"), "v").await.unwrap();
        let once = backend.document(store.document()).unwrap().into_data();
        store.put(&ctx, &key("/k"), "v").await.unwrap();
        let twice = backend.document(store.document()).unwrap().into_data();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 2);
        assert_eq!(twice.get("/k").map(String::as_str), Some("v"));
    }

    #[tokio::test]
    async fn delete_absent_key_succeeds() {
        let (backend, store) = booted().await;
        store
            .delete(&Context::background(), &key("/ghost"))
            .await
            .unwrap();
        assert_eq!(backend.calls(Operation::UpdateDocument), 1);
    }

    #[tokio::test]
    async fn absent_mapping_reads_as_empty() {
        let backend = Arc::new(InMemoryBackend::new());
        let doc_ref = DocumentRef::new("kv", "main");
        let mut doc = StorageDocument::empty(&doc_ref, &ResourceType::default());
        doc.spec.storage.data = None;
        backend.seed_document(doc).unwrap();

        let store = Store::new(StoreConfig::new("kv", "main"), backend.clone()).unwrap();
        let ctx = Context::background();
        assert!(!store.exists(&ctx, &key("/a")).await.unwrap());
        assert!(store.list(&ctx, &Key::root()).await.unwrap().is_empty());

        store.put(&ctx, &key("/a"), "1").await.unwrap();
        let stored = backend.document(&doc_ref).unwrap();
        assert_eq!(stored.data().unwrap().get("/a").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn fetch_failure_is_backend_error() {
        let (backend, store) = booted().await;
        backend.fail_next(Operation::GetDocument, 1);

        let err = store
            .list(&Context::background(), &key("/a"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Backend { op: Op::List, source: BackendError::Unavailable(_), .. }
        ));
        assert_eq!(backend.calls(Operation::GetDocument), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_document_unchanged() {
        let (backend, store) = booted().await;
        let ctx = Context::background();
        store.put(&ctx, &key("/a"), "1").await.unwrap();
        backend.fail_next(Operation::UpdateDocument, 1);

        let err = store.put(&ctx, &key("/a"), "2").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { op: Op::Put, .. }));
        assert_eq!(store.search(&ctx, &key("/a")).await.unwrap().value, "1");
    }

    async fn concurrent_puts(store: Store) -> [StoreResult<()>; 2] {
        let store = Arc::new(store);
        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put(&Context::background(), &key("/a"), "1").await })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.put(&Context::background(), &key("/b"), "2").await })
        };
        [first.await.unwrap(), second.await.unwrap()]
    }

    #[tokio::test(start_paused = true)]
    async fn stale_write_is_a_conflict() {
        let (backend, store) = booted().await;
        backend.set_latency(Some(Duration::from_millis(20)));

        let results = concurrent_puts(store).await;

        // Both fetched the same version, so the second replace is rejected.
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict { op: Op::Put, .. })))
            .count();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);
        assert_eq!(backend.calls(Operation::UpdateDocument), 2);
    }

    /// Puts to different keys that fetch the same version do not merge: the
    /// later replace is dropped and its key never reaches the mapping. The
    /// losing writer is told through `Conflict`, and retrying is up to it.
    #[tokio::test(start_paused = true)]
    async fn racing_puts_keep_only_one_key() {
        let (backend, store) = booted().await;
        let document = store.document().clone();
        backend.set_latency(Some(Duration::from_millis(20)));

        let results = concurrent_puts(store).await;

        let data = backend.document(&document).unwrap().into_data();
        assert_eq!(data.len(), 1);
        for (written, result) in ["/a", "/b"].into_iter().zip(&results) {
            assert_eq!(data.contains_key(written), result.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_aborts_fetch() {
        let (backend, store) = booted().await;
        backend.set_latency(Some(Duration::from_secs(5)));

        let ctx = Context::with_timeout(Duration::from_millis(100));
        let err = store.put(&ctx, &key("/a"), "1").await.unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded { op: Op::Put, .. }));
        assert_eq!(backend.calls(Operation::UpdateDocument), 0);
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let (backend, store) = booted().await;
        let (ctx, handle) = Context::cancellable();
        handle.cancel();

        let err = store.delete(&ctx, &key("/a")).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled { op: Op::Delete, .. }));
        assert_eq!(backend.calls(Operation::GetDocument), 0);
    }

    #[tokio::test]
    async fn sibling_document_does_not_satisfy_lookup() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Store::new(StoreConfig::new("kv", "other"), backend.clone()).unwrap();
        // Booting a different store must not satisfy this one.
        let sibling = Store::new(StoreConfig::new("kv", "main"), backend).unwrap();
        sibling.boot(&Context::background()).await.unwrap();

        let err = store
            .search(&Context::background(), &key("/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }
}
