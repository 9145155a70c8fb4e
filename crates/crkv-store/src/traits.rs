use async_trait::async_trait;
use crkv_types::{Key, KeyValue};

use crate::context::Context;
use crate::error::StoreResult;

/// The hierarchical key-value contract.
///
/// Callers program against this trait and stay agnostic of how the keyspace
/// is persisted. Every method takes a [`Context`]; when it fires, the method
/// returns a Cancelled-class error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Provision whatever the store needs. Safe to call more than once.
    async fn boot(&self, ctx: &Context) -> StoreResult<()>;

    async fn exists(&self, ctx: &Context, key: &Key) -> StoreResult<bool>;

    /// Look up `key`, failing with a NotFound-class error on a miss.
    async fn search(&self, ctx: &Context, key: &Key) -> StoreResult<KeyValue>;

    /// Entries strictly under `prefix`, with keys relative to it. The root
    /// prefix returns every entry with its full key.
    async fn list(&self, ctx: &Context, prefix: &Key) -> StoreResult<Vec<KeyValue>>;

    /// Insert or overwrite `key`.
    async fn put(&self, ctx: &Context, key: &Key, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, ctx: &Context, key: &Key) -> StoreResult<()>;
}
