//! Hierarchical key-value storage persisted in a single versioned document.
//!
//! The whole keyspace lives in one flat string-to-string mapping inside a
//! document held by a remote control plane. Keys are slash-separated paths;
//! the hierarchy exists only at listing time, where an entry belongs to a
//! prefix when the separator follows the prefix directly.
//!
//! # Lifecycle
//!
//! 1. Optionally register the document's resource type with
//!    [`ensure_resource_type`].
//! 2. [`KeyValueStore::boot`] creates the namespace and the empty document.
//!    It is idempotent and safe across processes.
//! 3. Exists, search, list, put and delete each fetch the document; put and
//!    delete write it back whole under the fetched version.
//!
//! # Modules
//!
//! - [`backoff`] — Exponential retry schedule used during provisioning
//! - [`boot`] — [`Bootstrapper`] and resource-type registration
//! - [`config`] — [`StoreConfig`] and its TOML loader
//! - [`context`] — Cancellation and deadlines for every operation
//! - [`error`] — [`StoreError`] and its classification
//! - [`listing`] — The prefix-listing rule over a flat mapping
//! - [`store`] — [`Store`], the document-backed [`KeyValueStore`]
//! - [`traits`] — The [`KeyValueStore`] trait

pub mod backoff;
pub mod boot;
pub mod config;
pub mod context;
pub mod error;
pub mod listing;
pub mod store;
pub mod traits;

pub use backoff::{retry, ExponentialBackoff, RetryError, RetryPolicy};
pub use boot::{ensure_resource_type, Bootstrapper};
pub use config::StoreConfig;
pub use context::{CancelHandle, Context, Interrupted};
pub use error::{ErrorKind, Op, StoreError, StoreResult};
pub use listing::list_under;
pub use store::Store;
pub use traits::KeyValueStore;
