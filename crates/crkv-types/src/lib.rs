//! Foundation types for crkv.
//!
//! crkv stores a hierarchical keyspace as one flat mapping embedded in a
//! single versioned document held by a remote control plane. This crate holds
//! the value objects shared by the backend and store crates.
//!
//! # Key Types
//!
//! - [`Key`] — normalized slash-delimited path such as `/foo/bar`
//! - [`KeyValue`] — a key/value pair returned by lookups and listings
//! - [`DocumentRef`] — `(namespace, name)` identity of a backing document
//! - [`StorageDocument`] — the versioned document carrying the mapping
//! - [`ResourceVersion`] — opaque version token used for optimistic writes
//! - [`ResourceType`] — registration record for the document's type

pub mod document;
pub mod error;
pub mod key;
pub mod names;

pub use document::{
    DataMap, DocumentRef, ObjectMeta, ResourceType, ResourceVersion, StorageData,
    StorageDocument, StorageSpec,
};
pub use error::TypeError;
pub use key::{Key, KeyValue, SEPARATOR};
