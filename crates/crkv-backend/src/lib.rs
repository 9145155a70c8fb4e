//! Document store backends for crkv.
//!
//! The store crate talks to the remote control plane only through the
//! [`DocumentApi`] trait: namespace creation plus create/get/update of
//! versioned documents scoped by `(namespace, name)`. Resource-type
//! registration sits behind [`ResourceTypeRegistrar`] and is the embedding
//! application's responsibility.
//!
//! # Backends
//!
//! - [`InMemoryBackend`] — map-based store with failure injection, for tests
//! - [`FileBackend`] — one JSON file per document, used by the CLI
//!
//! # Contract
//!
//! 1. Every call is one round trip; nothing is cached between calls.
//! 2. Updates replace the whole document and are guarded by `resourceVersion`.
//! 3. A rejected update leaves the stored document untouched.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult, ResourceKind};
pub use file::FileBackend;
pub use memory::{InMemoryBackend, Operation};
pub use traits::{DocumentApi, ResourceTypeRegistrar};
