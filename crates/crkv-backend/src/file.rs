//! File-backed document store.
//!
//! Layout under the root directory:
//!
//! - `<namespace>/` — one directory per namespace
//! - `<namespace>/<name>.json` — one JSON file per document
//! - `.resource-types/<plural.group>.json` — registered resource types
//!
//! Documents are replaced by writing a temporary file in the same directory
//! and renaming it over the target, so readers observe either the old or the
//! new document. Version checks are serialized within one process only; two
//! processes updating the same file can still interleave between the check
//! and the rename. Within a process the lock is held by the blocking task
//! itself, so an update abandoned by its caller still finishes before the
//! next one reads the version.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crkv_types::{DocumentRef, ResourceType, ResourceVersion, StorageDocument};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BackendError, BackendResult, ResourceKind};
use crate::traits::{DocumentApi, ResourceTypeRegistrar};

const RESOURCE_TYPES_DIR: &str = ".resource-types";

/// A [`DocumentApi`] persisting documents as JSON files.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileBackend {
    /// Open (or create) a file store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> BackendResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "file backend opened");
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn document_path(&self, document: &DocumentRef) -> PathBuf {
        self.namespace_dir(&document.namespace)
            .join(format!("{}.json", document.name))
    }
}

/// Run blocking file IO off the async executor.
async fn blocking<T, F>(f: F) -> BackendResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> BackendResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BackendError::Unavailable(format!("blocking task failed: {e}")))?
}

fn read_document(path: &Path, document: &DocumentRef) -> BackendResult<StorageDocument> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackendError::NotFound {
            kind: ResourceKind::Document,
            name: document.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Serialize into a temporary file next to `path`.
fn stage(path: &Path, document: &StorageDocument) -> BackendResult<NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| BackendError::Invalid(format!("no parent for {}", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, document)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn next_version(current: Option<&ResourceVersion>) -> BackendResult<ResourceVersion> {
    let last = match current {
        Some(v) => v.as_str().parse::<u64>().map_err(|e| {
            BackendError::Serialization(format!("unreadable resourceVersion {v}: {e}"))
        })?,
        None => 0,
    };
    Ok(ResourceVersion::new((last + 1).to_string()))
}

#[async_trait]
impl DocumentApi for FileBackend {
    async fn create_namespace(&self, name: &str) -> BackendResult<()> {
        let dir = self.namespace_dir(name);
        let name = name.to_string();
        blocking(move || match std::fs::create_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(BackendError::AlreadyExists {
                    kind: ResourceKind::Namespace,
                    name,
                })
            }
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn create_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument> {
        let key = document.document_ref();
        let ns_dir = self.namespace_dir(&key.namespace);
        let path = self.document_path(&key);

        let mut created = document.clone();
        created.metadata.resource_version = Some(next_version(None)?);
        created.metadata.uid = Some(Uuid::now_v7());
        created.metadata.creation_timestamp = Some(Utc::now());

        blocking(move || {
            if !ns_dir.is_dir() {
                return Err(BackendError::NotFound {
                    kind: ResourceKind::Namespace,
                    name: key.namespace,
                });
            }
            let tmp = stage(&path, &created)?;
            match tmp.persist_noclobber(&path) {
                Ok(_) => Ok(created),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    Err(BackendError::AlreadyExists {
                        kind: ResourceKind::Document,
                        name: key.to_string(),
                    })
                }
                Err(e) => Err(e.error.into()),
            }
        })
        .await
    }

    async fn get_document(&self, document: &DocumentRef) -> BackendResult<StorageDocument> {
        let path = self.document_path(document);
        let document = document.clone();
        blocking(move || read_document(&path, &document)).await
    }

    async fn update_document(&self, document: &StorageDocument) -> BackendResult<StorageDocument> {
        let key = document.document_ref();
        let path = self.document_path(&key);
        let mut updated = document.clone();

        // Held by the blocking task until the rename completes.
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        blocking(move || {
            let _guard = guard;
            let current = read_document(&path, &key)?;
            let Some(presented) = updated.resource_version().cloned() else {
                return Err(BackendError::Invalid(format!(
                    "update of {key} must carry a resourceVersion"
                )));
            };
            if current.resource_version() != Some(&presented) {
                return Err(BackendError::Conflict {
                    name: key.to_string(),
                    presented: presented.to_string(),
                    current: current
                        .resource_version()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                });
            }

            updated.metadata.uid = current.metadata.uid;
            updated.metadata.creation_timestamp = current.metadata.creation_timestamp;
            updated.metadata.resource_version = Some(next_version(Some(&presented))?);

            let tmp = stage(&path, &updated)?;
            tmp.persist(&path).map_err(|e| BackendError::Io(e.error))?;
            Ok(updated)
        })
        .await
    }
}

#[async_trait]
impl ResourceTypeRegistrar for FileBackend {
    async fn ensure_registered(&self, resource_type: &ResourceType) -> BackendResult<()> {
        let dir = self.root.join(RESOURCE_TYPES_DIR);
        let path = dir.join(format!("{}.json", resource_type.qualified_name()));
        let resource_type = resource_type.clone();
        blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let bytes = serde_json::to_vec_pretty(&resource_type)?;
            std::fs::write(&path, bytes)?;
            Ok(())
        })
        .await
    }
}
