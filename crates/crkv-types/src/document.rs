use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The flat mapping that materializes the whole keyspace.
pub type DataMap = BTreeMap<String, String>;

/// Identity of a backing document: `(namespace, name)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    pub namespace: String,
    pub name: String,
}

impl DocumentRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque version token assigned by the backend on every write.
///
/// Tokens are only compared for equality; callers never interpret them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration record describing the document's resource type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceType {
    /// `group/version`, as carried in every document's `apiVersion`.
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Fully qualified registration name, `plural.group`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.plural, self.group)
    }
}

impl Default for ResourceType {
    fn default() -> Self {
        Self {
            group: "core.crkv.dev".into(),
            version: "v1alpha1".into(),
            kind: "StorageConfig".into(),
            plural: "storageconfigs".into(),
        }
    }
}

/// Backend-managed metadata of a stored document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<ResourceVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    #[serde(default)]
    pub storage: StorageData,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageData {
    /// Absent on documents written without a mapping; read as empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataMap>,
}

/// The single versioned document holding an entire keyspace.
///
/// Serialized shape:
///
/// ```json
/// {
///   "apiVersion": "core.crkv.dev/v1alpha1",
///   "kind": "StorageConfig",
///   "metadata": { "name": "main", "namespace": "kv", "resourceVersion": "3" },
///   "spec": { "storage": { "data": { "/a": "1" } } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: StorageSpec,
}

impl StorageDocument {
    /// A new, unversioned document with an empty mapping.
    pub fn empty(document: &DocumentRef, resource_type: &ResourceType) -> Self {
        Self {
            api_version: resource_type.api_version(),
            kind: resource_type.kind.clone(),
            metadata: ObjectMeta {
                name: document.name.clone(),
                namespace: document.namespace.clone(),
                ..ObjectMeta::default()
            },
            spec: StorageSpec {
                storage: StorageData {
                    data: Some(DataMap::new()),
                },
            },
        }
    }

    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn resource_version(&self) -> Option<&ResourceVersion> {
        self.metadata.resource_version.as_ref()
    }

    /// The mapping, if the attribute is present.
    pub fn data(&self) -> Option<&DataMap> {
        self.spec.storage.data.as_ref()
    }

    /// Mutable access to the mapping, initializing it to empty if absent.
    pub fn data_mut(&mut self) -> &mut DataMap {
        self.spec.storage.data.get_or_insert_with(DataMap::new)
    }

    /// Consume the document, returning the mapping or an empty one.
    pub fn into_data(self) -> DataMap {
        self.spec.storage.data.unwrap_or_default()
    }
}
