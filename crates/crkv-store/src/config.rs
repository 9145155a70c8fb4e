use std::path::Path;

use crkv_types::names::{validate_document_name, validate_namespace};
use crkv_types::{DocumentRef, ResourceType};
use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::error::{StoreError, StoreResult};

/// Binds a store to exactly one backing document.
///
/// ```toml
/// namespace = "kv"
/// name = "main"
///
/// [retry]
/// max_tries = 7
/// initial_interval_ms = 500
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub namespace: String,
    pub name: String,
    /// Retry schedule for provisioning calls.
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub resource_type: ResourceType,
}

impl StoreConfig {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            retry: RetryPolicy::default(),
            resource_type: ResourceType::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn document(&self) -> DocumentRef {
        DocumentRef::new(&self.namespace, &self.name)
    }

    /// Check every field, failing with `InvalidConfiguration`.
    pub fn validate(&self) -> StoreResult<()> {
        if self.namespace.is_empty() {
            return Err(invalid("config.namespace must not be empty"));
        }
        if self.name.is_empty() {
            return Err(invalid("config.name must not be empty"));
        }
        validate_namespace(&self.namespace).map_err(|e| invalid(format!("config.namespace: {e}")))?;
        validate_document_name(&self.name).map_err(|e| invalid(format!("config.name: {e}")))?;
        self.retry.validate().map_err(|e| invalid(format!("config.{e}")))?;

        let rt = &self.resource_type;
        for (field, value) in [
            ("group", &rt.group),
            ("version", &rt.version),
            ("kind", &rt.kind),
            ("plural", &rt.plural),
        ] {
            if value.is_empty() {
                return Err(invalid(format!(
                    "config.resource_type.{field} must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}

fn invalid(reason: impl Into<String>) -> StoreError {
    StoreError::InvalidConfiguration(reason.into())
}
