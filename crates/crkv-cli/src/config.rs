//! CLI configuration: an optional TOML file overridden by flags.
//!
//! ```toml
//! [store]
//! namespace = "kv"
//! name = "main"
//!
//! [backend]
//! data_dir = "/var/lib/crkv"
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use crkv_store::StoreConfig;
use serde::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_DATA_DIR: &str = ".crkv";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_NAME: &str = "storage";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub store: Option<StoreConfig>,
    pub backend: BackendSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub data_dir: Option<PathBuf>,
}

/// Everything a command needs, after merging file and flags.
#[derive(Debug)]
pub struct Resolved {
    pub store: StoreConfig,
    pub data_dir: PathBuf,
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply flag overrides. Validation is left to the store.
    pub fn resolve(self, cli: &Cli) -> Resolved {
        let mut store = self
            .store
            .unwrap_or_else(|| StoreConfig::new(DEFAULT_NAMESPACE, DEFAULT_NAME));
        if let Some(namespace) = &cli.namespace {
            store.namespace = namespace.clone();
        }
        if let Some(name) = &cli.name {
            store.name = name.clone();
        }
        let data_dir = cli
            .data_dir
            .clone()
            .or(self.backend.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Resolved { store, data_dir }
    }
}

/// Load the file named by `--config`, if any, and merge the flags over it.
pub fn resolve(cli: &Cli) -> anyhow::Result<Resolved> {
    let file = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    Ok(file.resolve(cli))
}
