// Node configuration
//
// Layered: built-in defaults, then an optional TOML file, then
// TESSERA_* environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_core::{Database, MemDb, SledDb, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load node configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("chain id must not be empty")]
    EmptyChainId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbBackend {
    /// Lost on exit; for tests and throwaway devnets
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub home: PathBuf,
    pub chain_id: String,
    pub db_backend: DbBackend,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            home: PathBuf::from(".tessera"),
            chain_id: "tessera-devnet".to_string(),
            db_backend: DbBackend::Sled,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = NodeConfig::default();
        let mut builder = Config::builder()
            .set_default("home", defaults.home.to_string_lossy().into_owned())?
            .set_default("chain_id", defaults.chain_id)?
            .set_default("db_backend", "sled")?
            .set_default("log_level", defaults.log_level)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix("TESSERA"));

        let config: NodeConfig = builder.build()?.try_deserialize()?;
        if config.chain_id.trim().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.home.join("data")
    }

    pub fn open_database(&self) -> Result<Arc<dyn Database>, StoreError> {
        match self.db_backend {
            DbBackend::Memory => Ok(Arc::new(MemDb::new())),
            DbBackend::Sled => Ok(Arc::new(SledDb::open(self.db_path())?)),
        }
    }
}
