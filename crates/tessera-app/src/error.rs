use thiserror::Error;

use tessera_core::{AppError, ProtocolKeeperError, StoreError};
use tessera_protocol::EngineError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum NodeError {
    /// The store was last run with a version this binary does not ship
    #[error("persisted protocol version {version} is not supported by this binary (supports {known:?}); install the matching release")]
    UnsupportedProtocol { version: u64, known: Vec<u64> },

    #[error("no {0} installed by the active protocol")]
    MissingHook(&'static str),

    #[error("{0} called outside of a block")]
    NotInBlock(&'static str),

    #[error("chain initialization failed: {0}")]
    Genesis(AppError),

    #[error("genesis export failed: {0}")]
    Export(AppError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Keeper(#[from] ProtocolKeeperError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
