// Protocol Engine
// Registry of every protocol version compiled into this binary, and the
// single authority for moving between them.
//
// SAFETY INVARIANTS:
// 1. activate is the only writer of the current version
// 2. Versions only move forward; there is no downgrade
// 3. A failed activation leaves memory, store and hooks untouched
// 4. A restart reads the persisted version instead of replaying events

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info, warn};
use thiserror::Error;

use tessera_core::{MultiStore, ProtocolKeeper, ProtocolKeeperError, StoreKey, UpgradeConfig};

use crate::types::{Parent, Protocol};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol version {0} is already registered")]
    DuplicateVersion(u64),

    #[error("a protocol is already loaded (version {0})")]
    AlreadyLoaded(u64),

    #[error(transparent)]
    Keeper(#[from] ProtocolKeeperError),
}

pub struct Engine {
    protocols: BTreeMap<u64, Box<dyn Protocol>>,
    current: u64,
    loaded: bool,
    keeper: ProtocolKeeper,
}

impl Engine {
    /// The keeper's known-version set is filled by `register`
    pub fn new(keeper: ProtocolKeeper) -> Self {
        Engine {
            protocols: BTreeMap::new(),
            current: 0,
            loaded: false,
            keeper,
        }
    }

    pub fn with_protocols(keeper: ProtocolKeeper, protocols: Vec<Box<dyn Protocol>>) -> Result<Self, EngineError> {
        let mut engine = Engine::new(keeper);
        for protocol in protocols {
            engine.register(protocol)?;
        }
        Ok(engine)
    }

    pub fn register(&mut self, protocol: Box<dyn Protocol>) -> Result<(), EngineError> {
        let version = protocol.version();
        if self.protocols.contains_key(&version) {
            return Err(EngineError::DuplicateVersion(version));
        }
        self.keeper.known_versions().insert(version);
        self.protocols.insert(version, protocol);
        debug!("Registered protocol version {}", version);
        Ok(())
    }

    /// Wires the persisted current version into `parent`.
    ///
    /// Returns `(false, version)` when this binary does not ship that
    /// version; the caller must stop rather than run the wrong protocol.
    pub fn load_current_protocol(&mut self, store: &MultiStore, parent: &mut dyn Parent) -> Result<(bool, u64), EngineError> {
        if self.loaded {
            return Err(EngineError::AlreadyLoaded(self.current));
        }

        let version = self.keeper.current_version(store)?;
        match self.protocols.get_mut(&version) {
            Some(protocol) => {
                protocol.load_context(parent);
                self.current = version;
                self.loaded = true;
                info!("Loaded protocol version {}", version);
                Ok((true, version))
            }
            None => {
                error!(
                    "Persisted protocol version {} is not supported by this binary (known: {:?})",
                    version,
                    self.versions()
                );
                Ok((false, version))
            }
        }
    }

    /// Switches to `target`. Fails closed for unknown versions and for
    /// anything not strictly above the current version.
    pub fn activate(&mut self, target: u64, store: &mut MultiStore, parent: &mut dyn Parent) -> bool {
        if !self.loaded {
            error!("Cannot activate version {} before the current protocol is loaded", target);
            return false;
        }
        if target <= self.current {
            warn!(
                "Refusing to activate version {}: current version is {}",
                target, self.current
            );
            return false;
        }
        let protocol = match self.protocols.get_mut(&target) {
            Some(protocol) => protocol,
            None => {
                warn!("Cannot activate version {}: not supported by this binary", target);
                return false;
            }
        };

        protocol.load_context(parent);
        self.keeper.set_current_version(store, target);
        let previous = std::mem::replace(&mut self.current, target);
        info!("Protocol activated: version {} -> {}", previous, target);
        true
    }

    pub fn current_version(&self) -> u64 {
        self.current
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn current_protocol(&self) -> Option<&dyn Protocol> {
        if !self.loaded {
            return None;
        }
        self.protocols.get(&self.current).map(|p| p.as_ref())
    }

    pub fn protocol(&self, version: u64) -> Option<&dyn Protocol> {
        self.protocols.get(&version).map(|p| p.as_ref())
    }

    pub fn versions(&self) -> Vec<u64> {
        self.protocols.keys().copied().collect()
    }

    /// Union of every registered version's key-spaces
    pub fn kv_store_keys(&self) -> Vec<StoreKey> {
        let keys: BTreeSet<StoreKey> = self
            .protocols
            .values()
            .flat_map(|p| p.kv_store_keys())
            .collect();
        keys.into_iter().collect()
    }

    pub fn upgrade_config(&self, store: &MultiStore) -> Result<Option<UpgradeConfig>, EngineError> {
        Ok(self.keeper.upgrade_config(store)?)
    }

    pub fn protocol_keeper(&self) -> &ProtocolKeeper {
        &self.keeper
    }
}
