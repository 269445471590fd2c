// Protocol Keeper
// Persisted bookkeeping for protocol switches: the active version, the
// pending upgrade and the last version that failed to activate.
//
// SAFETY INVARIANTS:
// 1. The active version lives outside every module key-space
// 2. At most one UpgradeConfig is stored at a time
// 3. A version is valid to propose only if this binary knows it and it is current + 1

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;
use thiserror::Error;

use crate::error::AppError;
use crate::proto::UpgradeConfig;
use crate::store::{MultiStore, StoreError, StoreKey};

pub const KEY_CURRENT_VERSION: &[u8] = b"current_version";
pub const KEY_LAST_FAILED_VERSION: &[u8] = b"last_failed_version";
pub const KEY_UPGRADE_CONFIG: &[u8] = b"upgrade_config";

#[derive(Debug, Error)]
pub enum ProtocolKeeperError {
    #[error("an upgrade config from proposal {0} is already pending")]
    ConfigPending(u64),

    #[error("corrupt version record under {0}")]
    CorruptVersion(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProtocolKeeperError> for AppError {
    fn from(err: ProtocolKeeperError) -> Self {
        AppError::internal(err)
    }
}

/// Versions compiled into the running binary.
/// Shared between the registry (sole writer) and the keepers that validate proposals.
#[derive(Debug, Clone, Default)]
pub struct KnownVersions(Arc<RwLock<BTreeSet<u64>>>);

impl KnownVersions {
    pub fn insert(&self, version: u64) -> bool {
        self.0.write().insert(version)
    }

    pub fn contains(&self, version: u64) -> bool {
        self.0.read().contains(&version)
    }

    pub fn lowest(&self) -> Option<u64> {
        self.0.read().iter().next().copied()
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.0.read().iter().copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProtocolKeeper {
    main_key: StoreKey,
    upgrade_key: StoreKey,
    known: KnownVersions,
}

impl ProtocolKeeper {
    pub fn new(main_key: StoreKey, upgrade_key: StoreKey, known: KnownVersions) -> Self {
        ProtocolKeeper {
            main_key,
            upgrade_key,
            known,
        }
    }

    pub fn main_key(&self) -> &StoreKey {
        &self.main_key
    }

    pub fn upgrade_key(&self) -> &StoreKey {
        &self.upgrade_key
    }

    pub fn known_versions(&self) -> &KnownVersions {
        &self.known
    }

    fn read_u64(&self, store: &MultiStore, key: &[u8]) -> Result<Option<u64>, ProtocolKeeperError> {
        match store.kv_store(&self.main_key).get(key) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| ProtocolKeeperError::CorruptVersion(String::from_utf8_lossy(key).into_owned()))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// Persisted active version, None if no activation was ever recorded
    pub fn stored_current_version(&self, store: &MultiStore) -> Result<Option<u64>, ProtocolKeeperError> {
        self.read_u64(store, KEY_CURRENT_VERSION)
    }

    /// Persisted active version, falling back to the lowest known version
    pub fn current_version(&self, store: &MultiStore) -> Result<u64, ProtocolKeeperError> {
        Ok(self
            .stored_current_version(store)?
            .unwrap_or_else(|| self.known.lowest().unwrap_or(0)))
    }

    pub fn set_current_version(&self, store: &mut MultiStore, version: u64) {
        store
            .kv_store_mut(&self.main_key)
            .set(KEY_CURRENT_VERSION.to_vec(), version.to_be_bytes().to_vec());
        debug!("Persisted current protocol version {}", version);
    }

    pub fn last_failed_version(&self, store: &MultiStore) -> Result<u64, ProtocolKeeperError> {
        Ok(self.read_u64(store, KEY_LAST_FAILED_VERSION)?.unwrap_or(0))
    }

    pub fn set_last_failed_version(&self, store: &mut MultiStore, version: u64) {
        store
            .kv_store_mut(&self.main_key)
            .set(KEY_LAST_FAILED_VERSION.to_vec(), version.to_be_bytes().to_vec());
    }

    pub fn upgrade_config(&self, store: &MultiStore) -> Result<Option<UpgradeConfig>, ProtocolKeeperError> {
        Ok(store.kv_store(&self.upgrade_key).get_bincode(KEY_UPGRADE_CONFIG)?)
    }

    /// Stores the pending upgrade. Refuses to replace one that is already pending.
    pub fn set_upgrade_config(&self, store: &mut MultiStore, config: &UpgradeConfig) -> Result<(), ProtocolKeeperError> {
        if let Some(existing) = self.upgrade_config(store)? {
            return Err(ProtocolKeeperError::ConfigPending(existing.proposal_id));
        }
        store
            .kv_store_mut(&self.upgrade_key)
            .set_bincode(KEY_UPGRADE_CONFIG.to_vec(), config)?;
        info!(
            "Scheduled protocol {} from proposal {}",
            config.protocol_def, config.proposal_id
        );
        Ok(())
    }

    pub fn clear_upgrade_config(&self, store: &mut MultiStore) -> bool {
        store.kv_store_mut(&self.upgrade_key).delete(KEY_UPGRADE_CONFIG)
    }

    /// Known to this binary and exactly one above the active version
    pub fn is_valid_version(&self, store: &MultiStore, version: u64) -> Result<bool, ProtocolKeeperError> {
        if !self.known.contains(version) {
            return Ok(false);
        }
        let current = self.current_version(store)?;
        Ok(current.checked_add(1) == Some(version))
    }
}
