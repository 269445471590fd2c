use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::abci::ConsensusParams;
use crate::context::Context;
use crate::error::AppError;
use crate::store::StoreKey;

/// Subspace holding consensus parameters written at chain init
pub const BASEAPP_SUBSPACE: &str = "baseapp";
const KEY_CONSENSUS_PARAMS: &str = "ConsensusParams";

/// Hands out per-module subspaces of the shared params key-space
#[derive(Debug, Clone)]
pub struct ParamsKeeper {
    store_key: StoreKey,
}

impl ParamsKeeper {
    pub fn new(store_key: StoreKey) -> Self {
        ParamsKeeper { store_key }
    }

    pub fn subspace(&self, name: &str) -> Subspace {
        Subspace {
            name: name.to_string(),
            store_key: self.store_key.clone(),
        }
    }
}

/// JSON-encoded parameters of one module, stored under `<name>/<key>`
#[derive(Debug, Clone)]
pub struct Subspace {
    name: String,
    store_key: StoreKey,
}

impl Subspace {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, key: &str) -> Vec<u8> {
        format!("{}/{}", self.name, key).into_bytes()
    }

    pub fn get<T: DeserializeOwned>(&self, ctx: &Context<'_>, key: &str) -> Result<Option<T>, AppError> {
        match ctx.kv_store(&self.store_key).get(&self.key(key)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, ctx: &mut Context<'_>, key: &str, value: &T) -> Result<(), AppError> {
        let bytes = serde_json::to_vec(value)?;
        let full = self.key(key);
        ctx.kv_store_mut(&self.store_key).set(full, bytes);
        Ok(())
    }
}

/// Where the host application keeps consensus parameters
pub trait ParamStore: Send + Sync {
    fn consensus_params(&self, ctx: &Context<'_>) -> Result<Option<ConsensusParams>, AppError>;

    fn set_consensus_params(&self, ctx: &mut Context<'_>, params: &ConsensusParams) -> Result<(), AppError>;
}

impl ParamStore for Subspace {
    fn consensus_params(&self, ctx: &Context<'_>) -> Result<Option<ConsensusParams>, AppError> {
        self.get(ctx, KEY_CONSENSUS_PARAMS)
    }

    fn set_consensus_params(&self, ctx: &mut Context<'_>, params: &ConsensusParams) -> Result<(), AppError> {
        self.set(ctx, KEY_CONSENSUS_PARAMS, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BlockHeader;
    use crate::store::{MemDb, MultiStore};
    use std::sync::Arc;

    #[test]
    fn test_subspaces_do_not_collide() -> Result<(), AppError> {
        let key = StoreKey::new("params");
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount(&key)?;
        store.load_latest()?;
        let mut ctx = Context::new(&mut store, BlockHeader::default(), false);

        let keeper = ParamsKeeper::new(key);
        let bank = keeper.subspace("bank");
        let gov = keeper.subspace("gov");
        bank.set(&mut ctx, "limit", &5u64)?;
        gov.set(&mut ctx, "limit", &9u64)?;

        assert_eq!(bank.get::<u64>(&ctx, "limit")?, Some(5));
        assert_eq!(gov.get::<u64>(&ctx, "limit")?, Some(9));
        assert_eq!(gov.get::<u64>(&ctx, "missing")?, None);
        Ok(())
    }

    #[test]
    fn test_consensus_params_store() -> Result<(), AppError> {
        let key = StoreKey::new("params");
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount(&key)?;
        store.load_latest()?;
        let mut ctx = Context::new(&mut store, BlockHeader::default(), false);

        let ps = ParamsKeeper::new(key).subspace(BASEAPP_SUBSPACE);
        assert_eq!(ps.consensus_params(&ctx)?, None);
        ps.set_consensus_params(&mut ctx, &ConsensusParams::default())?;
        assert_eq!(ps.consensus_params(&ctx)?, Some(ConsensusParams::default()));
        Ok(())
    }
}
