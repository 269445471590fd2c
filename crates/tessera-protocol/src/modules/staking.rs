// Staking module: the validator set and its voting power.
// Validators come from genesis only; there is no delegation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tessera_core::{Address, AppError, AppModule, Context, Querier, StoreKey, ValidatorUpdate};

pub const MODULE_NAME: &str = "staking";
pub const QUERY_VALIDATORS: &str = "validators";

const VALIDATOR_PREFIX: &str = "validator/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub power: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub validators: Vec<Validator>,
}

pub struct StakingKeeper {
    key: StoreKey,
}

impl StakingKeeper {
    pub fn new(key: StoreKey) -> Self {
        StakingKeeper { key }
    }

    fn validator_key(address: &Address) -> Vec<u8> {
        format!("{}{}", VALIDATOR_PREFIX, address).into_bytes()
    }

    pub fn validator(&self, ctx: &Context<'_>, address: &Address) -> Result<Option<Validator>, AppError> {
        Ok(ctx.kv_store(&self.key).get_bincode(&Self::validator_key(address))?)
    }

    pub fn set_validator(&self, ctx: &mut Context<'_>, validator: &Validator) -> Result<(), AppError> {
        if validator.power == 0 {
            return Err(AppError::invalid_request(format!(
                "validator {} must have positive power",
                validator.address
            )));
        }
        ctx.kv_store_mut(&self.key)
            .set_bincode(Self::validator_key(&validator.address), validator)?;
        Ok(())
    }

    /// Voting power of `address`, zero for non-validators
    pub fn power(&self, ctx: &Context<'_>, address: &Address) -> Result<u64, AppError> {
        Ok(self.validator(ctx, address)?.map(|v| v.power).unwrap_or(0))
    }

    pub fn validators(&self, ctx: &Context<'_>) -> Result<Vec<Validator>, AppError> {
        ctx.kv_store(&self.key)
            .iter_prefix(VALIDATOR_PREFIX.as_bytes())
            .map(|(_, value)| bincode::deserialize(value).map_err(AppError::internal))
            .collect()
    }

    pub fn total_power(&self, ctx: &Context<'_>) -> Result<u64, AppError> {
        Ok(self.validators(ctx)?.iter().map(|v| v.power).sum())
    }
}

impl tessera_upgrade::StakingKeeper for StakingKeeper {
    fn is_validator(&self, ctx: &Context<'_>, address: &Address) -> Result<bool, AppError> {
        Ok(self.validator(ctx, address)?.is_some())
    }
}

pub struct StakingModule {
    keeper: Arc<StakingKeeper>,
}

impl StakingModule {
    pub fn new(keeper: Arc<StakingKeeper>) -> Self {
        StakingModule { keeper }
    }
}

impl AppModule for StakingModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn querier(&self) -> Option<Querier> {
        let keeper = self.keeper.clone();
        Some(Arc::new(move |ctx: &Context<'_>, path: &[&str], _data: &[u8]| -> Result<Vec<u8>, AppError> {
            match path {
                [QUERY_VALIDATORS] => Ok(serde_json::to_vec_pretty(&keeper.validators(ctx)?)?),
                _ => Err(AppError::unknown_request(format!("unknown staking query endpoint: {:?}", path))),
            }
        }))
    }

    fn default_genesis(&self) -> serde_json::Value {
        serde_json::to_value(GenesisState::default()).unwrap_or(serde_json::Value::Null)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
        let genesis: GenesisState = serde_json::from_value(data.clone())?;
        let mut updates = Vec::with_capacity(genesis.validators.len());
        for validator in &genesis.validators {
            self.keeper.set_validator(ctx, validator)?;
            updates.push(ValidatorUpdate {
                address: validator.address.clone(),
                power: validator.power,
            });
        }
        Ok(updates)
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
        let genesis = GenesisState {
            validators: self.keeper.validators(ctx)?,
        };
        Ok(serde_json::to_value(genesis)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{BlockHeader, MemDb, MultiStore};
    use tessera_upgrade::StakingKeeper as _;

    #[test]
    fn test_genesis_validators_become_updates() {
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount(&StoreKey::new(MODULE_NAME)).unwrap();
        store.load_latest().unwrap();
        let mut ctx = Context::new(&mut store, BlockHeader::default(), false);

        let keeper = Arc::new(StakingKeeper::new(StoreKey::new(MODULE_NAME)));
        let module = StakingModule::new(keeper.clone());
        let genesis = serde_json::json!({
            "validators": [
                { "address": "val-a", "power": 3 },
                { "address": "val-b", "power": 7 }
            ]
        });

        let updates = module.init_genesis(&mut ctx, &genesis).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(keeper.total_power(&ctx).unwrap(), 10);
        assert_eq!(keeper.power(&ctx, &Address::from_raw("val-b")).unwrap(), 7);
        assert!(keeper.is_validator(&ctx, &Address::from_raw("val-a")).unwrap());
        assert!(!keeper.is_validator(&ctx, &Address::from_raw("nobody")).unwrap());
        assert_eq!(module.export_genesis(&ctx).unwrap(), genesis);
    }

    #[test]
    fn test_zero_power_rejected() {
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.mount(&StoreKey::new(MODULE_NAME)).unwrap();
        store.load_latest().unwrap();
        let mut ctx = Context::new(&mut store, BlockHeader::default(), false);

        let module = StakingModule::new(Arc::new(StakingKeeper::new(StoreKey::new(MODULE_NAME))));
        let genesis = serde_json::json!({ "validators": [{ "address": "val-a", "power": 0 }] });
        assert!(module.init_genesis(&mut ctx, &genesis).is_err());
    }
}
