// Auth module: per-account transaction sequences (replay protection)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tessera_core::{Address, AppError, AppModule, Context, Querier, StoreKey, ValidatorUpdate};

pub const MODULE_NAME: &str = "auth";
pub const QUERY_SEQUENCE: &str = "sequence";

const SEQUENCE_PREFIX: &str = "sequence/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSequence {
    pub address: Address,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub accounts: Vec<AccountSequence>,
}

pub struct AccountKeeper {
    key: StoreKey,
}

impl AccountKeeper {
    pub fn new(key: StoreKey) -> Self {
        AccountKeeper { key }
    }

    fn sequence_key(address: &Address) -> Vec<u8> {
        format!("{}{}", SEQUENCE_PREFIX, address).into_bytes()
    }

    /// Next sequence `address` must use; zero for unseen accounts
    pub fn sequence(&self, ctx: &Context<'_>, address: &Address) -> Result<u64, AppError> {
        match ctx.kv_store(&self.key).get(&Self::sequence_key(address)) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| AppError::internal(format!("corrupt sequence for {}", address)))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    pub fn set_sequence(&self, ctx: &mut Context<'_>, address: &Address, sequence: u64) {
        ctx.kv_store_mut(&self.key)
            .set(Self::sequence_key(address), sequence.to_be_bytes().to_vec());
    }

    pub fn accounts(&self, ctx: &Context<'_>) -> Result<Vec<AccountSequence>, AppError> {
        let mut accounts = Vec::new();
        for (key, value) in ctx.kv_store(&self.key).iter_prefix(SEQUENCE_PREFIX.as_bytes()) {
            let raw: [u8; 8] = value
                .try_into()
                .map_err(|_| AppError::internal("corrupt sequence entry"))?;
            accounts.push(AccountSequence {
                address: Address::from_raw(String::from_utf8_lossy(&key[SEQUENCE_PREFIX.len()..]).into_owned()),
                sequence: u64::from_be_bytes(raw),
            });
        }
        Ok(accounts)
    }
}

pub struct AuthModule {
    keeper: Arc<AccountKeeper>,
}

impl AuthModule {
    pub fn new(keeper: Arc<AccountKeeper>) -> Self {
        AuthModule { keeper }
    }
}

impl AppModule for AuthModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn querier(&self) -> Option<Querier> {
        let keeper = self.keeper.clone();
        Some(Arc::new(move |ctx: &Context<'_>, path: &[&str], _data: &[u8]| -> Result<Vec<u8>, AppError> {
            match path {
                [QUERY_SEQUENCE, address] => {
                    let sequence = keeper.sequence(ctx, &Address::from_raw(*address))?;
                    Ok(serde_json::to_vec_pretty(&sequence)?)
                }
                _ => Err(AppError::unknown_request(format!("unknown auth query endpoint: {:?}", path))),
            }
        }))
    }

    fn default_genesis(&self) -> serde_json::Value {
        serde_json::to_value(GenesisState::default()).unwrap_or(serde_json::Value::Null)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
        let genesis: GenesisState = serde_json::from_value(data.clone())?;
        for account in &genesis.accounts {
            self.keeper.set_sequence(ctx, &account.address, account.sequence);
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
        Ok(serde_json::to_value(GenesisState {
            accounts: self.keeper.accounts(ctx)?,
        })?)
    }
}
