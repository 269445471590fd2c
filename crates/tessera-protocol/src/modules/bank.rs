// Bank module: account balances and transfers

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use tessera_core::{
    has_sufficient_coins, Address, AppError, AppModule, BankMsg, Context, DecCoins, Event, Handler,
    HandlerResult, Io, Msg, Querier, StoreKey, ValidatorUpdate,
};

pub const MODULE_NAME: &str = tessera_core::tx::ROUTE_BANK;

pub const EVENT_TYPE_TRANSFER: &str = "transfer";
pub const QUERY_BALANCES: &str = "balances";

const BALANCE_PREFIX: &str = "balance/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: Address,
    pub coins: DecCoins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub balances: Vec<Balance>,
}

pub struct BankKeeper {
    key: StoreKey,
}

impl BankKeeper {
    pub fn new(key: StoreKey) -> Self {
        BankKeeper { key }
    }

    pub(crate) fn balance_key(address: &Address) -> Vec<u8> {
        format!("{}{}", BALANCE_PREFIX, address).into_bytes()
    }

    pub fn get_balance(&self, ctx: &Context<'_>, address: &Address) -> Result<DecCoins, AppError> {
        Ok(ctx
            .kv_store(&self.key)
            .get_bincode(&Self::balance_key(address))?
            .unwrap_or_default())
    }

    /// An empty balance removes the entry
    pub fn set_balance(&self, ctx: &mut Context<'_>, address: &Address, coins: &DecCoins) -> Result<(), AppError> {
        let key = Self::balance_key(address);
        let store = ctx.kv_store_mut(&self.key);
        if coins.is_empty() {
            store.delete(&key);
        } else {
            store.set_bincode(key, coins)?;
        }
        Ok(())
    }

    pub fn add_coins(&self, ctx: &mut Context<'_>, address: &Address, amount: &DecCoins) -> Result<DecCoins, AppError> {
        let updated = self.get_balance(ctx, address)?.add(amount);
        self.set_balance(ctx, address, &updated)?;
        Ok(updated)
    }

    pub fn subtract_coins(&self, ctx: &mut Context<'_>, address: &Address, amount: &DecCoins) -> Result<DecCoins, AppError> {
        let balance = self.get_balance(ctx, address)?;
        has_sufficient_coins(address, &balance, amount).map_err(AppError::insufficient_funds)?;
        let updated = balance
            .checked_sub(amount)
            .ok_or_else(|| AppError::insufficient_funds(format!("{} cannot cover {}", address, amount)))?;
        self.set_balance(ctx, address, &updated)?;
        Ok(updated)
    }

    pub fn send_coins(&self, ctx: &mut Context<'_>, from: &Address, to: &Address, amount: &DecCoins) -> Result<(), AppError> {
        self.subtract_coins(ctx, from, amount)?;
        self.add_coins(ctx, to, amount)?;
        debug!("Transferred {} from {} to {}", amount, from, to);
        Ok(())
    }

    /// Moves coins from every input to every output. Callers check that the sums match.
    pub fn input_output_coins(&self, ctx: &mut Context<'_>, inputs: &[Io], outputs: &[Io]) -> Result<(), AppError> {
        for input in inputs {
            self.subtract_coins(ctx, &input.address, &input.coins)?;
        }
        for output in outputs {
            self.add_coins(ctx, &output.address, &output.coins)?;
        }
        Ok(())
    }

    pub fn balances(&self, ctx: &Context<'_>) -> Result<Vec<Balance>, AppError> {
        let mut balances = Vec::new();
        for (key, value) in ctx.kv_store(&self.key).iter_prefix(BALANCE_PREFIX.as_bytes()) {
            let address = String::from_utf8_lossy(&key[BALANCE_PREFIX.len()..]).into_owned();
            let coins: DecCoins = bincode::deserialize(value).map_err(AppError::internal)?;
            balances.push(Balance {
                address: Address::from_raw(address),
                coins,
            });
        }
        Ok(balances)
    }
}

impl tessera_upgrade::BankKeeper for BankKeeper {
    fn get_all_balances(&self, ctx: &Context<'_>, address: &Address) -> Result<DecCoins, AppError> {
        self.get_balance(ctx, address)
    }
}

fn transfer_event(sender: &Address, recipient: &Address, amount: &DecCoins) -> Event {
    Event::new(EVENT_TYPE_TRANSFER)
        .with_attribute("sender", sender)
        .with_attribute("recipient", recipient)
        .with_attribute("amount", amount)
}

pub struct BankModule {
    keeper: Arc<BankKeeper>,
    multi_send: bool,
}

impl BankModule {
    /// `multi_send` enables the multi-input transfer message
    pub fn new(keeper: Arc<BankKeeper>, multi_send: bool) -> Self {
        BankModule { keeper, multi_send }
    }
}

impl AppModule for BankModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn handler(&self) -> Option<Handler> {
        let keeper = self.keeper.clone();
        let multi_send = self.multi_send;
        Some(Arc::new(move |ctx: &mut Context<'_>, msg: &Msg| -> Result<HandlerResult, AppError> {
            match msg {
                Msg::Bank(BankMsg::Send { from, to, amount }) => {
                    keeper.send_coins(ctx, from, to, amount)?;
                    ctx.emit_event(transfer_event(from, to, amount));
                    Ok(HandlerResult::default())
                }
                Msg::Bank(BankMsg::MultiSend { inputs, outputs }) if multi_send => {
                    keeper.input_output_coins(ctx, inputs, outputs)?;
                    for input in inputs {
                        for output in outputs {
                            ctx.emit_event(transfer_event(&input.address, &output.address, &output.coins));
                        }
                    }
                    Ok(HandlerResult::default())
                }
                other => Err(AppError::unknown_request(format!(
                    "unrecognized bank message type: {}",
                    other.kind()
                ))),
            }
        }))
    }

    fn querier(&self) -> Option<Querier> {
        let keeper = self.keeper.clone();
        Some(Arc::new(move |ctx: &Context<'_>, path: &[&str], _data: &[u8]| -> Result<Vec<u8>, AppError> {
            match path {
                [QUERY_BALANCES, address] => {
                    let coins = keeper.get_balance(ctx, &Address::from_raw(*address))?;
                    Ok(serde_json::to_vec_pretty(&coins)?)
                }
                _ => Err(AppError::unknown_request(format!("unknown bank query endpoint: {:?}", path))),
            }
        }))
    }

    fn default_genesis(&self) -> serde_json::Value {
        serde_json::to_value(GenesisState::default()).unwrap_or(serde_json::Value::Null)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
        let genesis: GenesisState = serde_json::from_value(data.clone())?;
        for balance in &genesis.balances {
            self.keeper.add_coins(ctx, &balance.address, &balance.coins)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
        let genesis = GenesisState {
            balances: self.keeper.balances(ctx)?,
        };
        Ok(serde_json::to_value(genesis)?)
    }
}
