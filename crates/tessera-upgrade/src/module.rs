use std::sync::Arc;

use tessera_core::{AppError, AppModule, Context, Querier, RequestEndBlock, ValidatorUpdate};

use crate::abci::end_blocker;
use crate::keeper::Keeper;
use crate::querier::new_querier;
use crate::types::{GenesisState, MODULE_NAME};

pub struct UpgradeModule {
    keeper: Arc<Keeper>,
}

impl UpgradeModule {
    pub fn new(keeper: Arc<Keeper>) -> Self {
        UpgradeModule { keeper }
    }
}

impl AppModule for UpgradeModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn querier(&self) -> Option<Querier> {
        Some(new_querier(self.keeper.clone()))
    }

    fn default_genesis(&self) -> serde_json::Value {
        serde_json::to_value(GenesisState::default()).unwrap_or(serde_json::Value::Null)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
        let genesis: GenesisState = serde_json::from_value(data.clone())?;
        self.keeper.set_params(ctx, &genesis.params)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
        let genesis = GenesisState {
            params: self.keeper.params(ctx)?,
        };
        Ok(serde_json::to_value(genesis)?)
    }

    fn end_block(&self, ctx: &mut Context<'_>, _req: &RequestEndBlock) -> Vec<ValidatorUpdate> {
        end_blocker(ctx, &self.keeper);
        Vec::new()
    }
}
