// Keeper construction and hook installation shared by the bundled versions

use std::sync::Arc;

use tessera_core::gov::ROUTE_UPGRADE;
use tessera_core::params::BASEAPP_SUBSPACE;
use tessera_core::{
    AnteHandler, Context, ModuleManager, ParamsKeeper, ProtocolKeeper, QueryRouter, RequestBeginBlock,
    RequestEndBlock, RequestInitChain, Router, StoreKey,
};
use tessera_upgrade::{new_app_upgrade_proposal_handler, Keeper as UpgradeKeeper};

use crate::modules::{gov, new_gov_keeper, AccountKeeper, BankKeeper, GovKeeper, StakingKeeper};
use crate::store_keys;
use crate::types::Parent;

pub(crate) struct Keepers {
    pub params: ParamsKeeper,
    pub accounts: Arc<AccountKeeper>,
    pub bank: Arc<BankKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub gov: Arc<GovKeeper>,
    pub upgrade: Arc<UpgradeKeeper>,
}

impl Keepers {
    pub fn new(protocol_keeper: &ProtocolKeeper) -> Self {
        let params = ParamsKeeper::new(store_keys::params_store_key());
        let accounts = Arc::new(AccountKeeper::new(StoreKey::new(store_keys::AUTH)));
        let bank = Arc::new(BankKeeper::new(StoreKey::new(store_keys::BANK)));
        let staking = Arc::new(StakingKeeper::new(StoreKey::new(store_keys::STAKING)));

        let upgrade = Arc::new(UpgradeKeeper::new(
            params.subspace(tessera_upgrade::DEFAULT_PARAMSPACE),
            protocol_keeper.clone(),
            staking.clone(),
            bank.clone(),
        ));

        let mut gov = new_gov_keeper(
            StoreKey::new(store_keys::GOV),
            params.subspace(gov::DEFAULT_PARAMSPACE),
            bank.clone(),
            staking.clone(),
        );
        gov.add_route(ROUTE_UPGRADE, upgrade.clone(), new_app_upgrade_proposal_handler(upgrade.clone()));

        Keepers {
            params,
            accounts,
            bank,
            staking,
            gov: Arc::new(gov),
            upgrade,
        }
    }
}

/// Installs routers, ante handler, param store and lifecycle hooks of one version
pub(crate) fn install(
    parent: &mut dyn Parent,
    version: u64,
    manager: Arc<ModuleManager>,
    ante_handler: Arc<dyn AnteHandler>,
    params: &ParamsKeeper,
) {
    let mut router = Router::new(version);
    let mut query_router = QueryRouter::new(version);
    manager.register_routes(&mut router, &mut query_router);
    parent.set_router(Arc::new(router), Arc::new(query_router));
    parent.push_ante_handler(ante_handler);
    parent.set_param_store(Arc::new(params.subspace(BASEAPP_SUBSPACE)));

    let init = manager.clone();
    parent.push_init_chainer(Arc::new(move |ctx: &mut Context<'_>, req: &RequestInitChain| {
        init.init_genesis(ctx, &req.app_state)
    }));
    let begin = manager.clone();
    parent.push_begin_blocker(Arc::new(move |ctx: &mut Context<'_>, req: &RequestBeginBlock| {
        begin.begin_block(ctx, req)
    }));
    parent.push_end_blocker(Arc::new(move |ctx: &mut Context<'_>, req: &RequestEndBlock| {
        manager.end_block(ctx, req)
    }));
}
