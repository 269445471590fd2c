// Protocol version 1: JSON transactions, multi-recipient transfers
// and a minimum fee.

use std::sync::Arc;

use log::info;

use tessera_core::{
    AppError, AppModule, Context, DecCoins, GenesisState, ModuleManager, ProtocolKeeper, StoreKey, TxCodec,
    NATIVE_DENOM,
};
use tessera_upgrade::UpgradeModule;

use crate::ante::AnteV1;
use crate::codec::JsonTxCodec;
use crate::modules::{auth, bank, gov, staking, AuthModule, BankModule, GovModule, StakingModule};
use crate::store_keys;
use crate::types::{Parent, Protocol};
use crate::wiring::{install, Keepers};

pub fn min_fee() -> DecCoins {
    DecCoins::single(NATIVE_DENOM, 1)
}

pub struct ProtocolV1 {
    protocol_keeper: ProtocolKeeper,
    manager: Option<Arc<ModuleManager>>,
}

impl ProtocolV1 {
    pub const VERSION: u64 = 1;

    pub fn new(protocol_keeper: ProtocolKeeper) -> Self {
        ProtocolV1 {
            protocol_keeper,
            manager: None,
        }
    }

    fn module_manager(keepers: &Keepers) -> ModuleManager {
        let modules: Vec<Arc<dyn AppModule>> = vec![
            Arc::new(AuthModule::new(keepers.accounts.clone())),
            Arc::new(BankModule::new(keepers.bank.clone(), true)),
            Arc::new(StakingModule::new(keepers.staking.clone())),
            Arc::new(GovModule::new(keepers.gov.clone())),
            Arc::new(UpgradeModule::new(keepers.upgrade.clone())),
        ];
        let mut manager = ModuleManager::new(modules);
        manager.set_order_init_genesis(&[
            auth::MODULE_NAME,
            staking::MODULE_NAME,
            bank::MODULE_NAME,
            gov::MODULE_NAME,
            tessera_upgrade::MODULE_NAME,
        ]);
        manager.set_order_end_blockers(&[
            auth::MODULE_NAME,
            bank::MODULE_NAME,
            staking::MODULE_NAME,
            gov::MODULE_NAME,
            tessera_upgrade::MODULE_NAME,
        ]);
        manager
    }
}

impl Protocol for ProtocolV1 {
    fn version(&self) -> u64 {
        Self::VERSION
    }

    fn load_context(&mut self, parent: &mut dyn Parent) {
        if self.manager.is_some() {
            panic!("protocol version {} is already loaded", Self::VERSION);
        }
        let keepers = Keepers::new(&self.protocol_keeper);
        let manager = Arc::new(Self::module_manager(&keepers));
        let ante = Arc::new(AnteV1::new(keepers.bank.clone(), keepers.accounts.clone(), min_fee()));

        install(parent, Self::VERSION, manager.clone(), ante, &keepers.params);
        self.manager = Some(manager);
        info!("Protocol version {} context loaded", Self::VERSION);
    }

    fn is_loaded(&self) -> bool {
        self.manager.is_some()
    }

    fn codec(&self) -> Arc<dyn TxCodec> {
        Arc::new(JsonTxCodec)
    }

    fn kv_store_keys(&self) -> Vec<StoreKey> {
        store_keys::base_store_keys()
    }

    fn default_genesis(&self) -> GenesisState {
        Self::module_manager(&Keepers::new(&self.protocol_keeper)).default_genesis()
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState, AppError> {
        match &self.manager {
            Some(manager) => manager.export_genesis(ctx),
            None => Err(AppError::internal(format!(
                "protocol version {} is not loaded",
                Self::VERSION
            ))),
        }
    }
}
