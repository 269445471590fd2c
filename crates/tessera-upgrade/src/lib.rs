// Application upgrade module: turns a passed governance proposal into a
// scheduled protocol switch and signals it at the switch height.
pub mod abci;
pub mod errors;
pub mod expected_keepers;
pub mod keeper;
pub mod module;
pub mod proposal;
pub mod querier;
pub mod types;

#[cfg(test)]
mod test_common;

pub use abci::end_blocker;
pub use expected_keepers::{BankKeeper, StakingKeeper};
pub use keeper::Keeper;
pub use module::UpgradeModule;
pub use proposal::{handle_app_upgrade_proposal, new_app_upgrade_proposal_handler};
pub use querier::new_querier;

pub use types::{
    validate_app_upgrade_proposal, GenesisState, Params, QueryVersion, ATTRIBUTE_KEY_APP_VERSION,
    ATTRIBUTE_KEY_UPGRADE_FAILURE, DEFAULT_PARAMSPACE, EVENT_TYPE_UPGRADE_APP_VERSION,
    EVENT_TYPE_UPGRADE_FAILURE, MODULE_NAME, STORE_KEY,
};
