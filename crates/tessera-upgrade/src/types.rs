use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use tessera_core::{AppError, AppUpgradeProposal, DecCoins, NATIVE_DENOM};

use crate::errors;

pub const MODULE_NAME: &str = "upgrade";
pub const STORE_KEY: &str = "upgrade";
pub const QUERIER_ROUTE: &str = "upgrade";
pub const DEFAULT_PARAMSPACE: &str = "upgrade";

pub const EVENT_TYPE_UPGRADE_APP_VERSION: &str = "upgrade_app_version";
pub const ATTRIBUTE_KEY_APP_VERSION: &str = "app_version";
pub const EVENT_TYPE_UPGRADE_FAILURE: &str = "upgrade_failure";
pub const ATTRIBUTE_KEY_UPGRADE_FAILURE: &str = "upgrade_failure";

pub const MAX_TITLE_LEN: usize = 140;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_SOFTWARE_LEN: usize = 70;

pub const KEY_APP_UPGRADE_MIN_DEPOSIT: &str = "AppUpgradeMinDeposit";
pub const KEY_APP_UPGRADE_VOTING_PERIOD: &str = "AppUpgradeVotingPeriod";

/// Module parameters, stored in the `upgrade` params subspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Deposit an upgrade proposal needs before it can pass
    pub app_upgrade_min_deposit: DecCoins,

    /// Voting period of an upgrade proposal, in blocks
    pub app_upgrade_voting_period: u64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            app_upgrade_min_deposit: DecCoins::single(NATIVE_DENOM, 1000u64),
            app_upgrade_voting_period: 20,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.app_upgrade_voting_period == 0 {
            return Err(errors::err_invalid_params("app upgrade voting period must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
}

/// Response body of the `version` and `failed_version` queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVersion {
    pub version: u64,
}

impl QueryVersion {
    pub fn new(version: u64) -> Self {
        QueryVersion { version }
    }
}

/// Stateless checks on an upgrade proposal
pub fn validate_app_upgrade_proposal(proposal: &AppUpgradeProposal) -> Result<(), AppError> {
    if proposal.title.trim().is_empty() {
        return Err(errors::err_invalid_length("title", 0, MAX_TITLE_LEN));
    }
    if proposal.title.len() > MAX_TITLE_LEN {
        return Err(errors::err_invalid_length("title", proposal.title.len(), MAX_TITLE_LEN));
    }
    if proposal.description.len() > MAX_DESCRIPTION_LEN {
        return Err(errors::err_invalid_length(
            "description",
            proposal.description.len(),
            MAX_DESCRIPTION_LEN,
        ));
    }

    let def = &proposal.protocol_definition;
    if def.height == 0 {
        return Err(errors::err_zero_switch_height());
    }
    if def.software.len() > MAX_SOFTWARE_LEN {
        return Err(errors::err_invalid_length("software", def.software.len(), MAX_SOFTWARE_LEN));
    }

    let lower = BigDecimal::from_str("0.75").map_err(AppError::internal)?;
    let upper = BigDecimal::from(1u64);
    if def.threshold < lower || def.threshold >= upper {
        return Err(errors::err_invalid_upgrade_threshold(&def.threshold));
    }
    Ok(())
}
