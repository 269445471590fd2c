// Upgrade Keeper
// Validates upgrade proposals on behalf of governance.
//
// SAFETY INVARIANTS:
// 1. Only validators may propose an upgrade
// 2. Only the next known version may be proposed, and only while nothing is pending
// 3. The switch height must lie in the future at submission

use std::sync::Arc;

use bigdecimal::BigDecimal;
use log::debug;

use tessera_core::{
    has_sufficient_coins, AppError, Context, DecCoins, MsgSubmitProposal, ProposalContent, ProposalHandler,
    ProtocolKeeper, Subspace, UpgradeConfig,
};

use crate::errors;
use crate::expected_keepers::{BankKeeper, StakingKeeper};
use crate::types::{validate_app_upgrade_proposal, Params, KEY_APP_UPGRADE_MIN_DEPOSIT, KEY_APP_UPGRADE_VOTING_PERIOD};

pub struct Keeper {
    param_space: Subspace,
    protocol_keeper: ProtocolKeeper,
    staking_keeper: Arc<dyn StakingKeeper>,
    bank_keeper: Arc<dyn BankKeeper>,
}

impl Keeper {
    pub fn new(
        param_space: Subspace,
        protocol_keeper: ProtocolKeeper,
        staking_keeper: Arc<dyn StakingKeeper>,
        bank_keeper: Arc<dyn BankKeeper>,
    ) -> Self {
        Keeper {
            param_space,
            protocol_keeper,
            staking_keeper,
            bank_keeper,
        }
    }

    pub fn protocol_keeper(&self) -> &ProtocolKeeper {
        &self.protocol_keeper
    }

    /// Stored params; a missing entry reads as its default
    pub fn params(&self, ctx: &Context<'_>) -> Result<Params, AppError> {
        let defaults = Params::default();
        Ok(Params {
            app_upgrade_min_deposit: self
                .param_space
                .get(ctx, KEY_APP_UPGRADE_MIN_DEPOSIT)?
                .unwrap_or(defaults.app_upgrade_min_deposit),
            app_upgrade_voting_period: self
                .param_space
                .get(ctx, KEY_APP_UPGRADE_VOTING_PERIOD)?
                .unwrap_or(defaults.app_upgrade_voting_period),
        })
    }

    pub fn set_params(&self, ctx: &mut Context<'_>, params: &Params) -> Result<(), AppError> {
        params.validate()?;
        self.param_space
            .set(ctx, KEY_APP_UPGRADE_MIN_DEPOSIT, &params.app_upgrade_min_deposit)?;
        self.param_space
            .set(ctx, KEY_APP_UPGRADE_VOTING_PERIOD, &params.app_upgrade_voting_period)?;
        Ok(())
    }

    pub fn upgrade_config(&self, ctx: &Context<'_>) -> Result<Option<UpgradeConfig>, AppError> {
        Ok(self.protocol_keeper.upgrade_config(ctx.store())?)
    }
}

impl ProposalHandler for Keeper {
    fn min_deposit(&self, ctx: &Context<'_>, content: &ProposalContent) -> Result<DecCoins, AppError> {
        match content {
            ProposalContent::AppUpgrade(_) => Ok(self.params(ctx)?.app_upgrade_min_deposit),
            other => Err(errors::err_unsupported_content(other.proposal_type())),
        }
    }

    fn voting_period(&self, ctx: &Context<'_>, content: &ProposalContent) -> Result<u64, AppError> {
        match content {
            ProposalContent::AppUpgrade(_) => Ok(self.params(ctx)?.app_upgrade_voting_period),
            other => Err(errors::err_unsupported_content(other.proposal_type())),
        }
    }

    fn validate_basic(&self, content: &ProposalContent) -> Result<(), AppError> {
        match content {
            ProposalContent::AppUpgrade(proposal) => validate_app_upgrade_proposal(proposal),
            other => Err(errors::err_unsupported_content(other.proposal_type())),
        }
    }

    fn check_msg_submit_proposal(&self, ctx: &Context<'_>, msg: &MsgSubmitProposal) -> Result<(), AppError> {
        let proposal = match &msg.content {
            ProposalContent::AppUpgrade(proposal) => proposal,
            other => return Err(errors::err_unsupported_content(other.proposal_type())),
        };

        if !self.staking_keeper.is_validator(ctx, &msg.proposer)? {
            return Err(errors::err_not_validator());
        }

        // initial deposit must cover a tenth of the minimum deposit
        let ratio = BigDecimal::new(1.into(), 1);
        let required = self.params(ctx)?.app_upgrade_min_deposit.mul_dec(&ratio);
        has_sufficient_coins(&msg.proposer, &msg.initial_deposit, &required).map_err(errors::err_insufficient_coins)?;

        let balance = self.bank_keeper.get_all_balances(ctx, &msg.proposer)?;
        has_sufficient_coins(&msg.proposer, &balance, &msg.initial_deposit).map_err(errors::err_insufficient_coins)?;

        let def = &proposal.protocol_definition;
        if !self.protocol_keeper.is_valid_version(ctx.store(), def.version)? {
            return Err(errors::err_invalid_version(def.version));
        }

        if ctx.block_height() >= def.height {
            return Err(errors::err_invalid_switch_height(ctx.block_height(), def.height));
        }

        if self.protocol_keeper.upgrade_config(ctx.store())?.is_some() {
            return Err(errors::err_switch_period_in_process());
        }

        debug!(
            "Accepted AppUpgradeProposal submission from {} for {}",
            msg.proposer, def
        );
        Ok(())
    }
}
