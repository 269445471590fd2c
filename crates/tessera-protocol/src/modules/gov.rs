// Governance Module
// Proposal submission, validator voting and tallying.
//
// SAFETY INVARIANTS:
// 1. A submission reaches the store only after its content handler accepted it
// 2. Only validators vote; power is read at tally time
// 3. Executing a passed proposal is atomic: its writes and events are
//    discarded together if the content handler returns an error
// 4. Deposits are held by the gov module account until the tally
// 5. Closing a proposal is atomic: a failed close-out leaves it in its
//    voting period with deposit, votes and events untouched

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use tessera_core::coins::decimal_serde;
use tessera_core::gov::ROUTE_GOV;
use tessera_core::{
    has_sufficient_coins, Address, AppError, AppModule, Context, DecCoins, Event, GovHandler, GovMsg, Handler,
    HandlerResult, Msg, MsgSubmitProposal, Proposal, ProposalContent, ProposalHandler, ProposalStatus, Querier,
    RequestEndBlock, StoreKey, Subspace, ValidatorUpdate, VoteOption, NATIVE_DENOM,
};

use super::bank::BankKeeper;
use super::staking::StakingKeeper;

pub const MODULE_NAME: &str = "gov";
pub const DEFAULT_PARAMSPACE: &str = "gov";

pub const EVENT_TYPE_SUBMIT_PROPOSAL: &str = "submit_proposal";
pub const EVENT_TYPE_PROPOSAL_VOTE: &str = "proposal_vote";
pub const EVENT_TYPE_ACTIVE_PROPOSAL: &str = "active_proposal";
pub const ATTRIBUTE_KEY_PROPOSAL_ID: &str = "proposal_id";
pub const ATTRIBUTE_KEY_PROPOSAL_TYPE: &str = "proposal_type";
pub const ATTRIBUTE_KEY_PROPOSAL_RESULT: &str = "proposal_result";
pub const ATTRIBUTE_KEY_OPTION: &str = "option";

pub const QUERY_PROPOSAL: &str = "proposal";
pub const QUERY_PROPOSALS: &str = "proposals";
pub const QUERY_PARAMS: &str = "params";

const KEY_PARAMS: &str = "GovParams";
const KEY_NEXT_PROPOSAL_ID: &[u8] = b"next_proposal_id";
const PROPOSAL_PREFIX: &[u8] = b"proposal/";
const VOTE_PREFIX: &[u8] = b"vote/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovParams {
    pub min_deposit: DecCoins,
    /// Voting period in blocks
    pub voting_period: u64,
    /// Share of total power that must vote yes, for content without its own threshold
    #[serde(with = "decimal_serde")]
    pub threshold: BigDecimal,
}

impl Default for GovParams {
    fn default() -> Self {
        GovParams {
            min_deposit: DecCoins::single(NATIVE_DENOM, 100),
            voting_period: 10,
            threshold: BigDecimal::new(5.into(), 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: GovParams,
    pub proposals: Vec<Proposal>,
}

fn load_params(space: &Subspace, ctx: &Context<'_>) -> Result<GovParams, AppError> {
    Ok(space.get(ctx, KEY_PARAMS)?.unwrap_or_default())
}

/// Content handler for plain text proposals. Passing one has no effect on state.
pub struct TextProposalHandler {
    param_space: Subspace,
}

impl TextProposalHandler {
    pub fn new(param_space: Subspace) -> Self {
        TextProposalHandler { param_space }
    }
}

impl ProposalHandler for TextProposalHandler {
    fn min_deposit(&self, ctx: &Context<'_>, _content: &ProposalContent) -> Result<DecCoins, AppError> {
        Ok(load_params(&self.param_space, ctx)?.min_deposit)
    }

    fn voting_period(&self, ctx: &Context<'_>, _content: &ProposalContent) -> Result<u64, AppError> {
        Ok(load_params(&self.param_space, ctx)?.voting_period)
    }

    fn validate_basic(&self, content: &ProposalContent) -> Result<(), AppError> {
        match content {
            ProposalContent::Text(_) => Ok(()),
            other => Err(AppError::invalid_request(format!(
                "text handler cannot take {} content",
                other.proposal_type()
            ))),
        }
    }

    fn check_msg_submit_proposal(&self, ctx: &Context<'_>, msg: &MsgSubmitProposal) -> Result<(), AppError> {
        let min_deposit = self.min_deposit(ctx, &msg.content)?;
        has_sufficient_coins(&msg.proposer, &msg.initial_deposit, &min_deposit).map_err(AppError::insufficient_funds)?;
        Ok(())
    }
}

pub fn new_text_proposal_handler() -> GovHandler {
    Arc::new(|_ctx: &mut Context<'_>, proposal: &Proposal| -> Result<(), AppError> {
        debug!("Text proposal {} passed", proposal.id);
        Ok(())
    })
}

struct GovRoute {
    checker: Arc<dyn ProposalHandler>,
    handler: GovHandler,
}

/// Outcome of counting the votes of one proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
    pub total_power: u64,
}

pub struct GovKeeper {
    key: StoreKey,
    param_space: Subspace,
    bank: Arc<BankKeeper>,
    staking: Arc<StakingKeeper>,
    routes: BTreeMap<&'static str, GovRoute>,
}

impl GovKeeper {
    pub fn new(key: StoreKey, param_space: Subspace, bank: Arc<BankKeeper>, staking: Arc<StakingKeeper>) -> Self {
        GovKeeper {
            key,
            param_space,
            bank,
            staking,
            routes: BTreeMap::new(),
        }
    }

    /// Registers the checker and executor for content routed to `route`.
    /// Panics if the route is taken.
    pub fn add_route(&mut self, route: &'static str, checker: Arc<dyn ProposalHandler>, handler: GovHandler) -> &mut Self {
        if self.routes.contains_key(route) {
            panic!("gov route {} has already been initialized", route);
        }
        self.routes.insert(route, GovRoute { checker, handler });
        self
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Account holding deposits while proposals are open
    pub fn escrow_address() -> Address {
        Address::module(MODULE_NAME)
    }

    pub fn params(&self, ctx: &Context<'_>) -> Result<GovParams, AppError> {
        load_params(&self.param_space, ctx)
    }

    pub fn set_params(&self, ctx: &mut Context<'_>, params: &GovParams) -> Result<(), AppError> {
        if params.voting_period == 0 {
            return Err(AppError::invalid_request("voting period must be positive"));
        }
        if params.threshold <= BigDecimal::from(0) || params.threshold > BigDecimal::from(1) {
            return Err(AppError::invalid_request(format!(
                "gov threshold must be in (0, 1], got {}",
                params.threshold
            )));
        }
        self.param_space.set(ctx, KEY_PARAMS, params)
    }

    fn route(&self, content: &ProposalContent) -> Result<&GovRoute, AppError> {
        self.routes.get(content.proposal_route()).ok_or_else(|| {
            AppError::unknown_request(format!("no gov route for {} proposals", content.proposal_type()))
        })
    }

    fn proposal_key(id: u64) -> Vec<u8> {
        [PROPOSAL_PREFIX, &id.to_be_bytes()[..]].concat()
    }

    fn vote_prefix(id: u64) -> Vec<u8> {
        [VOTE_PREFIX, &id.to_be_bytes()[..], &b"/"[..]].concat()
    }

    fn vote_key(id: u64, voter: &Address) -> Vec<u8> {
        [Self::vote_prefix(id).as_slice(), voter.as_str().as_bytes()].concat()
    }

    fn next_proposal_id(&self, ctx: &Context<'_>) -> Result<u64, AppError> {
        match ctx.kv_store(&self.key).get(KEY_NEXT_PROPOSAL_ID) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| AppError::internal("corrupt next proposal id"))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(1),
        }
    }

    fn set_next_proposal_id(&self, ctx: &mut Context<'_>, id: u64) {
        ctx.kv_store_mut(&self.key)
            .set(KEY_NEXT_PROPOSAL_ID.to_vec(), id.to_be_bytes().to_vec());
    }

    pub fn proposal(&self, ctx: &Context<'_>, id: u64) -> Result<Option<Proposal>, AppError> {
        Ok(ctx.kv_store(&self.key).get_bincode(&Self::proposal_key(id))?)
    }

    fn set_proposal(&self, ctx: &mut Context<'_>, proposal: &Proposal) -> Result<(), AppError> {
        ctx.kv_store_mut(&self.key)
            .set_bincode(Self::proposal_key(proposal.id), proposal)?;
        Ok(())
    }

    pub fn proposals(&self, ctx: &Context<'_>) -> Result<Vec<Proposal>, AppError> {
        ctx.kv_store(&self.key)
            .iter_prefix(PROPOSAL_PREFIX)
            .map(|(_, value)| bincode::deserialize(value).map_err(AppError::internal))
            .collect()
    }

    pub fn submit_proposal(&self, ctx: &mut Context<'_>, msg: &MsgSubmitProposal) -> Result<u64, AppError> {
        let route = self.route(&msg.content)?;
        route.checker.validate_basic(&msg.content)?;
        route.checker.check_msg_submit_proposal(ctx, msg)?;
        let voting_period = route.checker.voting_period(ctx, &msg.content)?;

        self.bank
            .send_coins(ctx, &msg.proposer, &Self::escrow_address(), &msg.initial_deposit)?;

        let id = self.next_proposal_id(ctx)?;
        let height = ctx.block_height();
        let proposal = Proposal {
            id,
            content: msg.content.clone(),
            proposer: msg.proposer.clone(),
            status: ProposalStatus::VotingPeriod,
            submit_height: height,
            voting_end_height: height.saturating_add(voting_period),
            total_deposit: msg.initial_deposit.clone(),
        };
        self.set_proposal(ctx, &proposal)?;
        self.set_next_proposal_id(ctx, id + 1);

        ctx.emit_event(
            Event::new(EVENT_TYPE_SUBMIT_PROPOSAL)
                .with_attribute(ATTRIBUTE_KEY_PROPOSAL_ID, id)
                .with_attribute(ATTRIBUTE_KEY_PROPOSAL_TYPE, msg.content.proposal_type()),
        );
        info!(
            "Proposal {} ({}) submitted by {}, voting ends at height {}",
            id,
            msg.content.proposal_type(),
            msg.proposer,
            proposal.voting_end_height
        );
        Ok(id)
    }

    pub fn vote(&self, ctx: &mut Context<'_>, proposal_id: u64, voter: &Address, option: VoteOption) -> Result<(), AppError> {
        let proposal = self
            .proposal(ctx, proposal_id)?
            .ok_or_else(|| AppError::invalid_request(format!("unknown proposal {}", proposal_id)))?;
        if proposal.status != ProposalStatus::VotingPeriod || ctx.block_height() > proposal.voting_end_height {
            return Err(AppError::invalid_request(format!(
                "proposal {} is not in its voting period",
                proposal_id
            )));
        }
        if self.staking.validator(ctx, voter)?.is_none() {
            return Err(AppError::unauthorized(format!("{} is not a validator", voter)));
        }

        ctx.kv_store_mut(&self.key)
            .set_bincode(Self::vote_key(proposal_id, voter), &option)?;
        ctx.emit_event(
            Event::new(EVENT_TYPE_PROPOSAL_VOTE)
                .with_attribute(ATTRIBUTE_KEY_PROPOSAL_ID, proposal_id)
                .with_attribute(ATTRIBUTE_KEY_OPTION, format!("{:?}", option)),
        );
        Ok(())
    }

    pub fn votes(&self, ctx: &Context<'_>, proposal_id: u64) -> Result<Vec<(Address, VoteOption)>, AppError> {
        let prefix = Self::vote_prefix(proposal_id);
        let mut votes = Vec::new();
        for (key, value) in ctx.kv_store(&self.key).iter_prefix(&prefix) {
            let voter = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let option: VoteOption = bincode::deserialize(value).map_err(AppError::internal)?;
            votes.push((Address::from_raw(voter), option));
        }
        Ok(votes)
    }

    pub fn tally(&self, ctx: &Context<'_>, proposal_id: u64) -> Result<TallyResult, AppError> {
        let mut result = TallyResult {
            yes: 0,
            no: 0,
            abstain: 0,
            total_power: self.staking.total_power(ctx)?,
        };
        for (voter, option) in self.votes(ctx, proposal_id)? {
            let power = self.staking.power(ctx, &voter)?;
            match option {
                VoteOption::Yes => result.yes += power,
                VoteOption::No => result.no += power,
                VoteOption::Abstain => result.abstain += power,
            }
        }
        Ok(result)
    }

    fn passes(&self, ctx: &Context<'_>, proposal: &Proposal, tally: &TallyResult) -> Result<bool, AppError> {
        if tally.total_power == 0 {
            return Ok(false);
        }
        let threshold = match proposal.content.threshold() {
            Some(threshold) => threshold.clone(),
            None => self.params(ctx)?.threshold,
        };
        Ok(BigDecimal::from(tally.yes) >= BigDecimal::from(tally.total_power) * threshold)
    }

    fn clear_votes(&self, ctx: &mut Context<'_>, proposal_id: u64) {
        let prefix = Self::vote_prefix(proposal_id);
        let keys: Vec<Vec<u8>> = ctx
            .kv_store(&self.key)
            .iter_prefix(&prefix)
            .map(|(key, _)| key.to_vec())
            .collect();
        let store = ctx.kv_store_mut(&self.key);
        for key in keys {
            store.delete(&key);
        }
    }

    /// Runs a passed proposal's content. On error every write and event it
    /// produced is discarded and the error is returned.
    fn execute(&self, ctx: &mut Context<'_>, proposal: &Proposal) -> Result<(), AppError> {
        let route = self.route(&proposal.content)?;
        let snapshot = ctx.snapshot();
        let events_before = ctx.event_manager().len();
        match (route.handler)(ctx, proposal) {
            Ok(()) => Ok(()),
            Err(err) => {
                ctx.restore(snapshot);
                ctx.event_manager().truncate(events_before);
                Err(err)
            }
        }
    }

    /// Closes every proposal whose voting period ended at or before this height.
    /// A proposal whose close-out fails is rolled back and retried next block.
    pub fn end_block(&self, ctx: &mut Context<'_>) -> Result<(), AppError> {
        let height = ctx.block_height();
        let due: Vec<Proposal> = self
            .proposals(ctx)?
            .into_iter()
            .filter(|p| p.status == ProposalStatus::VotingPeriod && p.voting_end_height <= height)
            .collect();

        for proposal in due {
            let id = proposal.id;
            let snapshot = ctx.snapshot();
            let events_before = ctx.event_manager().len();
            if let Err(err) = self.close_proposal(ctx, proposal) {
                ctx.restore(snapshot);
                ctx.event_manager().truncate(events_before);
                error!("Closing proposal {} failed at height {}, left open: {}", id, height, err);
            }
        }
        Ok(())
    }

    fn close_proposal(&self, ctx: &mut Context<'_>, mut proposal: Proposal) -> Result<(), AppError> {
        let tally = self.tally(ctx, proposal.id)?;
        let passed = self.passes(ctx, &proposal, &tally)?;

        if !proposal.total_deposit.is_empty() {
            self.bank
                .send_coins(ctx, &Self::escrow_address(), &proposal.proposer, &proposal.total_deposit)?;
        }

        proposal.status = if !passed {
            ProposalStatus::Rejected
        } else {
            match self.execute(ctx, &proposal) {
                Ok(()) => ProposalStatus::Passed,
                Err(err) => {
                    error!("Proposal {} passed but its execution failed: {}", proposal.id, err);
                    ProposalStatus::Failed
                }
            }
        };

        self.clear_votes(ctx, proposal.id);
        self.set_proposal(ctx, &proposal)?;
        ctx.emit_event(
            Event::new(EVENT_TYPE_ACTIVE_PROPOSAL)
                .with_attribute(ATTRIBUTE_KEY_PROPOSAL_ID, proposal.id)
                .with_attribute(ATTRIBUTE_KEY_PROPOSAL_RESULT, format!("{:?}", proposal.status)),
        );
        info!(
            "Proposal {} closed as {:?} (yes {} / total {})",
            proposal.id, proposal.status, tally.yes, tally.total_power
        );
        Ok(())
    }

    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &GenesisState) -> Result<(), AppError> {
        self.set_params(ctx, &genesis.params)?;
        let mut next_id = 1;
        for proposal in &genesis.proposals {
            self.set_proposal(ctx, proposal)?;
            next_id = next_id.max(proposal.id + 1);
        }
        self.set_next_proposal_id(ctx, next_id);
        Ok(())
    }

    pub fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState, AppError> {
        Ok(GenesisState {
            params: self.params(ctx)?,
            proposals: self.proposals(ctx)?,
        })
    }
}

pub struct GovModule {
    keeper: Arc<GovKeeper>,
}

impl GovModule {
    pub fn new(keeper: Arc<GovKeeper>) -> Self {
        GovModule { keeper }
    }
}

impl AppModule for GovModule {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn handler(&self) -> Option<Handler> {
        let keeper = self.keeper.clone();
        Some(Arc::new(move |ctx: &mut Context<'_>, msg: &Msg| -> Result<HandlerResult, AppError> {
            match msg {
                Msg::Gov(GovMsg::SubmitProposal(submit)) => {
                    let id = keeper.submit_proposal(ctx, submit)?;
                    Ok(HandlerResult {
                        data: id.to_be_bytes().to_vec(),
                        log: format!("proposal {} submitted", id),
                    })
                }
                Msg::Gov(GovMsg::Vote {
                    proposal_id,
                    voter,
                    option,
                }) => {
                    keeper.vote(ctx, *proposal_id, voter, *option)?;
                    Ok(HandlerResult::default())
                }
                other => Err(AppError::unknown_request(format!(
                    "unrecognized gov message type: {}",
                    other.kind()
                ))),
            }
        }))
    }

    fn querier(&self) -> Option<Querier> {
        let keeper = self.keeper.clone();
        Some(Arc::new(move |ctx: &Context<'_>, path: &[&str], _data: &[u8]| -> Result<Vec<u8>, AppError> {
            match path {
                [QUERY_PROPOSAL, id] => {
                    let id = u64::from_str(id)
                        .map_err(|_| AppError::invalid_request(format!("invalid proposal id {:?}", id)))?;
                    let proposal = keeper
                        .proposal(ctx, id)?
                        .ok_or_else(|| AppError::invalid_request(format!("unknown proposal {}", id)))?;
                    Ok(serde_json::to_vec_pretty(&proposal)?)
                }
                [QUERY_PROPOSALS] => Ok(serde_json::to_vec_pretty(&keeper.proposals(ctx)?)?),
                [QUERY_PARAMS] => Ok(serde_json::to_vec_pretty(&keeper.params(ctx)?)?),
                _ => Err(AppError::unknown_request(format!("unknown gov query endpoint: {:?}", path))),
            }
        }))
    }

    fn default_genesis(&self) -> serde_json::Value {
        serde_json::to_value(GenesisState::default()).unwrap_or(serde_json::Value::Null)
    }

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
        let genesis: GenesisState = serde_json::from_value(data.clone())?;
        self.keeper.init_genesis(ctx, &genesis)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
        Ok(serde_json::to_value(self.keeper.export_genesis(ctx)?)?)
    }

    fn end_block(&self, ctx: &mut Context<'_>, _req: &RequestEndBlock) -> Vec<ValidatorUpdate> {
        if let Err(err) = self.keeper.end_block(ctx) {
            error!("Gov end block failed at height {}: {}", ctx.block_height(), err);
        }
        Vec::new()
    }
}

/// Gov keeper with the text route installed; callers add further content routes
pub fn new_gov_keeper(key: StoreKey, param_space: Subspace, bank: Arc<BankKeeper>, staking: Arc<StakingKeeper>) -> GovKeeper {
    let mut keeper = GovKeeper::new(key, param_space.clone(), bank, staking);
    keeper.add_route(
        ROUTE_GOV,
        Arc::new(TextProposalHandler::new(param_space)),
        new_text_proposal_handler(),
    );
    keeper
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{BlockHeader, MemDb, MultiStore, ParamsKeeper, TextProposal};

    use crate::modules::staking::Validator;

    const GOV: &str = "gov";
    const BANK: &str = "bank";
    const STAKING: &str = "staking";
    const PARAMS: &str = "params";

    struct Fixture {
        store: MultiStore,
        bank: Arc<BankKeeper>,
        staking: Arc<StakingKeeper>,
        param_space: Subspace,
    }

    impl Fixture {
        fn new() -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let mut store = MultiStore::new(Arc::new(MemDb::new()));
            for name in [GOV, BANK, STAKING, PARAMS] {
                store.mount(&StoreKey::new(name)).unwrap();
            }
            store.load_latest().unwrap();

            let bank = Arc::new(BankKeeper::new(StoreKey::new(BANK)));
            let staking = Arc::new(StakingKeeper::new(StoreKey::new(STAKING)));
            let param_space = ParamsKeeper::new(StoreKey::new(PARAMS)).subspace(DEFAULT_PARAMSPACE);

            let mut ctx = block_ctx(&mut store, 1);
            for (name, power) in [("val-a", 6), ("val-b", 4)] {
                let address = Address::from_raw(name);
                staking
                    .set_validator(&mut ctx, &Validator { address: address.clone(), power })
                    .unwrap();
                bank.add_coins(&mut ctx, &address, &DecCoins::parse("1000tsr").unwrap())
                    .unwrap();
            }
            drop(ctx);

            Fixture {
                store,
                bank,
                staking,
                param_space,
            }
        }

        fn keeper(&self) -> GovKeeper {
            new_gov_keeper(
                StoreKey::new(GOV),
                self.param_space.clone(),
                self.bank.clone(),
                self.staking.clone(),
            )
        }
    }

    fn block_ctx(store: &mut MultiStore, height: u64) -> Context<'_> {
        Context::new(
            store,
            BlockHeader {
                chain_id: "gov-test".into(),
                height,
                time: 0,
            },
            false,
        )
    }

    fn text_msg(proposer: &str, deposit: &str) -> MsgSubmitProposal {
        MsgSubmitProposal {
            content: ProposalContent::Text(TextProposal {
                title: "Hello".into(),
                description: "world".into(),
            }),
            initial_deposit: DecCoins::parse(deposit).unwrap(),
            proposer: Address::from_raw(proposer),
        }
    }

    #[test]
    fn test_submit_escrows_deposit() {
        let mut fx = Fixture::new();
        let keeper = fx.keeper();
        let mut ctx = block_ctx(&mut fx.store, 5);

        let id = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "100tsr")).unwrap();
        assert_eq!(id, 1);
        let proposal = keeper.proposal(&ctx, id).unwrap().unwrap();
        assert_eq!(proposal.voting_end_height, 15);
        assert_eq!(
            fx.bank.get_balance(&ctx, &GovKeeper::escrow_address()).unwrap(),
            DecCoins::parse("100tsr").unwrap()
        );
        assert_eq!(ctx.events()[ctx.events().len() - 1].kind, EVENT_TYPE_SUBMIT_PROPOSAL);

        let err = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "99tsr")).unwrap_err();
        assert_eq!(err.code, tessera_core::error::CODE_INSUFFICIENT_FUNDS);
        assert_eq!(keeper.next_proposal_id(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_only_validators_vote() {
        let mut fx = Fixture::new();
        let keeper = fx.keeper();
        let mut ctx = block_ctx(&mut fx.store, 5);
        let id = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "100tsr")).unwrap();

        let err = keeper
            .vote(&mut ctx, id, &Address::from_raw("outsider"), VoteOption::Yes)
            .unwrap_err();
        assert_eq!(err.code, tessera_core::error::CODE_UNAUTHORIZED);
        keeper.vote(&mut ctx, id, &Address::from_raw("val-b"), VoteOption::No).unwrap();

        let tally = keeper.tally(&ctx, id).unwrap();
        assert_eq!((tally.yes, tally.no, tally.total_power), (0, 4, 10));
    }

    #[test]
    fn test_tally_passes_and_refunds() {
        let mut fx = Fixture::new();
        let keeper = fx.keeper();
        let mut ctx = block_ctx(&mut fx.store, 5);
        let id = keeper.submit_proposal(&mut ctx, &text_msg("val-b", "100tsr")).unwrap();
        keeper.vote(&mut ctx, id, &Address::from_raw("val-a"), VoteOption::Yes).unwrap();
        drop(ctx);

        // voting still open
        let mut ctx = block_ctx(&mut fx.store, 14);
        keeper.end_block(&mut ctx).unwrap();
        assert_eq!(keeper.proposal(&ctx, id).unwrap().unwrap().status, ProposalStatus::VotingPeriod);
        drop(ctx);

        let mut ctx = block_ctx(&mut fx.store, 15);
        keeper.end_block(&mut ctx).unwrap();
        let proposal = keeper.proposal(&ctx, id).unwrap().unwrap();
        assert_eq!(proposal.status, ProposalStatus::Passed);
        assert!(keeper.votes(&ctx, id).unwrap().is_empty());
        assert_eq!(
            fx.bank.get_balance(&ctx, &Address::from_raw("val-b")).unwrap(),
            DecCoins::parse("1000tsr").unwrap()
        );
        let closed = ctx.events().iter().find(|e| e.kind == EVENT_TYPE_ACTIVE_PROPOSAL).unwrap();
        assert_eq!(closed.attribute(ATTRIBUTE_KEY_PROPOSAL_RESULT), Some("Passed"));
    }

    #[test]
    fn test_failed_execution_is_discarded() {
        let mut fx = Fixture::new();
        let mut keeper = GovKeeper::new(
            StoreKey::new(GOV),
            fx.param_space.clone(),
            fx.bank.clone(),
            fx.staking.clone(),
        );
        let bank = fx.bank.clone();
        keeper.add_route(
            ROUTE_GOV,
            Arc::new(TextProposalHandler::new(fx.param_space.clone())),
            Arc::new(move |ctx: &mut Context<'_>, _proposal: &Proposal| -> Result<(), AppError> {
                bank.add_coins(ctx, &Address::from_raw("thief"), &DecCoins::parse("1tsr").unwrap())?;
                ctx.emit_event(Event::new("partial"));
                Err(AppError::internal("boom"))
            }),
        );

        let mut ctx = block_ctx(&mut fx.store, 5);
        let id = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "100tsr")).unwrap();
        keeper.vote(&mut ctx, id, &Address::from_raw("val-a"), VoteOption::Yes).unwrap();
        drop(ctx);

        let mut ctx = block_ctx(&mut fx.store, 15);
        keeper.end_block(&mut ctx).unwrap();
        assert_eq!(keeper.proposal(&ctx, id).unwrap().unwrap().status, ProposalStatus::Failed);
        assert!(fx.bank.get_balance(&ctx, &Address::from_raw("thief")).unwrap().is_empty());
        assert!(ctx.events().iter().all(|e| e.kind != "partial"));
    }

    #[test]
    fn test_failed_close_out_is_rolled_back() {
        let mut fx = Fixture::new();
        let keeper = fx.keeper();
        let val_a = Address::from_raw("val-a");
        let val_b = Address::from_raw("val-b");
        let mut ctx = block_ctx(&mut fx.store, 5);
        let broken = keeper.submit_proposal(&mut ctx, &text_msg("val-b", "100tsr")).unwrap();
        let healthy = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "100tsr")).unwrap();
        keeper.vote(&mut ctx, broken, &val_a, VoteOption::Yes).unwrap();
        drop(ctx);

        // the refund leaves escrow, then crediting the proposer fails
        let mut ctx = block_ctx(&mut fx.store, 15);
        ctx.kv_store_mut(&StoreKey::new(BANK))
            .set(BankKeeper::balance_key(&val_b), b"junk".to_vec());
        keeper.end_block(&mut ctx).unwrap();

        let open = keeper.proposal(&ctx, broken).unwrap().unwrap();
        assert_eq!(open.status, ProposalStatus::VotingPeriod);
        assert_eq!(keeper.votes(&ctx, broken).unwrap().len(), 1);
        assert_eq!(
            fx.bank.get_balance(&ctx, &GovKeeper::escrow_address()).unwrap(),
            DecCoins::parse("100tsr").unwrap()
        );
        assert_eq!(keeper.proposal(&ctx, healthy).unwrap().unwrap().status, ProposalStatus::Rejected);
        let closed: Vec<&Event> = ctx
            .events()
            .iter()
            .filter(|e| e.kind == EVENT_TYPE_ACTIVE_PROPOSAL)
            .collect();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].attribute(ATTRIBUTE_KEY_PROPOSAL_ID), Some(healthy.to_string().as_str()));

        fx.bank
            .set_balance(&mut ctx, &val_b, &DecCoins::parse("900tsr").unwrap())
            .unwrap();
        drop(ctx);

        // retried once the proposer's account is readable again, refunded exactly once
        let mut ctx = block_ctx(&mut fx.store, 16);
        keeper.end_block(&mut ctx).unwrap();
        assert_eq!(keeper.proposal(&ctx, broken).unwrap().unwrap().status, ProposalStatus::Passed);
        assert_eq!(fx.bank.get_balance(&ctx, &val_b).unwrap(), DecCoins::parse("1000tsr").unwrap());
        assert!(fx.bank.get_balance(&ctx, &GovKeeper::escrow_address()).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_without_quorum() {
        let mut fx = Fixture::new();
        let keeper = fx.keeper();
        let mut ctx = block_ctx(&mut fx.store, 5);
        let id = keeper.submit_proposal(&mut ctx, &text_msg("val-a", "100tsr")).unwrap();
        keeper.vote(&mut ctx, id, &Address::from_raw("val-b"), VoteOption::Yes).unwrap();
        drop(ctx);

        let mut ctx = block_ctx(&mut fx.store, 20);
        keeper.end_block(&mut ctx).unwrap();
        assert_eq!(keeper.proposal(&ctx, id).unwrap().unwrap().status, ProposalStatus::Rejected);
    }

    #[test]
    #[should_panic(expected = "already been initialized")]
    fn test_duplicate_route_panics() {
        let fx = Fixture::new();
        let mut keeper = fx.keeper();
        keeper.add_route(
            ROUTE_GOV,
            Arc::new(TextProposalHandler::new(fx.param_space.clone())),
            new_text_proposal_handler(),
        );
    }
}
