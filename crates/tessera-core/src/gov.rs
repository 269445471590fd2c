// Governance surface shared between the gov module and the modules that
// own proposal content types.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::coins::DecCoins;
use crate::context::Context;
use crate::error::AppError;
use crate::proto::AppUpgradeProposal;
use crate::tx::MsgSubmitProposal;

pub const ROUTE_GOV: &str = "gov";
pub const ROUTE_UPGRADE: &str = "upgrade";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextProposal {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalContent {
    AppUpgrade(AppUpgradeProposal),
    Text(TextProposal),
}

impl ProposalContent {
    pub fn title(&self) -> &str {
        match self {
            ProposalContent::AppUpgrade(p) => &p.title,
            ProposalContent::Text(p) => &p.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ProposalContent::AppUpgrade(p) => &p.description,
            ProposalContent::Text(p) => &p.description,
        }
    }

    /// Governance router key of the handler that executes this content
    pub fn proposal_route(&self) -> &'static str {
        match self {
            ProposalContent::AppUpgrade(_) => ROUTE_UPGRADE,
            ProposalContent::Text(_) => ROUTE_GOV,
        }
    }

    pub fn proposal_type(&self) -> &'static str {
        match self {
            ProposalContent::AppUpgrade(_) => "AppUpgrade",
            ProposalContent::Text(_) => "Text",
        }
    }

    /// Pass threshold carried by the content itself, if any
    pub fn threshold(&self) -> Option<&BigDecimal> {
        match self {
            ProposalContent::AppUpgrade(p) => Some(&p.protocol_definition.threshold),
            ProposalContent::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    VotingPeriod,
    Passed,
    Rejected,
    /// Passed, but executing its content returned an error
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub content: ProposalContent,
    pub proposer: Address,
    pub status: ProposalStatus,
    pub submit_height: u64,
    pub voting_end_height: u64,
    pub total_deposit: DecCoins,
}

/// Implemented by every module that owns a proposal content type.
/// Gov consults it before a submission becomes a proposal.
pub trait ProposalHandler: Send + Sync {
    fn min_deposit(&self, ctx: &Context<'_>, content: &ProposalContent) -> Result<DecCoins, AppError>;

    /// Length of the voting period in blocks
    fn voting_period(&self, ctx: &Context<'_>, content: &ProposalContent) -> Result<u64, AppError>;

    fn validate_basic(&self, _content: &ProposalContent) -> Result<(), AppError> {
        Ok(())
    }

    fn check_msg_submit_proposal(&self, ctx: &Context<'_>, msg: &MsgSubmitProposal) -> Result<(), AppError>;
}

/// Executes a passed proposal
pub type GovHandler = Arc<dyn Fn(&mut Context<'_>, &Proposal) -> Result<(), AppError> + Send + Sync>;
