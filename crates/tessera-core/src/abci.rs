// Consensus lifecycle requests and responses
//
// The replication engine is outside this workspace; these are the shapes
// it hands to the host application and receives back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::context::BlockHeader;
use crate::error::{AppError, CODE_OK};
use crate::events::Event;

/// Per-module genesis documents, keyed by module name
pub type GenesisState = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub max_block_bytes: u64,
    pub max_block_gas: u64,
    pub max_evidence_age: u64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            max_block_bytes: 200_000,
            max_block_gas: 10_000_000,
            max_evidence_age: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub address: Address,
    pub power: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestInitChain {
    pub chain_id: String,
    pub time: u64,
    pub app_state: GenesisState,
    pub consensus_params: Option<ConsensusParams>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub validators: Vec<ValidatorUpdate>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestBeginBlock {
    pub header: BlockHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBeginBlock {
    pub events: Vec<Event>,
}

/// Result of checking or delivering one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseDeliverTx {
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub data: Vec<u8>,
    pub events: Vec<Event>,
}

pub type ResponseCheckTx = ResponseDeliverTx;

impl ResponseDeliverTx {
    pub fn from_error(err: &AppError) -> Self {
        ResponseDeliverTx {
            code: err.code,
            codespace: err.codespace.clone(),
            log: err.message.clone(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestEndBlock {
    pub height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

impl ResponseEndBlock {
    pub fn find_event(&self, kind: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCommit {
    pub height: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestQuery {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseQuery {
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub value: Vec<u8>,
    pub height: u64,
}

impl ResponseQuery {
    pub fn from_error(err: &AppError, height: u64) -> Self {
        ResponseQuery {
            code: err.code,
            codespace: err.codespace.clone(),
            log: err.message.clone(),
            value: Vec::new(),
            height,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}
