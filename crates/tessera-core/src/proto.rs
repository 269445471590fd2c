// Upgrade Records
// On-chain description of a scheduled protocol switch.
//
// SAFETY INVARIANTS:
// 1. Records are immutable once constructed
// 2. At most one UpgradeConfig exists in storage (enforced by ProtocolKeeper)

use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::coins::{canonical, decimal_serde};

/// Target of an upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    /// Protocol version to activate
    pub version: u64,

    /// Operator-facing descriptor, e.g. a download location. Only used in failure messages.
    pub software: String,

    /// Block height at which the switch happens
    pub height: u64,

    /// Approval threshold the governance tally applies
    #[serde(with = "decimal_serde")]
    pub threshold: BigDecimal,
}

impl ProtocolDefinition {
    pub fn new(version: u64, software: impl Into<String>, height: u64, threshold: BigDecimal) -> Self {
        ProtocolDefinition {
            version,
            software: software.into(),
            height,
            threshold,
        }
    }
}

impl fmt::Display for ProtocolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} at height {} (threshold {}, software {})",
            self.version,
            self.height,
            canonical(&self.threshold),
            self.software
        )
    }
}

/// Pending upgrade created when an upgrade proposal passes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeConfig {
    pub proposal_id: u64,
    pub protocol_def: ProtocolDefinition,
}

impl UpgradeConfig {
    pub fn new(proposal_id: u64, protocol_def: ProtocolDefinition) -> Self {
        UpgradeConfig {
            proposal_id,
            protocol_def,
        }
    }
}

/// Governance proposal content requesting an application upgrade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUpgradeProposal {
    pub title: String,
    pub description: String,
    pub protocol_definition: ProtocolDefinition,
}

impl AppUpgradeProposal {
    pub fn new(title: impl Into<String>, description: impl Into<String>, protocol_definition: ProtocolDefinition) -> Self {
        AppUpgradeProposal {
            title: title.into(),
            description: description.into(),
            protocol_definition,
        }
    }
}
