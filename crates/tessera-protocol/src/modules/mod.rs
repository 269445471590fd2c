// Application modules bundled into the protocol versions
pub mod auth;
pub mod bank;
pub mod gov;
pub mod staking;

pub use auth::{AccountKeeper, AuthModule};
pub use bank::{BankKeeper, BankModule};
pub use gov::{new_gov_keeper, GovKeeper, GovModule, GovParams, TextProposalHandler};
pub use staking::{StakingKeeper, StakingModule, Validator};
