// Core ledger types shared by every protocol version
pub mod abci;
pub mod address;
pub mod ante;
pub mod codec;
pub mod coins;
pub mod context;
pub mod error;
pub mod events;
pub mod gov;
pub mod module;
pub mod params;
pub mod proto;
pub mod protocol_keeper;
pub mod router;
pub mod store;
pub mod tx;

pub use abci::{
    ConsensusParams, GenesisState, RequestBeginBlock, RequestEndBlock, RequestInitChain,
    RequestQuery, ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx,
    ResponseEndBlock, ResponseInitChain, ResponseQuery, ValidatorUpdate,
};

pub use address::Address;
pub use ante::AnteHandler;
pub use codec::{CodecError, TxCodec};
pub use coins::{has_sufficient_coins, CoinsError, DecCoin, DecCoins, NATIVE_DENOM};
pub use context::{BlockHeader, Context};
pub use error::AppError;
pub use events::{Attribute, Event, EventManager};

pub use gov::{
    GovHandler, Proposal, ProposalContent, ProposalHandler, ProposalStatus, TextProposal,
};

pub use module::{AppModule, ModuleManager};
pub use params::{ParamStore, ParamsKeeper, Subspace};
pub use proto::{AppUpgradeProposal, ProtocolDefinition, UpgradeConfig};
pub use protocol_keeper::{KnownVersions, ProtocolKeeper, ProtocolKeeperError};
pub use router::{Handler, HandlerResult, QueryRouter, Querier, Router};

pub use store::{
    BatchOp, CommitId, Database, KvStore, MemDb, MultiStore, SledDb, Snapshot, StoreError,
    StoreKey,
};

pub use tx::{BankMsg, GovMsg, Io, Msg, MsgSubmitProposal, Tx, TxBody, VoteOption};
