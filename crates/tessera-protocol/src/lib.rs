// Versioned transaction-processing bundles and the registry that switches
// between them at block boundaries.
pub mod ante;
pub mod codec;
pub mod engine;
pub mod modules;
pub mod store_keys;
pub mod types;
pub mod v0;
pub mod v1;

mod wiring;

pub use ante::{AnteV0, AnteV1, FEE_COLLECTOR};
pub use codec::{BincodeTxCodec, JsonTxCodec};
pub use engine::{Engine, EngineError};
pub use types::{BeginBlocker, EndBlocker, InitChainer, Parent, Protocol};
pub use v0::ProtocolV0;
pub use v1::ProtocolV1;

use tessera_core::{KnownVersions, ProtocolKeeper};

/// Keeper over the key-spaces the bundled versions use for version bookkeeping
pub fn new_protocol_keeper() -> ProtocolKeeper {
    ProtocolKeeper::new(
        store_keys::main_store_key(),
        store_keys::upgrade_store_key(),
        KnownVersions::default(),
    )
}

/// Every version this binary ships, lowest first
pub fn default_protocols(keeper: &ProtocolKeeper) -> Vec<Box<dyn Protocol>> {
    vec![
        Box::new(ProtocolV0::new(keeper.clone())),
        Box::new(ProtocolV1::new(keeper.clone())),
    ]
}
