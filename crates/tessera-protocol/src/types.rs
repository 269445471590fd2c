// Protocol instance contract
//
// SAFETY INVARIANTS:
// 1. load_context runs at most once per instance
// 2. Every push into the parent replaces the slot; nothing accumulates
// 3. The declared key-spaces never change after construction

use std::sync::Arc;

use tessera_core::{
    AnteHandler, AppError, Context, GenesisState, ParamStore, QueryRouter, RequestBeginBlock,
    RequestEndBlock, RequestInitChain, Router, StoreKey, TxCodec, ValidatorUpdate,
};

pub type InitChainer =
    Arc<dyn Fn(&mut Context<'_>, &RequestInitChain) -> Result<Vec<ValidatorUpdate>, AppError> + Send + Sync>;

pub type BeginBlocker = Arc<dyn Fn(&mut Context<'_>, &RequestBeginBlock) + Send + Sync>;

pub type EndBlocker = Arc<dyn Fn(&mut Context<'_>, &RequestEndBlock) -> Vec<ValidatorUpdate> + Send + Sync>;

/// Capabilities the host application exposes to a loading protocol.
/// Each call overwrites the corresponding slot.
pub trait Parent {
    fn push_init_chainer(&mut self, init_chainer: InitChainer);

    fn push_begin_blocker(&mut self, begin_blocker: BeginBlocker);

    fn push_end_blocker(&mut self, end_blocker: EndBlocker);

    fn push_ante_handler(&mut self, ante_handler: Arc<dyn AnteHandler>);

    fn set_router(&mut self, router: Arc<Router>, query_router: Arc<QueryRouter>);

    fn set_param_store(&mut self, param_store: Arc<dyn ParamStore>);
}

/// One version of the ledger's transaction-processing logic
pub trait Protocol: Send {
    fn version(&self) -> u64;

    /// Builds keepers, routers and the ante handler, then installs them and
    /// the lifecycle hooks into `parent`.
    ///
    /// Panics if called twice or on any wiring inconsistency.
    fn load_context(&mut self, parent: &mut dyn Parent);

    fn is_loaded(&self) -> bool;

    fn codec(&self) -> Arc<dyn TxCodec>;

    /// Key-spaces this version reads or writes
    fn kv_store_keys(&self) -> Vec<StoreKey>;

    fn default_genesis(&self) -> GenesisState;

    /// Genesis of the loaded version's modules at the current state
    fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState, AppError>;
}
