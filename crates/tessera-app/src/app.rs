// Host Application
// Owns the multi-store and the hook slots and forwards every consensus
// lifecycle call to whatever the active protocol installed.
//
// SAFETY INVARIANTS:
// 1. The store-key union of all shipped versions is mounted before any load
// 2. Construction fails unless the persisted protocol version is loaded
// 3. Transaction writes are rolled back on failure; fee deduction survives a
//    failed message
// 4. Protocol switches happen only after the end blocker of a block

use std::sync::Arc;

use log::{debug, info, warn};

use tessera_core::{
    AppError, BlockHeader, CommitId, Context, Database, Event, GenesisState, HandlerResult,
    MultiStore, ProtocolKeeper, RequestBeginBlock, RequestEndBlock, RequestInitChain, RequestQuery,
    ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInitChain, ResponseQuery, Router, Tx, TxCodec, UpgradeConfig,
};
use tessera_protocol::{default_protocols, new_protocol_keeper, Engine, Protocol};
use tessera_upgrade::QueryVersion;

use crate::activation::post_end_blocker;
use crate::error::NodeError;
use crate::hooks::HookSlots;

pub const QUERY_APP_VERSION: &str = "app/version";
const CUSTOM_QUERY_PREFIX: &str = "custom/";

pub struct TesseraApp {
    chain_id: String,
    store: MultiStore,
    hooks: HookSlots,
    engine: Engine,
    tx_decoder: Arc<dyn TxCodec>,
    /// Header of the block in progress, between begin_block and commit
    header: Option<BlockHeader>,
}

impl TesseraApp {
    /// Node running every protocol version this binary ships
    pub fn new(chain_id: impl Into<String>, db: Arc<dyn Database>) -> Result<Self, NodeError> {
        let keeper = new_protocol_keeper();
        let protocols = default_protocols(&keeper);
        Self::with_protocols(chain_id, db, keeper, protocols)
    }

    pub fn with_protocols(
        chain_id: impl Into<String>,
        db: Arc<dyn Database>,
        keeper: ProtocolKeeper,
        protocols: Vec<Box<dyn Protocol>>,
    ) -> Result<Self, NodeError> {
        let chain_id = chain_id.into();
        let mut engine = Engine::with_protocols(keeper, protocols)?;

        let mut store = MultiStore::new(db);
        store.mount_all(engine.kv_store_keys().iter())?;
        let commit = store.load_latest()?;

        let mut hooks = HookSlots::default();
        let (loaded, version) = engine.load_current_protocol(&store, &mut hooks)?;
        let tx_decoder = match engine.current_protocol() {
            Some(protocol) if loaded => protocol.codec(),
            _ => {
                return Err(NodeError::UnsupportedProtocol {
                    version,
                    known: engine.versions(),
                })
            }
        };

        info!(
            "Node {} started at height {} on protocol version {} (shipped versions {:?}, tx codec {})",
            chain_id,
            commit.height,
            version,
            engine.versions(),
            tx_decoder.name()
        );

        Ok(TesseraApp {
            chain_id,
            store,
            hooks,
            engine,
            tx_decoder,
            header: None,
        })
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn current_version(&self) -> u64 {
        self.engine.current_version()
    }

    pub fn last_commit_id(&self) -> &CommitId {
        self.store.last_commit_id()
    }

    pub fn last_block_height(&self) -> u64 {
        self.store.last_commit_id().height
    }

    pub fn upgrade_config(&self) -> Result<Option<UpgradeConfig>, NodeError> {
        Ok(self.engine.protocol_keeper().upgrade_config(&self.store)?)
    }

    pub fn last_failed_version(&self) -> Result<u64, NodeError> {
        Ok(self.engine.protocol_keeper().last_failed_version(&self.store)?)
    }

    /// Codec of the active protocol
    pub fn tx_codec(&self) -> Arc<dyn TxCodec> {
        self.tx_decoder.clone()
    }

    pub fn hooks(&self) -> &HookSlots {
        &self.hooks
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Header used outside a block: next height, no time
    fn pending_header(&self) -> BlockHeader {
        self.header.clone().unwrap_or_else(|| BlockHeader {
            chain_id: self.chain_id.clone(),
            height: self.store.last_commit_id().height + 1,
            time: 0,
        })
    }

    pub fn init_chain(&mut self, req: RequestInitChain) -> Result<ResponseInitChain, NodeError> {
        let init_chainer = self.hooks.init_chainer().ok_or(NodeError::MissingHook("init chainer"))?;
        let param_store = self.hooks.param_store().ok_or(NodeError::MissingHook("param store"))?;

        if !req.chain_id.is_empty() && req.chain_id != self.chain_id {
            warn!("Genesis chain id {} overrides configured {}", req.chain_id, self.chain_id);
            self.chain_id = req.chain_id.clone();
        }

        let header = BlockHeader {
            chain_id: self.chain_id.clone(),
            height: 0,
            time: req.time,
        };
        let mut ctx = Context::new(&mut self.store, header, false);
        let params = req.consensus_params.clone().unwrap_or_default();
        param_store.set_consensus_params(&mut ctx, &params).map_err(NodeError::Genesis)?;
        let validators = init_chainer(&mut ctx, &req).map_err(NodeError::Genesis)?;

        info!(
            "Chain {} initialized on protocol version {} with {} genesis validators",
            self.chain_id,
            self.engine.current_version(),
            validators.len()
        );
        Ok(ResponseInitChain { validators })
    }

    pub fn begin_block(&mut self, req: RequestBeginBlock) -> Result<ResponseBeginBlock, NodeError> {
        let begin_blocker = self.hooks.begin_blocker().ok_or(NodeError::MissingHook("begin blocker"))?;
        self.header = Some(req.header.clone());

        let mut ctx = Context::new(&mut self.store, req.header.clone(), false);
        begin_blocker(&mut ctx, &req);
        Ok(ResponseBeginBlock {
            events: ctx.take_events(),
        })
    }

    /// Mempool admission. Runs only the ante handler and discards its writes.
    pub fn check_tx(&mut self, tx_bytes: &[u8]) -> Result<ResponseCheckTx, NodeError> {
        let ante = self.hooks.ante_handler().ok_or(NodeError::MissingHook("ante handler"))?;
        let tx = match self.tx_decoder.decode_tx(tx_bytes) {
            Ok(tx) => tx,
            Err(err) => return Ok(ResponseCheckTx::from_error(&AppError::tx_decode(err))),
        };

        let header = self.pending_header();
        let mut ctx = Context::new(&mut self.store, header, true);
        let snapshot = ctx.snapshot();
        let result = ante.ante(&mut ctx, &tx, false);
        ctx.restore(snapshot);

        Ok(match result {
            Ok(()) => ResponseCheckTx::default(),
            Err(err) => ResponseCheckTx::from_error(&err),
        })
    }

    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> Result<ResponseDeliverTx, NodeError> {
        let header = self.header.clone().ok_or(NodeError::NotInBlock("deliver_tx"))?;
        let ante = self.hooks.ante_handler().ok_or(NodeError::MissingHook("ante handler"))?;
        let router = self.hooks.router().ok_or(NodeError::MissingHook("router"))?;

        let tx = match self.tx_decoder.decode_tx(tx_bytes) {
            Ok(tx) => tx,
            Err(err) => {
                debug!("Rejecting undecodable tx with codec {}: {}", self.tx_decoder.name(), err);
                return Ok(ResponseDeliverTx::from_error(&AppError::tx_decode(err)));
            }
        };

        let mut ctx = Context::new(&mut self.store, header, false);
        let tx_snapshot = ctx.snapshot();
        if let Err(err) = ante.ante(&mut ctx, &tx, false) {
            ctx.restore(tx_snapshot);
            return Ok(ResponseDeliverTx::from_error(&err));
        }

        let msg_snapshot = ctx.snapshot();
        match run_msgs(&mut ctx, &router, &tx) {
            Ok(result) => Ok(ResponseDeliverTx {
                data: result.data,
                log: result.log,
                events: ctx.take_events(),
                ..Default::default()
            }),
            Err(err) => {
                ctx.restore(msg_snapshot);
                Ok(ResponseDeliverTx::from_error(&err))
            }
        }
    }

    pub fn end_block(&mut self, req: RequestEndBlock) -> Result<ResponseEndBlock, NodeError> {
        let header = self.header.clone().ok_or(NodeError::NotInBlock("end_block"))?;
        let end_blocker = self.hooks.end_blocker().ok_or(NodeError::MissingHook("end blocker"))?;
        if req.height != header.height {
            warn!("end_block height {} differs from block header height {}", req.height, header.height);
        }

        let mut ctx = Context::new(&mut self.store, header, false);
        let validator_updates = end_blocker(&mut ctx, &req);
        post_end_blocker(&mut self.engine, &mut self.hooks, &mut self.tx_decoder, &mut ctx);

        Ok(ResponseEndBlock {
            validator_updates,
            events: ctx.take_events(),
        })
    }

    pub fn commit(&mut self) -> Result<ResponseCommit, NodeError> {
        let commit = self.store.commit()?;
        self.header = None;
        debug!("Committed height {} with app hash {}", commit.height, commit.hash_hex());
        Ok(ResponseCommit {
            height: commit.height,
            data: commit.hash,
        })
    }

    /// Read-only queries against the working state. `app/version` reports
    /// the active protocol, `custom/<route>/...` goes to the module querier.
    pub fn query(&mut self, req: &RequestQuery) -> ResponseQuery {
        let height = self.last_block_height();
        match self.dispatch_query(req) {
            Ok(value) => ResponseQuery {
                value,
                height,
                ..Default::default()
            },
            Err(err) => ResponseQuery::from_error(&err, height),
        }
    }

    fn dispatch_query(&mut self, req: &RequestQuery) -> Result<Vec<u8>, AppError> {
        let path = req.path.trim_matches('/');
        if path == QUERY_APP_VERSION {
            return Ok(serde_json::to_vec_pretty(&QueryVersion::new(self.engine.current_version()))?);
        }

        let rest = path
            .strip_prefix(CUSTOM_QUERY_PREFIX)
            .ok_or_else(|| AppError::unknown_request(format!("unknown query path: {}", req.path)))?;
        let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();
        let (route, sub_path) = parts
            .split_first()
            .ok_or_else(|| AppError::unknown_request("missing custom query route"))?;

        let query_router = self
            .hooks
            .query_router()
            .ok_or_else(|| AppError::internal("no query router installed"))?;
        let querier = query_router
            .route(route)
            .cloned()
            .ok_or_else(|| AppError::unknown_request(format!("no custom querier for route {}", route)))?;

        let header = self.pending_header();
        let ctx = Context::new(&mut self.store, header, true);
        querier(&ctx, sub_path, req.data.as_slice())
    }

    /// Genesis of the active protocol over the working state
    pub fn export_genesis(&mut self) -> Result<GenesisState, NodeError> {
        let header = self.pending_header();
        let protocol = self
            .engine
            .current_protocol()
            .ok_or(NodeError::MissingHook("protocol"))?;
        let ctx = Context::new(&mut self.store, header, true);
        protocol.export_genesis(&ctx).map_err(NodeError::Export)
    }
}

fn run_msgs(ctx: &mut Context<'_>, router: &Router, tx: &Tx) -> Result<HandlerResult, AppError> {
    let mut data = Vec::new();
    let mut logs = Vec::new();
    for (index, msg) in tx.body.msgs.iter().enumerate() {
        let handler = router
            .route(msg.route())
            .ok_or_else(|| AppError::unknown_request(format!("unrecognized message route: {}", msg.route())))?;
        let result = handler(&mut *ctx, msg).map_err(|mut err| {
            err.message = format!("msg {}: {}", index, err.message);
            err
        })?;

        data.extend(result.data);
        if !result.log.is_empty() {
            logs.push(result.log);
        }
        ctx.emit_event(
            Event::new("message")
                .with_attribute("action", msg.kind())
                .with_attribute("module", msg.route()),
        );
    }
    Ok(HandlerResult {
        data,
        log: logs.join("; "),
    })
}
