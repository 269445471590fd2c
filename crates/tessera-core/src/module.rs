// Module manager
// Fixes the order in which a protocol's modules run their genesis and block hooks.
//
// SAFETY INVARIANTS:
// 1. Every module appears exactly once in every ordering
// 2. Only one module may produce the genesis validator set

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use crate::abci::{GenesisState, RequestBeginBlock, RequestEndBlock, ValidatorUpdate};
use crate::context::Context;
use crate::error::AppError;
use crate::router::{Handler, QueryRouter, Querier, Router};

pub trait AppModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Message handler, registered under the module name
    fn handler(&self) -> Option<Handler> {
        None
    }

    /// Custom querier, registered under the module name
    fn querier(&self) -> Option<Querier> {
        None
    }

    fn default_genesis(&self) -> serde_json::Value;

    fn init_genesis(&self, ctx: &mut Context<'_>, data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError>;

    fn export_genesis(&self, ctx: &Context<'_>) -> Result<serde_json::Value, AppError>;

    fn begin_block(&self, _ctx: &mut Context<'_>, _req: &RequestBeginBlock) {}

    fn end_block(&self, _ctx: &mut Context<'_>, _req: &RequestEndBlock) -> Vec<ValidatorUpdate> {
        Vec::new()
    }
}

pub struct ModuleManager {
    modules: BTreeMap<&'static str, Arc<dyn AppModule>>,
    order_init_genesis: Vec<&'static str>,
    order_begin_blockers: Vec<&'static str>,
    order_end_blockers: Vec<&'static str>,
}

impl ModuleManager {
    /// Orders default to registration order
    pub fn new(modules: Vec<Arc<dyn AppModule>>) -> Self {
        let names: Vec<&'static str> = modules.iter().map(|m| m.name()).collect();
        let mut map = BTreeMap::new();
        for module in modules {
            if map.insert(module.name(), module.clone()).is_some() {
                panic!("module {} registered twice", module.name());
            }
        }
        ModuleManager {
            modules: map,
            order_init_genesis: names.clone(),
            order_begin_blockers: names.clone(),
            order_end_blockers: names,
        }
    }

    fn checked_order(&self, order: &[&'static str]) -> Vec<&'static str> {
        let given: BTreeSet<&str> = order.iter().copied().collect();
        let known: BTreeSet<&str> = self.modules.keys().copied().collect();
        if given != known || given.len() != order.len() {
            panic!("module order {:?} must name each of {:?} exactly once", order, known);
        }
        order.to_vec()
    }

    pub fn set_order_init_genesis(&mut self, order: &[&'static str]) {
        self.order_init_genesis = self.checked_order(order);
    }

    pub fn set_order_begin_blockers(&mut self, order: &[&'static str]) {
        self.order_begin_blockers = self.checked_order(order);
    }

    pub fn set_order_end_blockers(&mut self, order: &[&'static str]) {
        self.order_end_blockers = self.checked_order(order);
    }

    pub fn module(&self, name: &str) -> Option<&Arc<dyn AppModule>> {
        self.modules.get(name)
    }

    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.keys().copied().collect()
    }

    pub fn register_routes(&self, router: &mut Router, query_router: &mut QueryRouter) {
        for (name, module) in &self.modules {
            if let Some(handler) = module.handler() {
                router.add_route(name, handler);
            }
            if let Some(querier) = module.querier() {
                query_router.add_route(name, querier);
            }
        }
    }

    pub fn default_genesis(&self) -> GenesisState {
        self.modules
            .iter()
            .map(|(name, m)| (name.to_string(), m.default_genesis()))
            .collect()
    }

    pub fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &GenesisState) -> Result<Vec<ValidatorUpdate>, AppError> {
        let mut validators = Vec::new();
        for name in &self.order_init_genesis {
            let module = &self.modules[name];
            let data = genesis.get(*name).cloned().unwrap_or_else(|| module.default_genesis());
            let updates = module.init_genesis(ctx, &data)?;
            if !updates.is_empty() {
                if !validators.is_empty() {
                    panic!("validator set already produced by a previous module; {} cannot set it again", name);
                }
                validators = updates;
            }
            debug!("Initialized genesis for module {}", name);
        }
        Ok(validators)
    }

    pub fn export_genesis(&self, ctx: &Context<'_>) -> Result<GenesisState, AppError> {
        let mut genesis = GenesisState::new();
        for (name, module) in &self.modules {
            genesis.insert(name.to_string(), module.export_genesis(ctx)?);
        }
        Ok(genesis)
    }

    pub fn begin_block(&self, ctx: &mut Context<'_>, req: &RequestBeginBlock) {
        for name in &self.order_begin_blockers {
            self.modules[name].begin_block(ctx, req);
        }
    }

    pub fn end_block(&self, ctx: &mut Context<'_>, req: &RequestEndBlock) -> Vec<ValidatorUpdate> {
        let mut validators = Vec::new();
        for name in &self.order_end_blockers {
            let updates = self.modules[name].end_block(ctx, req);
            if !updates.is_empty() {
                if !validators.is_empty() {
                    panic!("validator updates already produced by a previous module; {} cannot set them again", name);
                }
                validators = updates;
            }
        }
        validators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::store::{MemDb, MultiStore};
    use crate::context::BlockHeader;

    struct Recorder(&'static str);

    impl AppModule for Recorder {
        fn name(&self) -> &'static str {
            self.0
        }

        fn default_genesis(&self) -> serde_json::Value {
            serde_json::json!({})
        }

        fn init_genesis(&self, _ctx: &mut Context<'_>, _data: &serde_json::Value) -> Result<Vec<ValidatorUpdate>, AppError> {
            Ok(Vec::new())
        }

        fn export_genesis(&self, _ctx: &Context<'_>) -> Result<serde_json::Value, AppError> {
            Ok(serde_json::json!({ "module": self.0 }))
        }

        fn end_block(&self, ctx: &mut Context<'_>, _req: &RequestEndBlock) -> Vec<ValidatorUpdate> {
            ctx.emit_event(Event::new(self.0));
            Vec::new()
        }
    }

    fn manager() -> ModuleManager {
        ModuleManager::new(vec![Arc::new(Recorder("bank")), Arc::new(Recorder("gov")), Arc::new(Recorder("upgrade"))])
    }

    #[test]
    fn test_end_block_follows_order() {
        let mut mm = manager();
        mm.set_order_end_blockers(&["gov", "upgrade", "bank"]);

        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.load_latest().unwrap();
        let mut ctx = Context::new(&mut store, BlockHeader::default(), false);
        mm.end_block(&mut ctx, &RequestEndBlock { height: 1 });

        let kinds: Vec<&str> = ctx.events().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["gov", "upgrade", "bank"]);
    }

    #[test]
    #[should_panic(expected = "exactly once")]
    fn test_incomplete_order_panics() {
        let mut mm = manager();
        mm.set_order_begin_blockers(&["gov", "bank"]);
    }

    #[test]
    fn test_export_covers_every_module() {
        let mm = manager();
        let mut store = MultiStore::new(Arc::new(MemDb::new()));
        store.load_latest().unwrap();
        let ctx = Context::new(&mut store, BlockHeader::default(), false);
        let exported = mm.export_genesis(&ctx).unwrap();
        assert_eq!(exported.keys().collect::<Vec<_>>(), vec!["bank", "gov", "upgrade"]);
    }
}
