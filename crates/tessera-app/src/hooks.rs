// Hook slots
// The capabilities a loading protocol installs into the host.
//
// SAFETY INVARIANTS:
// 1. One slot per hook kind; installing overwrites, nothing is chained
// 2. Every slot is filled by the same protocol version after a load

use std::sync::Arc;

use log::debug;

use tessera_core::{AnteHandler, ParamStore, QueryRouter, Router};
use tessera_protocol::{BeginBlocker, EndBlocker, InitChainer, Parent};

#[derive(Default)]
pub struct HookSlots {
    init_chainer: Option<InitChainer>,
    begin_blocker: Option<BeginBlocker>,
    end_blocker: Option<EndBlocker>,
    ante_handler: Option<Arc<dyn AnteHandler>>,
    router: Option<Arc<Router>>,
    query_router: Option<Arc<QueryRouter>>,
    param_store: Option<Arc<dyn ParamStore>>,
}

impl HookSlots {
    pub fn init_chainer(&self) -> Option<InitChainer> {
        self.init_chainer.clone()
    }

    pub fn begin_blocker(&self) -> Option<BeginBlocker> {
        self.begin_blocker.clone()
    }

    pub fn end_blocker(&self) -> Option<EndBlocker> {
        self.end_blocker.clone()
    }

    pub fn ante_handler(&self) -> Option<Arc<dyn AnteHandler>> {
        self.ante_handler.clone()
    }

    pub fn router(&self) -> Option<Arc<Router>> {
        self.router.clone()
    }

    pub fn query_router(&self) -> Option<Arc<QueryRouter>> {
        self.query_router.clone()
    }

    pub fn param_store(&self) -> Option<Arc<dyn ParamStore>> {
        self.param_store.clone()
    }
}

impl Parent for HookSlots {
    fn push_init_chainer(&mut self, init_chainer: InitChainer) {
        self.init_chainer = Some(init_chainer);
    }

    fn push_begin_blocker(&mut self, begin_blocker: BeginBlocker) {
        self.begin_blocker = Some(begin_blocker);
    }

    fn push_end_blocker(&mut self, end_blocker: EndBlocker) {
        self.end_blocker = Some(end_blocker);
    }

    fn push_ante_handler(&mut self, ante_handler: Arc<dyn AnteHandler>) {
        debug!("Installing ante handler of protocol version {}", ante_handler.version());
        self.ante_handler = Some(ante_handler);
    }

    fn set_router(&mut self, router: Arc<Router>, query_router: Arc<QueryRouter>) {
        debug!("Installing routers of protocol version {}", router.version());
        self.router = Some(router);
        self.query_router = Some(query_router);
    }

    fn set_param_store(&mut self, param_store: Arc<dyn ParamStore>) {
        self.param_store = Some(param_store);
    }
}
