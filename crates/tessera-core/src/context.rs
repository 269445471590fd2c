use serde::{Deserialize, Serialize};

use crate::events::{Event, EventManager};
use crate::store::{KvStore, MultiStore, Snapshot, StoreKey};

/// Header of the block being processed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: u64,
    /// Unix seconds, as proposed by consensus
    pub time: u64,
}

/// Execution context handed to every keeper, handler and lifecycle hook.
///
/// Borrows the multi-store for the duration of one call, so nothing outside
/// the sequential block path can observe half-applied writes.
pub struct Context<'a> {
    store: &'a mut MultiStore,
    header: BlockHeader,
    events: EventManager,
    check_tx: bool,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut MultiStore, header: BlockHeader, check_tx: bool) -> Self {
        Context {
            store,
            header,
            events: EventManager::default(),
            check_tx,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn is_check_tx(&self) -> bool {
        self.check_tx
    }

    pub fn kv_store(&self, key: &StoreKey) -> &KvStore {
        self.store.kv_store(key)
    }

    pub fn kv_store_mut(&mut self, key: &StoreKey) -> &mut KvStore {
        self.store.kv_store_mut(key)
    }

    pub fn store(&self) -> &MultiStore {
        &*self.store
    }

    pub fn multi_store(&mut self) -> &mut MultiStore {
        &mut *self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.store.restore(snapshot);
    }

    pub fn emit_event(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub fn event_manager(&mut self) -> &mut EventManager {
        &mut self.events
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take()
    }
}
