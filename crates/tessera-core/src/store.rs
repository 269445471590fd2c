// Multi-Store - Fixed Key-Space Layout
// Working state for every mounted key-space, committed to the database as one batch.
//
// SAFETY INVARIANTS:
// 1. The set of mounted key-spaces is frozen once the store is loaded
// 2. Commit hashes depend only on committed bytes, never on write order
// 3. A restored snapshot leaves no trace of writes made after it
// 4. Every write since the last commit is journaled with the value it replaced;
//    snapshots are journal positions, so rollback and commit cost is
//    proportional to the writes, not to the state

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const DATA_PREFIX: &[u8] = b"s/";
const META_LATEST_HEIGHT: &[u8] = b"m/latest_height";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store name: {0}")]
    InvalidName(String),

    #[error("store key already mounted: {0}")]
    DuplicateMount(String),

    #[error("cannot mount {0} after the store was loaded")]
    MountAfterLoad(String),

    #[error("store is not loaded")]
    NotLoaded,

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("value encoding error: {0}")]
    Codec(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

/// Name of one key-space inside the multi-store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(name: impl Into<String>) -> Self {
        StoreKey(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single write in a database batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Physical storage underneath the multi-store
pub trait Database: Send + Sync {
    /// All entries whose key starts with `prefix`, in key order
    fn load_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Applies every op or none of them
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError>;
}

/// In-memory database. Clones share the same map, so a second
/// multi-store opened on a clone sees everything the first one committed.
#[derive(Debug, Clone, Default)]
pub struct MemDb {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Database for MemDb {
    fn load_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let map = self.inner.read();
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => {
                    map.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    map.remove(&k);
                }
            }
        }
        Ok(())
    }
}

/// On-disk database backed by sled
pub struct SledDb {
    db: sled::Db,
}

impl SledDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(SledDb { db })
    }
}

impl Database for SledDb {
    fn load_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (k, v) = item?;
            entries.push((k.to_vec(), v.to_vec()));
        }
        Ok(entries)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => batch.insert(k, v),
                BatchOp::Delete(k) => batch.remove(k),
            }
        }
        self.db.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }
}

/// A write as recorded in the journal: the key and the value it replaced
type JournalEntry = (Vec<u8>, Option<Vec<u8>>);

/// Sorted key/value map for one key-space
#[derive(Debug, Clone, Default)]
pub struct KvStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    journal: Vec<JournalEntry>,
}

impl PartialEq for KvStore {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for KvStore {}

impl KvStore {
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: Vec<u8>) {
        let key = key.into();
        let prior = self.entries.insert(key.clone(), value);
        self.journal.push((key, prior));
    }

    pub fn delete(&mut self, key: &[u8]) -> bool {
        match self.entries.remove(key) {
            Some(prior) => {
                self.journal.push((key.to_vec(), Some(prior)));
                true
            }
            None => false,
        }
    }

    pub fn iter_prefix<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Journaled writes since the last commit
    pub fn pending_writes(&self) -> usize {
        self.journal.len()
    }

    /// Undoes journaled writes, newest first, until `mark` entries remain
    fn rewind(&mut self, mark: usize) {
        while self.journal.len() > mark {
            if let Some((key, prior)) = self.journal.pop() {
                match prior {
                    Some(value) => {
                        self.entries.insert(key, value);
                    }
                    None => {
                        self.entries.remove(&key);
                    }
                }
            }
        }
    }

    /// Keys written since the last commit with their committed values.
    /// The first journal entry of a key holds the value it had at commit.
    fn committed_values(&self) -> BTreeMap<&[u8], Option<&[u8]>> {
        let mut committed = BTreeMap::new();
        for (key, prior) in &self.journal {
            committed
                .entry(key.as_slice())
                .or_insert_with(|| prior.as_deref());
        }
        committed
    }

    pub fn get_bincode<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.get(key) {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_bincode<T: Serialize>(&mut self, key: impl Into<Vec<u8>>, value: &T) -> Result<(), StoreError> {
        let bytes = bincode::serialize(value)?;
        self.set(key, bytes);
        Ok(())
    }
}

/// Height and hash of a committed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitId {
    pub height: u64,
    pub hash: Vec<u8>,
}

impl CommitId {
    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }
}

/// Journal position of every key-space, valid until the next commit
#[derive(Debug, Clone)]
pub struct Snapshot {
    epoch: u64,
    marks: BTreeMap<String, usize>,
}

/// All mounted key-spaces over one database
pub struct MultiStore {
    db: Arc<dyn Database>,
    keys: BTreeMap<String, StoreKey>,
    working: BTreeMap<String, KvStore>,
    last_commit: CommitId,
    /// Bumped on load and commit; snapshots from an earlier epoch are void
    epoch: u64,
    loaded: bool,
}

impl MultiStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        MultiStore {
            db,
            keys: BTreeMap::new(),
            working: BTreeMap::new(),
            last_commit: CommitId { height: 0, hash: Vec::new() },
            epoch: 0,
            loaded: false,
        }
    }

    pub fn mount(&mut self, key: &StoreKey) -> Result<(), StoreError> {
        if self.loaded {
            return Err(StoreError::MountAfterLoad(key.name().to_string()));
        }
        if key.name().is_empty() || key.name().contains('/') {
            return Err(StoreError::InvalidName(key.name().to_string()));
        }
        if self.keys.contains_key(key.name()) {
            return Err(StoreError::DuplicateMount(key.name().to_string()));
        }
        self.keys.insert(key.name().to_string(), key.clone());
        Ok(())
    }

    pub fn mount_all<'a>(&mut self, keys: impl IntoIterator<Item = &'a StoreKey>) -> Result<(), StoreError> {
        for key in keys {
            self.mount(key)?;
        }
        Ok(())
    }

    pub fn is_mounted(&self, key: &StoreKey) -> bool {
        self.keys.contains_key(key.name())
    }

    pub fn mounted_keys(&self) -> impl Iterator<Item = &StoreKey> {
        self.keys.values()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reads every mounted key-space back from the database
    pub fn load_latest(&mut self) -> Result<CommitId, StoreError> {
        let mut stores = BTreeMap::new();
        for name in self.keys.keys() {
            let prefix = data_prefix(name);
            let entries = self
                .db
                .load_prefix(&prefix)?
                .into_iter()
                .map(|(k, v)| (k[prefix.len()..].to_vec(), v))
                .collect();
            stores.insert(
                name.clone(),
                KvStore {
                    entries,
                    journal: Vec::new(),
                },
            );
        }

        let height = match self.db.get(META_LATEST_HEIGHT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::CorruptMetadata("latest height is not 8 bytes".to_string()))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };

        let stray = self.db.load_prefix(DATA_PREFIX)?.len() - stores.values().map(KvStore::len).sum::<usize>();
        if stray > 0 {
            warn!("{} persisted entries belong to key-spaces this binary does not mount", stray);
        }

        self.last_commit = CommitId { height, hash: commit_hash(&stores) };
        self.working = stores;
        self.epoch += 1;
        self.loaded = true;

        info!(
            "Multi-store loaded at height {} with {} key-spaces (hash {})",
            height,
            self.keys.len(),
            self.last_commit.hash_hex()
        );
        Ok(self.last_commit.clone())
    }

    /// Working state of a mounted key-space.
    ///
    /// Panics if `key` was never mounted: keepers are wired against the
    /// mounted set at construction, so a miss is a wiring fault.
    pub fn kv_store(&self, key: &StoreKey) -> &KvStore {
        self.working
            .get(key.name())
            .unwrap_or_else(|| panic!("key-space {} is not mounted", key))
    }

    pub fn kv_store_mut(&mut self, key: &StoreKey) -> &mut KvStore {
        self.working
            .get_mut(key.name())
            .unwrap_or_else(|| panic!("key-space {} is not mounted", key))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            epoch: self.epoch,
            marks: self
                .working
                .iter()
                .map(|(name, store)| (name.clone(), store.journal.len()))
                .collect(),
        }
    }

    /// Undoes every write made since `snapshot` was taken. Snapshots nest;
    /// restoring an outer one also discards writes kept by an inner one.
    ///
    /// Panics if `snapshot` predates the last commit or load.
    pub fn restore(&mut self, snapshot: Snapshot) {
        if snapshot.epoch != self.epoch {
            panic!(
                "snapshot from an earlier height cannot be restored (epoch {}, now {})",
                snapshot.epoch, self.epoch
            );
        }
        let mut undone = 0;
        for (name, store) in self.working.iter_mut() {
            let mark = snapshot.marks.get(name).copied().unwrap_or(0);
            undone += store.journal.len().saturating_sub(mark);
            store.rewind(mark);
        }
        debug!("Restored snapshot, {} writes undone", undone);
    }

    pub fn last_commit_id(&self) -> &CommitId {
        &self.last_commit
    }

    /// Persists the working state and advances the committed height by one
    pub fn commit(&mut self) -> Result<CommitId, StoreError> {
        if !self.loaded {
            return Err(StoreError::NotLoaded);
        }

        let mut ops = Vec::new();
        for (name, store) in &self.working {
            for (k, committed) in store.committed_values() {
                match store.get(k) {
                    Some(v) if committed != Some(v) => ops.push(BatchOp::Put(data_key(name, k), v.to_vec())),
                    None if committed.is_some() => ops.push(BatchOp::Delete(data_key(name, k))),
                    _ => {}
                }
            }
        }

        let height = self.last_commit.height + 1;
        ops.push(BatchOp::Put(META_LATEST_HEIGHT.to_vec(), height.to_be_bytes().to_vec()));
        let writes = ops.len();
        self.db.write_batch(ops)?;

        for store in self.working.values_mut() {
            store.journal.clear();
        }
        self.epoch += 1;
        self.last_commit = CommitId { height, hash: commit_hash(&self.working) };
        debug!(
            "Committed height {} ({} writes, hash {})",
            height,
            writes,
            self.last_commit.hash_hex()
        );
        Ok(self.last_commit.clone())
    }
}

fn data_prefix(name: &str) -> Vec<u8> {
    let mut prefix = DATA_PREFIX.to_vec();
    prefix.extend_from_slice(name.as_bytes());
    prefix.push(b'/');
    prefix
}

fn data_key(name: &str, key: &[u8]) -> Vec<u8> {
    let mut full = data_prefix(name);
    full.extend_from_slice(key);
    full
}

fn commit_hash(stores: &BTreeMap<String, KvStore>) -> Vec<u8> {
    let mut hasher = Sha256::new();
    for (name, store) in stores {
        hasher.update((name.len() as u32).to_be_bytes());
        hasher.update(name.as_bytes());
        for (k, v) in store.entries.iter() {
            hasher.update((k.len() as u32).to_be_bytes());
            hasher.update(k);
            hasher.update((v.len() as u32).to_be_bytes());
            hasher.update(v);
        }
    }
    hasher.finalize().to_vec()
}
