//! Key-value persistence for contract state
//!
//! ## Storage Layout
//!
//! Every contract owns a disjoint key space:
//!
//! ```text
//! contract hash (20 bytes) || table tag (1 byte) || key parts
//! ```
//!
//! Invocations never write to the base store directly. They buffer writes
//! in an [`Overlay`] and the resulting [`WriteBatch`] is applied in one step
//! when the invocation succeeds.

use lode_crypto::Address;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Key/value pairs as returned by prefix scans, sorted by key
pub type Entries = Vec<(Vec<u8>, Vec<u8>)>;

/// Persistent key-value store supplied by the host chain
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Entries;

    /// Apply every put and delete of `batch` atomically
    fn apply(&self, batch: WriteBatch);
}

/// Ordered set of pending writes; `None` marks a delete
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.insert(key, None);
    }

    /// `Some(None)` when the key is deleted in this batch
    pub fn lookup(&self, key: &[u8]) -> Option<Option<&[u8]>> {
        self.ops.get(key).map(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Option<Vec<u8>>)> {
        self.ops.iter()
    }

    fn range_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a Vec<u8>, &'a Option<Vec<u8>>)> + 'a {
        self.ops
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(k, _)| k.starts_with(prefix))
    }
}

impl IntoIterator for WriteBatch {
    type Item = (Vec<u8>, Option<Vec<u8>>);
    type IntoIter = std::collections::btree_map::IntoIter<Vec<u8>, Option<Vec<u8>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// In-memory store
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.read().get(key).cloned()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Entries {
        self.data
            .read()
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn apply(&self, batch: WriteBatch) {
        let mut data = self.data.write();
        for (key, value) in batch {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
    }
}

/// Buffered writes layered over a read-only base
pub struct Overlay<'a> {
    base: &'a dyn KvStore,
    writes: WriteBatch,
}

impl<'a> Overlay<'a> {
    pub fn new(base: &'a dyn KvStore) -> Self {
        Self {
            base,
            writes: WriteBatch::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.lookup(key) {
            Some(pending) => pending.map(|v| v.to_vec()),
            None => self.base.get(key),
        }
    }

    /// Base entries merged with pending writes
    pub fn scan_prefix(&self, prefix: &[u8]) -> Entries {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.base.scan_prefix(prefix).into_iter().collect();
        for (key, value) in self.writes.range_prefix(prefix) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.put(key, value);
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.delete(key);
    }

    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    pub fn into_batch(self) -> WriteBatch {
        self.writes
    }
}

/// Key builder for one table of one contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    prefix: Vec<u8>,
}

impl Namespace {
    pub fn new(owner: &Address, table: u8) -> Self {
        let mut prefix = Vec::with_capacity(21);
        prefix.extend_from_slice(owner.as_bytes());
        prefix.push(table);
        Self { prefix }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Prefix followed by every part in order
    pub fn key(&self, parts: &[&[u8]]) -> Vec<u8> {
        let len = self.prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
        let mut key = Vec::with_capacity(len);
        key.extend_from_slice(&self.prefix);
        for part in parts {
            key.extend_from_slice(part);
        }
        key
    }

    /// Key with the namespace prefix removed
    pub fn strip<'k>(&self, key: &'k [u8]) -> Option<&'k [u8]> {
        key.strip_prefix(self.prefix.as_slice())
    }
}
