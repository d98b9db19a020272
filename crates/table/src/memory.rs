use parking_lot::RwLock;
use revkv_common::{Entry, Key, Revision, StoreError};
use std::collections::BTreeMap;

use crate::{Append, RevisionTable, expectation_holds};

/// In-memory revision table.
///
/// One lock covers the whole map. Writers take it exclusively for the full
/// check-append-purge step, so no reader ever sees a chain mid-update.
#[derive(Debug, Default)]
pub struct MemoryTable {
    chains: RwLock<BTreeMap<Key, Vec<Entry>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.chains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.read().is_empty()
    }
}

impl RevisionTable for MemoryTable {
    fn current_revision(&self, key: &Key) -> Result<Option<Revision>, StoreError> {
        Ok(self
            .chains
            .read()
            .get(key)
            .and_then(|chain| chain.last())
            .map(|entry| entry.revision))
    }

    fn compare_and_append(
        &self,
        key: &Key,
        expected: Revision,
        body: &[u8],
        purge: bool,
    ) -> Result<Append, StoreError> {
        let mut chains = self.chains.write();
        let current = chains
            .get(key)
            .and_then(|chain| chain.last())
            .map(|entry| entry.revision);
        if !expectation_holds(expected, current) {
            return Ok(Append::Mismatch { actual: current });
        }

        let revision = expected + 1;
        let chain = chains.entry(key.clone()).or_default();
        if purge {
            chain.clear();
        }
        chain.push(Entry::new(key.clone(), revision, body));
        Ok(Append::Written(revision))
    }

    fn latest(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .chains
            .read()
            .get(key)
            .and_then(|chain| chain.last())
            .cloned())
    }

    fn chain(&self, key: &Key) -> Result<Vec<Entry>, StoreError> {
        Ok(self.chains.read().get(key).cloned().unwrap_or_default())
    }

    fn remove_chain(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        Ok(self
            .chains
            .write()
            .remove(key)
            .and_then(|mut chain| chain.pop()))
    }

    fn latest_all(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self
            .chains
            .read()
            .values()
            .filter_map(|chain| chain.last().cloned())
            .collect())
    }
}
