use rustc_hash::FxHashMap;

use super::{EntityKind, EntityStore, Record, StoreError};

/// Hash-map backed store. The only backend the pipeline ships with; also
/// what the tests drive the ledger against.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: FxHashMap<(EntityKind, String), Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of stored records of one kind. Test and progress-log helper.
    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.records.keys().filter(|(k, _)| *k == kind).count()
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.records.get(&(kind, id.to_string())).cloned())
    }

    fn put(&mut self, kind: EntityKind, id: &str, record: Record) -> Result<(), StoreError> {
        self.records.insert((kind, id.to_string()), record);
        Ok(())
    }
}
