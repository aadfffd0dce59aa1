use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::record::{Patch, Record};
use super::store::{DataStore, StoreError};


pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Record>>>,
    
    indexes: RwLock<HashMap<(String, String), String>>,
    blobs: RwLock<HashSet<String>>,
    
    failing: RwLock<HashSet<String>>,
    /// Successful document patches and deletes.
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            indexes: RwLock::new(HashMap::new()),
            blobs: RwLock::new(HashSet::new()),
            failing: RwLock::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_index(self, table: &str, index: &str, field: &str) -> Self {
        self.add_index(table, index, field);
        self
    }

    pub fn add_index(&self, table: &str, index: &str, field: &str) {
        self.indexes
            .write()
            .insert((table.to_string(), index.to_string()), field.to_string());
    }

    pub fn insert(&self, table: &str, record: Record) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn put_blob(&self, blob_id: &str) {
        self.blobs.write().insert(blob_id.to_string());
    }

    pub fn has_blob(&self, blob_id: &str) -> bool {
        self.blobs.read().contains(blob_id)
    }

    
    pub fn fail_writes_for(&self, id: &str) {
        self.failing.write().insert(id.to_string());
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn record(&self, table: &str, id: &str) -> Option<Record> {
        self.tables
            .read()
            .get(table)
            .and_then(|records| records.get(id))
            .cloned()
    }

    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Counts documents in `table` whose `field` still equals `value`.
    pub fn count_references(&self, table: &str, field: &str, value: &str) -> usize {
        self.tables
            .read()
            .get(table)
            .map(|records| records.values().filter(|r| r.references(field, value)).count())
            .unwrap_or(0)
    }

    fn check_writable(&self, id: &str) -> Result<(), StoreError> {
        if self.failing.read().contains(id) {
            return Err(StoreError::Rejected(format!("write to {} rejected", id)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get(&self, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.record(table, id))
    }

    async fn patch(&self, table: &str, id: &str, patch: Patch) -> Result<(), StoreError> {
        self.check_writable(id)?;

        let mut tables = self.tables.write();
        let record = tables
            .get_mut(table)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", table, id)))?;

        record.apply(patch);
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("Patched {}/{}", table, id);
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), StoreError> {
        self.check_writable(id)?;

        let mut tables = self.tables.write();
        match tables.get_mut(table).and_then(|records| records.remove(id)) {
            Some(_) => {
                self.writes.fetch_add(1, Ordering::SeqCst);
                debug!("Deleted {}/{}", table, id);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{}/{}", table, id))),
        }
    }

    async fn query_by_index(
        &self,
        table: &str,
        index: &str,
        key: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let field = self
            .indexes
            .read()
            .get(&(table.to_string(), index.to_string()))
            .cloned()
            .ok_or_else(|| {
                StoreError::Rejected(format!("index {} is not defined on {}", index, table))
            })?;

        Ok(self
            .tables
            .read()
            .get(table)
            .map(|records| {
                records
                    .values()
                    .filter(|r| r.references(&field, key))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<(), StoreError> {
        self.check_writable(blob_id)?;

        if self.blobs.write().remove(blob_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("blob {}", blob_id)))
        }
    }
}
