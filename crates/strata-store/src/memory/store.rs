use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type ColumnFamily = OrdMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered store.
///
/// Every column family is an immutable `OrdMap` behind an `ArcSwap`, so a
/// transaction snapshot is a structural-sharing clone and a commit is a
/// pointer swap. Writers are serialized by `write_lock`.
pub struct MemoryStore {
    cfs: RwLock<HashMap<String, Arc<ArcSwap<ColumnFamily>>>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cfs: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Current committed contents of one column family.
    pub(crate) fn snapshot_cf(&self, name: &str) -> Result<Option<ColumnFamily>, StoreError> {
        let cfs = self.cfs.read().map_err(poisoned)?;
        Ok(cfs.get(name).map(|arc| (**arc.load()).clone()))
    }

    /// Publish the written column families of a finished transaction.
    pub(crate) fn publish(&self, dirty: HashMap<String, ColumnFamily>) -> Result<(), StoreError> {
        let cfs = self.cfs.read().map_err(poisoned)?;
        for (name, data) in dirty {
            match cfs.get(&name) {
                Some(arc) => arc.store(Arc::new(data)),
                None => return Err(StoreError::MissingRegion(name.to_string())),
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            return Ok(MemoryTransaction::new_read_only(self));
        }
        let guard = self.write_lock.lock().map_err(poisoned)?;
        Ok(MemoryTransaction::new_writable(self, guard))
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.cfs.write().map_err(poisoned)?;
        cfs.entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.cfs.write().map_err(poisoned)?;
        cfs.remove(name);
        Ok(())
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Storage(format!("lock poisoned: {e}"))
}
