use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ops::Bound;
use std::sync::MutexGuard;

use crate::error::StoreError;
use crate::store::{ScanIter, Transaction, prefix_end};

use super::store::{ColumnFamily, MemoryStore};

/// Column family handle for the memory backend.
///
/// A name token only. Reads go through the transaction snapshot so that
/// writes made earlier in the same transaction are visible.
#[derive(Debug, Clone)]
pub struct MemoryCf {
    pub(crate) name: String,
}

pub struct MemoryTransaction<'a> {
    /// `None` once committed or rolled back.
    snapshot: RefCell<Option<HashMap<String, ColumnFamily>>>,
    dirty: RefCell<HashSet<String>>,
    store: &'a MemoryStore,
    read_only: bool,
    _write_guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new_read_only(store: &'a MemoryStore) -> Self {
        Self {
            snapshot: RefCell::new(Some(HashMap::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: true,
            _write_guard: None,
        }
    }

    pub(crate) fn new_writable(store: &'a MemoryStore, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            snapshot: RefCell::new(Some(HashMap::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: false,
            _write_guard: Some(guard),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn read<R>(&self, cf: &MemoryCf, f: impl FnOnce(&ColumnFamily) -> R) -> Result<R, StoreError> {
        let snap = self.snapshot.borrow();
        let snap = snap.as_ref().ok_or(StoreError::TransactionConsumed)?;
        let data = snap
            .get(&cf.name)
            .ok_or_else(|| StoreError::MissingRegion(cf.name.clone()))?;
        Ok(f(data))
    }

    fn write<R>(
        &self,
        cf: &MemoryCf,
        f: impl FnOnce(&mut ColumnFamily) -> R,
    ) -> Result<R, StoreError> {
        self.check_writable()?;
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        let data = snap
            .get_mut(&cf.name)
            .ok_or_else(|| StoreError::MissingRegion(cf.name.clone()))?;
        self.dirty.borrow_mut().insert(cf.name.clone());
        Ok(f(data))
    }
}

impl<'a> Transaction for MemoryTransaction<'a> {
    type Cf = MemoryCf;

    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError> {
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        if !snap.contains_key(name) {
            let data = self
                .store
                .snapshot_cf(name)?
                .ok_or_else(|| StoreError::MissingRegion(name.to_string()))?;
            snap.insert(name.to_string(), data);
        }
        Ok(MemoryCf {
            name: name.to_string(),
        })
    }

    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(cf, |data| data.get(key).cloned())
    }

    fn has(&self, cf: &Self::Cf, key: &[u8]) -> Result<bool, StoreError> {
        self.read(cf, |data| data.contains_key(key))
    }

    fn scan_prefix<'b>(&'b self, cf: &Self::Cf, prefix: &[u8]) -> Result<ScanIter<'b>, StoreError> {
        let data = self.read(cf, |data| data.clone())?;
        let end = prefix_end(prefix);
        Ok(Box::new(SnapshotIter::new(data, prefix, &end, false)))
    }

    fn scan_range<'b>(
        &'b self,
        cf: &Self::Cf,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> Result<ScanIter<'b>, StoreError> {
        let data = self.read(cf, |data| data.clone())?;
        Ok(Box::new(SnapshotIter::new(data, start, end, reverse)))
    }

    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write(cf, |data| {
            data.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError> {
        self.write(cf, |data| {
            data.remove(key);
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        let snapshot = self
            .snapshot
            .into_inner()
            .ok_or(StoreError::TransactionConsumed)?;

        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let dirty_set = self.dirty.into_inner();
        let dirty: HashMap<String, ColumnFamily> = snapshot
            .into_iter()
            .filter(|(name, _)| dirty_set.contains(name))
            .collect();

        if dirty.is_empty() {
            return Ok(());
        }
        self.store.publish(dirty)
    }

    fn rollback(self) -> Result<(), StoreError> {
        if self.snapshot.into_inner().is_none() {
            return Err(StoreError::TransactionConsumed);
        }
        Ok(())
    }
}

/// Lazy scan over a cloned column family.
///
/// The clone shares structure with the transaction snapshot, so later writes
/// in the same transaction are not observed. Each step re-seeks past the last
/// yielded key.
struct SnapshotIter {
    data: ColumnFamily,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    reverse: bool,
    done: bool,
}

impl SnapshotIter {
    /// An empty `end` is unbounded.
    fn new(data: ColumnFamily, start: &[u8], end: &[u8], reverse: bool) -> Self {
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end.to_vec())
        };
        Self {
            data,
            lower: Bound::Included(start.to_vec()),
            upper,
            reverse,
            done: !end.is_empty() && start >= end,
        }
    }
}

impl Iterator for SnapshotIter {
    type Item = Result<(Vec<u8>, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let bounds = (self.lower.clone(), self.upper.clone());
        let mut range = self.data.range(bounds);
        let entry = if self.reverse { range.next_back() } else { range.next() };
        let Some((key, value)) = entry.map(|(k, v)| (k.clone(), v.clone())) else {
            self.done = true;
            return None;
        };
        if self.reverse {
            self.upper = Bound::Excluded(key.clone());
        } else {
            self.lower = Bound::Excluded(key.clone());
        }
        // A window that closed on itself is never handed back to the map.
        if let (Bound::Included(lo) | Bound::Excluded(lo), Bound::Excluded(hi)) = (&self.lower, &self.upper) {
            self.done = lo >= hi;
        }
        Some(Ok((key, value)))
    }
}
