use crate::error::StoreError;

pub trait Store {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError>;
    fn create_cf(&self, name: &str) -> Result<(), StoreError>;
    fn drop_cf(&self, name: &str) -> Result<(), StoreError>;
}

/// Owned key/value pairs yielded by scans.
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

pub trait Transaction {
    /// Backend-specific column family handle.
    /// Must be cheaply cloneable.
    type Cf: Clone;

    /// Resolve a column family by name. Must be called before any reads on that CF.
    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError>;

    // Reads
    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn has(&self, cf: &Self::Cf, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(cf, key)?.is_some())
    }
    fn scan_prefix<'a>(&'a self, cf: &Self::Cf, prefix: &[u8]) -> Result<ScanIter<'a>, StoreError>;

    /// Scan the half-open range `[start, end)`. An empty `end` is unbounded.
    fn scan_range<'a>(
        &'a self,
        cf: &Self::Cf,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> Result<ScanIter<'a>, StoreError>;

    // Writes
    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError>;

    // Lifecycle
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

/// The smallest key that sorts after every key starting with `prefix`.
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte is
/// incremented. A prefix made only of `0xFF` bytes has no such key and
/// yields an empty (unbounded) end.
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return end;
        }
    }
    end
}
