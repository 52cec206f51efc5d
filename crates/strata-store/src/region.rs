use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::store::{Store, Transaction, prefix_end};

// ── Region ──────────────────────────────────────────────────

/// The four namespaced keyspaces every execution works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Primary document data.
    Data,
    /// Current commit heads per document field.
    Heads,
    /// Content-addressed commit blocks.
    Blocks,
    /// Catalog and other system metadata.
    System,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Data, Region::Heads, Region::Blocks, Region::System];

    pub fn cf_name(self) -> &'static str {
        match self {
            Region::Data => "data",
            Region::Heads => "heads",
            Region::Blocks => "blocks",
            Region::System => "system",
        }
    }

    fn slot(self) -> usize {
        match self {
            Region::Data => 0,
            Region::Heads => 1,
            Region::Blocks => 2,
            Region::System => 3,
        }
    }
}

/// Create the column family backing each region.
pub fn create_regions<S: Store>(store: &S) -> Result<(), StoreError> {
    for region in Region::ALL {
        store.create_cf(region.cf_name())?;
    }
    Ok(())
}

// ── Cid ─────────────────────────────────────────────────────

/// Content identifier: lowercase hex SHA-256 of a block's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(String);

impl Cid {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for b in digest {
            hex.push_str(&format!("{b:02x}"));
        }
        Self(hex)
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            return Err(StoreError::InvalidCid(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── PrefixQuery ─────────────────────────────────────────────

pub type KvFilter = Arc<dyn Fn(&[u8], &[u8]) -> bool + Send + Sync>;

pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

/// Prefix scan with optional filters, ordering, offset and limit.
#[derive(Clone, Default)]
pub struct PrefixQuery {
    pub prefix: Vec<u8>,
    pub reverse: bool,
    pub offset: usize,
    pub limit: Option<usize>,
    pub filters: Vec<KvFilter>,
}

impl PrefixQuery {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter(mut self, f: impl Fn(&[u8], &[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.filters.push(Arc::new(f));
        self
    }
}

impl fmt::Debug for PrefixQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixQuery")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .field("reverse", &self.reverse)
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .field("filters", &self.filters.len())
            .finish()
    }
}

// ── Datastore ───────────────────────────────────────────────

/// Object-safe view of one transaction over the four regions.
///
/// Reads and writes take `&self`; the transaction behind it is shared by
/// every node of a single execution.
pub trait Datastore {
    fn get(&self, region: Region, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn has(&self, region: Region, key: &[u8]) -> Result<bool, StoreError>;
    fn put(&self, region: Region, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, region: Region, key: &[u8]) -> Result<(), StoreError>;
    fn query<'a>(&'a self, region: Region, query: &PrefixQuery) -> Result<KvIter<'a>, StoreError>;
    /// Half-open `[start, end)` scan. An empty `end` is unbounded.
    fn range<'a>(
        &'a self,
        region: Region,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> Result<KvIter<'a>, StoreError>;

    fn get_block(&self, cid: &Cid) -> Result<Vec<u8>, StoreError> {
        self.get(Region::Blocks, cid.as_str().as_bytes())?
            .ok_or_else(|| StoreError::BlockNotFound(cid.to_string()))
    }

    fn put_block(&self, bytes: &[u8]) -> Result<Cid, StoreError> {
        let cid = Cid::of(bytes);
        self.put(Region::Blocks, cid.as_str().as_bytes(), bytes)?;
        Ok(cid)
    }
}

// ── Multistore ──────────────────────────────────────────────

/// A transaction with its four region handles resolved up front.
pub struct Multistore<T: Transaction> {
    txn: T,
    cfs: [T::Cf; 4],
}

impl<T: Transaction> Multistore<T> {
    pub fn new(txn: T) -> Result<Self, StoreError> {
        let cfs = [
            txn.cf(Region::Data.cf_name())?,
            txn.cf(Region::Heads.cf_name())?,
            txn.cf(Region::Blocks.cf_name())?,
            txn.cf(Region::System.cf_name())?,
        ];
        Ok(Self { txn, cfs })
    }

    fn cf(&self, region: Region) -> &T::Cf {
        &self.cfs[region.slot()]
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit()
    }

    pub fn rollback(self) -> Result<(), StoreError> {
        self.txn.rollback()
    }
}

impl<T: Transaction> Datastore for Multistore<T> {
    fn get(&self, region: Region, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.txn.get(self.cf(region), key)
    }

    fn has(&self, region: Region, key: &[u8]) -> Result<bool, StoreError> {
        self.txn.has(self.cf(region), key)
    }

    fn put(&self, region: Region, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.txn.put(self.cf(region), key, value)
    }

    fn delete(&self, region: Region, key: &[u8]) -> Result<(), StoreError> {
        self.txn.delete(self.cf(region), key)
    }

    fn query<'a>(&'a self, region: Region, query: &PrefixQuery) -> Result<KvIter<'a>, StoreError> {
        let inner = if query.reverse {
            let end = prefix_end(&query.prefix);
            self.txn.scan_range(self.cf(region), &query.prefix, &end, true)?
        } else {
            self.txn.scan_prefix(self.cf(region), &query.prefix)?
        };
        let filters = query.filters.clone();
        let filtered = inner.filter(move |entry| match entry {
            Ok((k, v)) => filters.iter().all(|f| f(k, v)),
            Err(_) => true,
        });
        let skipped = filtered.skip(query.offset);
        Ok(match query.limit {
            Some(n) => Box::new(skipped.take(n)),
            None => Box::new(skipped),
        })
    }

    fn range<'a>(
        &'a self,
        region: Region,
        start: &[u8],
        end: &[u8],
        reverse: bool,
    ) -> Result<KvIter<'a>, StoreError> {
        self.txn.scan_range(self.cf(region), start, end, reverse)
    }
}
