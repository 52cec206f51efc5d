use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    TransactionConsumed,
    ReadOnly,
    /// A column family the caller asked for was never created.
    MissingRegion(String),
    BlockNotFound(String),
    InvalidCid(String),
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::TransactionConsumed => write!(f, "transaction already consumed"),
            StoreError::ReadOnly => write!(f, "write attempted in a read-only transaction"),
            StoreError::MissingRegion(name) => write!(f, "column family {name} does not exist"),
            StoreError::BlockNotFound(cid) => write!(f, "no block stored under {cid}"),
            StoreError::InvalidCid(s) => write!(f, "invalid cid: {s:?}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
