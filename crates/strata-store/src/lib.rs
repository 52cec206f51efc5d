mod error;
mod region;
mod store;

pub use error::StoreError;
pub use region::{Cid, Datastore, KvFilter, KvIter, Multistore, PrefixQuery, Region, create_regions};
pub use store::{ScanIter, Store, Transaction, prefix_end};

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryCf, MemoryStore, MemoryTransaction};
