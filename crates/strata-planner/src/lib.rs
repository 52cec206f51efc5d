mod block;
mod catalog;
mod collection;
mod config;
mod database;
mod encoding;
mod error;
mod executor;
mod explain;
mod fetcher;
mod filter;
mod keys;
pub mod nodes;
mod plan;
mod planner;
mod span;

pub use block::{Block, HEAD_LINK, Link};
pub use catalog::{Catalog, CollectionDescription, FieldDescription};
pub use collection::{CollectionWriter, doc_key_for};
pub use config::PlannerConfig;
pub use database::{Database, DatabaseTransaction};
pub use error::PlannerError;
pub use executor::{ExecutionResult, execute_request};
pub use fetcher::{DocumentFetcher, EncodedDocument, Fetcher, FetcherStats, HeadFetcher, VersionedFetcher};
pub use filter::Filter;
pub use keys::{DataStoreKey, HeadStoreKey, InstanceType};
pub use plan::{Arena, NodeId, NodeKind, PlanNode};
pub use planner::Planner;
pub use span::{Span, Spans};
