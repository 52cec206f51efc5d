mod aggregate;
mod commit;
mod document;
mod filter;
mod mapping;
mod mutation;
mod order;
mod request;
mod select;
mod value;

pub use aggregate::{Aggregate, AggregateKind, AggregateTarget};
pub use commit::CommitSelect;
pub use document::Document;
pub use filter::{CompareOp, Condition};
pub use mapping::{DocumentMapping, RenderKey, TypeInfo};
pub use mutation::{Mutation, MutationKind};
pub use order::{OrderCondition, SortDirection};
pub use request::{ExplainMode, Operation, Request, TopLevelSelect};
pub use select::{Cardinality, Field, GroupBy, Limit, Relation, RelationSide, Select};
pub use value::Value;

/// Name of the slot holding a document's key.
pub const KEY_FIELD: &str = "_key";
/// Name of the slot holding grouped rows when a group-by has no explicit child selection.
pub const GROUP_FIELD: &str = "_group";
/// Name of the slot holding the deletion flag when deleted documents are requested.
pub const DELETED_FIELD: &str = "_deleted";
