mod aggregate;
mod dag;
mod group;
mod join;
mod multi;
mod mutation;
mod order;
mod pipe;
mod scan;
mod select;
mod top_level;

pub use aggregate::{AggregateNode, AggregateStep};
pub use dag::{DagScanNode, HeadsetNode};
pub use group::{GroupChild, GroupNode};
pub use join::{JoinStrategy, TypeJoinNode};
pub use multi::{MultiScanNode, ParallelNode};
pub use mutation::{CreateNode, DeleteNode, UpdateNode};
pub use order::{LimitNode, OrderNode};
pub use pipe::PipeNode;
pub use scan::{ScanNode, ScanStats};
pub use select::{SelectNode, SelectTopNode};
pub use top_level::TopLevelNode;

use crate::error::PlannerError;
use crate::plan::NodeId;

/// Resolve a source that is only set once the plan is wired.
pub(crate) fn wired(source: Option<NodeId>, kind: &'static str) -> Result<NodeId, PlannerError> {
    source.ok_or(PlannerError::Unwired(kind))
}
