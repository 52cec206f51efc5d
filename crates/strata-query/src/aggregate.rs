use serde::{Deserialize, Serialize};

use crate::filter::Condition;
use crate::order::OrderCondition;
use crate::select::Limit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Average,
}

impl AggregateKind {
    pub fn field_name(self) -> &'static str {
        match self {
            AggregateKind::Count => "_count",
            AggregateKind::Sum => "_sum",
            AggregateKind::Average => "_avg",
        }
    }
}

/// What an aggregate reads: the host slot (a nested list or a scalar
/// array) and, for object lists, the child slot to read from each element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTarget {
    pub host_index: usize,
    pub child_index: Option<usize>,
    pub filter: Option<Condition>,
    pub limit: Option<Limit>,
    pub order_by: Vec<OrderCondition>,
}

impl AggregateTarget {
    pub fn host(host_index: usize) -> Self {
        Self {
            host_index,
            child_index: None,
            filter: None,
            limit: None,
            order_by: Vec::new(),
        }
    }

    pub fn child(host_index: usize, child_index: usize) -> Self {
        Self {
            child_index: Some(child_index),
            ..Self::host(host_index)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Slot receiving the result.
    pub index: usize,
    pub name: String,
    pub kind: AggregateKind,
    pub targets: Vec<AggregateTarget>,
    /// Names of slots produced by other aggregates that this one reads.
    pub dependencies: Vec<String>,
}
