use serde::{Deserialize, Serialize};

use crate::filter::Condition;
use crate::select::Select;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// A write followed by a read of the written documents through `select`.
///
/// `filter` and `doc_keys` pick the targets of an update or delete and
/// address `select.mapping` slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub kind: MutationKind,
    pub input: Option<bson::Document>,
    pub filter: Option<Condition>,
    pub doc_keys: Option<Vec<String>>,
    pub select: Select,
}

impl Mutation {
    pub fn create(select: Select, input: bson::Document) -> Self {
        Self {
            kind: MutationKind::Create,
            input: Some(input),
            filter: None,
            doc_keys: None,
            select,
        }
    }

    pub fn update(select: Select, input: bson::Document) -> Self {
        Self {
            kind: MutationKind::Update,
            ..Self::create(select, input)
        }
    }

    pub fn delete(select: Select) -> Self {
        Self {
            kind: MutationKind::Delete,
            input: None,
            filter: None,
            doc_keys: None,
            select,
        }
    }
}
