use bson::Bson;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Nin,
    Like,
    NLike,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "_eq",
            CompareOp::Ne => "_ne",
            CompareOp::Gt => "_gt",
            CompareOp::Ge => "_ge",
            CompareOp::Lt => "_lt",
            CompareOp::Le => "_le",
            CompareOp::In => "_in",
            CompareOp::Nin => "_nin",
            CompareOp::Like => "_like",
            CompareOp::NLike => "_nlike",
        }
    }
}

/// A filter tree over document slots.
///
/// `Related` descends into the nested object (or object list) stored at
/// `index`; its inner condition addresses the child mapping's slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Field {
        index: usize,
        op: CompareOp,
        value: Bson,
    },
    Related {
        index: usize,
        condition: Box<Condition>,
    },
}

impl Condition {
    pub fn field(index: usize, op: CompareOp, value: impl Into<Bson>) -> Self {
        Condition::Field {
            index,
            op,
            value: value.into(),
        }
    }

    pub fn eq(index: usize, value: impl Into<Bson>) -> Self {
        Self::field(index, CompareOp::Eq, value)
    }

    pub fn related(index: usize, condition: Condition) -> Self {
        Condition::Related {
            index,
            condition: Box::new(condition),
        }
    }

    /// True when any part of this condition descends into a related object.
    pub fn has_related(&self) -> bool {
        match self {
            Condition::And(c) | Condition::Or(c) => c.iter().any(Condition::has_related),
            Condition::Not(c) => c.has_related(),
            Condition::Field { .. } => false,
            Condition::Related { .. } => true,
        }
    }
}
