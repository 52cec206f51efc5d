mod eval;

use strata_query::{Condition, Document, DocumentMapping};

use crate::error::PlannerError;

pub(crate) use eval::{compare_for_sort, values_eq};
use eval::Predicate;

/// A validated condition ready to evaluate against documents.
#[derive(Debug, Clone)]
pub struct Filter {
    condition: Condition,
    predicate: Predicate,
}

impl Filter {
    pub fn new(condition: Condition) -> Result<Self, PlannerError> {
        let predicate = eval::compile(&condition)?;
        Ok(Self { condition, predicate })
    }

    pub fn from_option(condition: Option<Condition>) -> Result<Option<Self>, PlannerError> {
        condition.map(Self::new).transpose()
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn matches(&self, doc: &Document) -> bool {
        eval::matches(doc, &self.predicate)
    }
}

/// Check slot references against `mapping` and argument types for every
/// operator.
pub fn validate(cond: &Condition, mapping: &DocumentMapping) -> Result<(), PlannerError> {
    check_slots(cond, mapping)?;
    eval::compile(cond).map(|_| ())
}

fn check_slots(cond: &Condition, mapping: &DocumentMapping) -> Result<(), PlannerError> {
    match cond {
        Condition::And(children) | Condition::Or(children) => {
            children.iter().try_for_each(|c| check_slots(c, mapping))
        }
        Condition::Not(inner) => check_slots(inner, mapping),
        Condition::Field { index, .. } if *index < mapping.next_index => Ok(()),
        Condition::Field { index, .. } => Err(PlannerError::FieldNotFound(format!("slot {index}"))),
        Condition::Related { index, condition } => match mapping.child_at(*index) {
            Some(child) => check_slots(condition, child),
            None => Err(PlannerError::FieldNotFound(format!("related slot {index}"))),
        },
    }
}

/// Split a filter into the part a scan can evaluate on stored fields and
/// the residual that needs joined values.
pub fn split_pushdown(cond: Option<Condition>) -> (Option<Condition>, Option<Condition>) {
    let Some(cond) = cond else {
        return (None, None);
    };
    let (residual, scan): (Vec<_>, Vec<_>) = conjuncts(cond).into_iter().partition(Condition::has_related);
    (from_conjuncts(scan), from_conjuncts(residual))
}

/// Drop every part of the condition that reads slot `index`.
pub fn remove_condition_index(cond: Condition, index: usize) -> Option<Condition> {
    match cond {
        Condition::And(children) => from_conjuncts(
            children
                .into_iter()
                .filter_map(|c| remove_condition_index(c, index))
                .collect(),
        ),
        other if mentions(&other, index) => None,
        other => Some(other),
    }
}

/// The conditions placed on the related object at slot `index`, taken from
/// the top-level conjuncts.
pub fn related_condition(cond: &Condition, index: usize) -> Option<Condition> {
    let parts = match cond {
        Condition::And(children) => children.iter().collect::<Vec<_>>(),
        other => vec![other],
    };
    from_conjuncts(
        parts
            .into_iter()
            .filter_map(|c| match c {
                Condition::Related { index: i, condition } if *i == index => Some((**condition).clone()),
                _ => None,
            })
            .collect(),
    )
}

pub fn merge_conditions(a: Option<Condition>, b: Option<Condition>) -> Option<Condition> {
    match (a, b) {
        (None, None) => None,
        (Some(c), None) | (None, Some(c)) => Some(c),
        (Some(a), Some(b)) => {
            let mut all = conjuncts(a);
            all.extend(conjuncts(b));
            from_conjuncts(all)
        }
    }
}

fn mentions(cond: &Condition, index: usize) -> bool {
    match cond {
        Condition::And(children) | Condition::Or(children) => children.iter().any(|c| mentions(c, index)),
        Condition::Not(inner) => mentions(inner, index),
        Condition::Field { index: i, .. } | Condition::Related { index: i, .. } => *i == index,
    }
}

fn conjuncts(cond: Condition) -> Vec<Condition> {
    match cond {
        Condition::And(children) => children.into_iter().flat_map(conjuncts).collect(),
        other => vec![other],
    }
}

fn from_conjuncts(mut parts: Vec<Condition>) -> Option<Condition> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(Condition::And(parts)),
    }
}
