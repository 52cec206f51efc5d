use std::cmp::Ordering;

use bson::Bson;
use regex::Regex;
use strata_query::{CompareOp, Condition, Document, Value};

use crate::error::PlannerError;

/// A condition with its arguments checked and patterns compiled.
#[derive(Debug, Clone)]
pub(crate) enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        index: usize,
        op: CompareOp,
        value: Bson,
    },
    In {
        index: usize,
        values: Vec<Bson>,
        negate: bool,
    },
    Like {
        index: usize,
        pattern: Regex,
        negate: bool,
    },
    Related {
        index: usize,
        inner: Box<Predicate>,
    },
}

pub(crate) fn compile(cond: &Condition) -> Result<Predicate, PlannerError> {
    Ok(match cond {
        Condition::And(children) => Predicate::And(children.iter().map(compile).collect::<Result<_, _>>()?),
        Condition::Or(children) => Predicate::Or(children.iter().map(compile).collect::<Result<_, _>>()?),
        Condition::Not(inner) => Predicate::Not(Box::new(compile(inner)?)),
        Condition::Related { index, condition } => Predicate::Related {
            index: *index,
            inner: Box::new(compile(condition)?),
        },
        Condition::Field { index, op, value } => match op {
            CompareOp::In | CompareOp::Nin => match value {
                Bson::Array(values) => Predicate::In {
                    index: *index,
                    values: values.clone(),
                    negate: *op == CompareOp::Nin,
                },
                other => {
                    return Err(PlannerError::InvalidFilterArgument {
                        op: op.as_str(),
                        reason: format!("expected a list, got {other}"),
                    });
                }
            },
            CompareOp::Like | CompareOp::NLike => match value {
                Bson::String(pattern) => Predicate::Like {
                    index: *index,
                    pattern: like_regex(pattern).map_err(|e| PlannerError::InvalidFilterArgument {
                        op: op.as_str(),
                        reason: e.to_string(),
                    })?,
                    negate: *op == CompareOp::NLike,
                },
                other => {
                    return Err(PlannerError::InvalidFilterArgument {
                        op: op.as_str(),
                        reason: format!("expected a string pattern, got {other}"),
                    });
                }
            },
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le if *value == Bson::Null => {
                return Err(PlannerError::InvalidFilterArgument {
                    op: op.as_str(),
                    reason: "cannot order against null".into(),
                });
            }
            _ => Predicate::Compare {
                index: *index,
                op: *op,
                value: value.clone(),
            },
        },
    })
}

/// `%` matches any run of characters, `_` exactly one.
fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
}

pub(crate) fn matches(doc: &Document, pred: &Predicate) -> bool {
    match pred {
        Predicate::And(children) => children.iter().all(|c| matches(doc, c)),
        Predicate::Or(children) => children.iter().any(|c| matches(doc, c)),
        Predicate::Not(inner) => !matches(doc, inner),
        Predicate::Compare { index, op, value } => match doc.get(*index) {
            Value::Null => compare_scalar(&Bson::Null, *op, value),
            Value::Scalar(field) => compare_scalar(field, *op, value),
            // A nested value only answers null checks.
            Value::Object(_) | Value::Objects(_) => *op == CompareOp::Ne && *value == Bson::Null,
        },
        Predicate::In { index, values, negate } => {
            let field = doc.get(*index).as_scalar().unwrap_or(&Bson::Null);
            values.iter().any(|v| values_eq(field, v)) != *negate
        }
        Predicate::Like { index, pattern, negate } => match doc.get(*index).as_str() {
            Some(s) => pattern.is_match(s) != *negate,
            None => false,
        },
        Predicate::Related { index, inner } => match doc.get(*index) {
            Value::Object(child) => matches(child, inner),
            Value::Objects(children) => children.iter().filter(|c| !c.hidden).any(|c| matches(c, inner)),
            Value::Null | Value::Scalar(_) => false,
        },
    }
}

fn compare_scalar(field: &Bson, op: CompareOp, arg: &Bson) -> bool {
    match op {
        CompareOp::Eq => values_eq(field, arg),
        CompareOp::Ne => !values_eq(field, arg),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            if *field == Bson::Null {
                return false;
            }
            let Some(ord) = compare_values(field, arg) else {
                return false;
            };
            match op {
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Ge => ord != Ordering::Less,
                CompareOp::Lt => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            }
        }
        // Compiled into their own predicates.
        CompareOp::In | CompareOp::Nin | CompareOp::Like | CompareOp::NLike => false,
    }
}

pub(crate) fn values_eq(a: &Bson, b: &Bson) -> bool {
    match compare_values(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

/// Ordering between two scalars; integers and doubles compare by value.
/// `None` when the types have no common order.
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Int32(a), Bson::Int32(b)) => Some(a.cmp(b)),
        (Bson::Int64(a), Bson::Int64(b)) => Some(a.cmp(b)),
        (Bson::Int32(a), Bson::Int64(b)) => Some((*a as i64).cmp(b)),
        (Bson::Int64(a), Bson::Int32(b)) => Some(a.cmp(&(*b as i64))),
        (Bson::Double(a), Bson::Double(b)) => a.partial_cmp(b),
        (Bson::Double(a), Bson::Int64(b)) => a.partial_cmp(&(*b as f64)),
        (Bson::Double(a), Bson::Int32(b)) => a.partial_cmp(&(*b as f64)),
        (Bson::Int64(a), Bson::Double(b)) => (*a as f64).partial_cmp(b),
        (Bson::Int32(a), Bson::Double(b)) => (*a as f64).partial_cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.timestamp_millis().cmp(&b.timestamp_millis())),
        _ => None,
    }
}

/// Sort order over slot values: nulls first, incomparable values equal.
pub(crate) fn compare_for_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => match (a.as_scalar(), b.as_scalar()) {
            (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}
