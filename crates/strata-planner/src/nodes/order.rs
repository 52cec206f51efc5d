use std::cmp::Ordering;

use strata_query::{Document, Limit, OrderCondition, SortDirection, Value};

use super::wired;
use crate::error::PlannerError;
use crate::filter::compare_for_sort;
use crate::plan::{Arena, NodeId};

static NULL: Value = Value::Null;

/// Follow a slot path through nested objects.
fn resolve<'d>(doc: &'d Document, path: &[usize]) -> &'d Value {
    let Some((&first, rest)) = path.split_first() else {
        return &NULL;
    };
    let value = doc.get(first);
    if rest.is_empty() {
        return value;
    }
    match value {
        Value::Object(child) => resolve(child, rest),
        _ => &NULL,
    }
}

pub(crate) fn compare_documents(a: &Document, b: &Document, orderings: &[OrderCondition]) -> Ordering {
    for order in orderings {
        let ord = compare_for_sort(resolve(a, &order.field_indexes), resolve(b, &order.field_indexes));
        let ord = match order.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Materializes its source and serves it sorted. The sort is stable.
pub struct OrderNode {
    pub(crate) source: Option<NodeId>,
    pub(crate) orderings: Vec<OrderCondition>,
    rows: Vec<Document>,
    materialized: bool,
    position: usize,
    pub(crate) current: Document,
}

impl OrderNode {
    pub(crate) fn new(orderings: Vec<OrderCondition>) -> Self {
        Self {
            source: None,
            orderings,
            rows: Vec::new(),
            materialized: false,
            position: 0,
            current: Document::default(),
        }
    }

    pub(crate) fn source_id(&self) -> Result<NodeId, PlannerError> {
        wired(self.source, "orderNode")
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.reset();
        arena.init(self.source_id()?)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !self.materialized {
            let source = self.source_id()?;
            while arena.next(source)? {
                self.rows.push(arena.value(source)?.clone());
            }
            let orderings = &self.orderings;
            self.rows.sort_by(|a, b| compare_documents(a, b, orderings));
            self.materialized = true;
        }
        match self.rows.get(self.position) {
            Some(row) => {
                self.current = row.clone();
                self.position += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.rows.clear();
        self.materialized = false;
        self.position = 0;
    }
}

/// Skips `offset` rows, then stops after `limit`.
pub struct LimitNode {
    pub(crate) source: Option<NodeId>,
    pub(crate) limit: Limit,
    skipped: u64,
    emitted: u64,
    done: bool,
    pub(crate) current: Document,
}

impl LimitNode {
    pub(crate) fn new(limit: Limit) -> Self {
        Self {
            source: None,
            limit,
            skipped: 0,
            emitted: 0,
            done: false,
            current: Document::default(),
        }
    }

    pub(crate) fn source_id(&self) -> Result<NodeId, PlannerError> {
        wired(self.source, "limitNode")
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.skipped = 0;
        self.emitted = 0;
        self.done = false;
        arena.init(self.source_id()?)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if self.done {
            return Ok(false);
        }
        if self.limit.limit.is_some_and(|l| self.emitted >= l) {
            self.done = true;
            return Ok(false);
        }
        let source = self.source_id()?;
        while self.skipped < self.limit.offset {
            if !arena.next(source)? {
                self.done = true;
                return Ok(false);
            }
            self.skipped += 1;
        }
        if !arena.next(source)? {
            self.done = true;
            return Ok(false);
        }
        self.emitted += 1;
        self.current = arena.value(source)?.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: Vec<Value>) -> Document {
        Document {
            fields: values,
            hidden: false,
        }
    }

    #[test]
    fn nested_paths_and_directions() {
        let inner = |n: i64| Value::Object(row(vec![Value::from(n)]));
        let a = row(vec![Value::from("x"), inner(2)]);
        let b = row(vec![Value::from("x"), inner(1)]);
        let asc = [OrderCondition::asc(0), OrderCondition { field_indexes: vec![1, 0], direction: SortDirection::Asc }];
        assert_eq!(compare_documents(&a, &b, &asc), Ordering::Greater);
        let desc = [OrderCondition { field_indexes: vec![1, 0], direction: SortDirection::Desc }];
        assert_eq!(compare_documents(&a, &b, &desc), Ordering::Less);
    }

    #[test]
    fn missing_path_sorts_as_null() {
        let a = row(vec![Value::Null]);
        let b = row(vec![Value::from(1i64)]);
        assert_eq!(compare_documents(&a, &b, &[OrderCondition::asc(0)]), Ordering::Less);
        assert_eq!(resolve(&b, &[0, 3]), &Value::Null);
    }
}
