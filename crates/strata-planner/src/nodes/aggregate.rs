use bson::Bson;
use strata_query::{
    Aggregate, AggregateKind, Document, DocumentMapping, Limit, OrderCondition, Value,
};

use super::order::compare_documents;
use super::wired;
use crate::error::PlannerError;
use crate::filter::{Filter, validate};
use crate::plan::{Arena, NodeId, NodeKind};

struct StepTarget {
    host: usize,
    child: Option<usize>,
    filter: Option<Filter>,
    limit: Option<Limit>,
    order_by: Vec<OrderCondition>,
}

/// One resolved aggregate: where it reads, where it writes, and which
/// sibling slots it depends on.
pub struct AggregateStep {
    pub(crate) kind: AggregateKind,
    pub(crate) index: usize,
    pub(crate) name: String,
    targets: Vec<StepTarget>,
    dependencies: Vec<usize>,
}

enum Total {
    Int(i64),
    Float(f64),
}

impl AggregateStep {
    pub(crate) fn build(agg: &Aggregate, mapping: &DocumentMapping) -> Result<Self, PlannerError> {
        let dependencies = agg
            .dependencies
            .iter()
            .map(|dep| {
                mapping
                    .first_index_of_name(dep)
                    .ok_or_else(|| PlannerError::UnresolvedDependency {
                        aggregate: agg.name.clone(),
                        dependency: dep.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if agg.kind == AggregateKind::Average && dependencies.len() != 2 {
            return Err(PlannerError::UnresolvedDependency {
                aggregate: agg.name.clone(),
                dependency: "sum and count".into(),
            });
        }

        let mut targets = Vec::with_capacity(agg.targets.len());
        for t in &agg.targets {
            let filter = match (&t.filter, mapping.child_at(t.host_index)) {
                (Some(cond), Some(child)) => {
                    validate(cond, child)?;
                    Some(Filter::new(cond.clone())?)
                }
                // Scalar lists have no fields to filter on.
                _ => None,
            };
            targets.push(StepTarget {
                host: t.host_index,
                child: t.child_index,
                filter,
                limit: t.limit,
                order_by: t.order_by.clone(),
            });
        }

        Ok(Self {
            kind: agg.kind,
            index: agg.index,
            name: agg.name.clone(),
            targets,
            dependencies,
        })
    }

    pub(crate) fn apply(&self, doc: &mut Document) -> Result<(), PlannerError> {
        let result = match self.kind {
            AggregateKind::Count => Bson::Int64(self.count(doc)),
            AggregateKind::Sum => match self.sum(doc)? {
                Total::Int(i) => Bson::Int64(i),
                Total::Float(f) => Bson::Double(f),
            },
            AggregateKind::Average => Bson::Double(self.average(doc)?),
        };
        doc.set(self.index, result);
        Ok(())
    }

    /// Rows of an object list that pass the target's filter, order and window.
    /// Hidden rows take part.
    fn selected<'d>(&self, target: &StepTarget, rows: &'d [Document]) -> Vec<&'d Document> {
        let mut out: Vec<&Document> = rows
            .iter()
            .filter(|r| target.filter.as_ref().is_none_or(|f| f.matches(r)))
            .collect();
        if !target.order_by.is_empty() {
            out.sort_by(|a, b| compare_documents(a, b, &target.order_by));
        }
        window(out, target.limit)
    }

    fn count(&self, doc: &Document) -> i64 {
        let mut total = 0usize;
        for target in &self.targets {
            total += match doc.get(target.host) {
                Value::Objects(rows) => self.selected(target, rows).len(),
                Value::Scalar(Bson::Array(items)) => window(items.iter().collect::<Vec<_>>(), target.limit).len(),
                Value::Object(_) => 1,
                Value::Null | Value::Scalar(Bson::Null) => 0,
                Value::Scalar(_) => 1,
            };
        }
        total as i64
    }

    fn sum(&self, doc: &Document) -> Result<Total, PlannerError> {
        let mut total = Total::Int(0);
        for target in &self.targets {
            match doc.get(target.host) {
                Value::Objects(rows) => {
                    for row in self.selected(target, rows) {
                        if let Some(child) = target.child {
                            if let Some(v) = row.get(child).as_scalar() {
                                total = self.add(total, v)?;
                            }
                        }
                    }
                }
                Value::Object(row) => {
                    if let Some(v) = target.child.and_then(|c| row.get(c).as_scalar()) {
                        total = self.add(total, v)?;
                    }
                }
                Value::Scalar(Bson::Array(items)) => {
                    for v in window(items.iter().collect::<Vec<_>>(), target.limit) {
                        total = self.add(total, v)?;
                    }
                }
                Value::Scalar(v) => total = self.add(total, v)?,
                Value::Null => {}
            }
        }
        Ok(total)
    }

    fn add(&self, total: Total, value: &Bson) -> Result<Total, PlannerError> {
        let overflow = || PlannerError::UnsupportedNumeric {
            aggregate: self.name.clone(),
            found: "integer overflow".into(),
        };
        Ok(match (total, value) {
            (total, Bson::Null) => total,
            (Total::Int(a), Bson::Int64(b)) => Total::Int(a.checked_add(*b).ok_or_else(overflow)?),
            (Total::Int(a), Bson::Int32(b)) => Total::Int(a.checked_add(i64::from(*b)).ok_or_else(overflow)?),
            (Total::Int(a), Bson::Double(b)) => Total::Float(a as f64 + b),
            (Total::Float(a), Bson::Int64(b)) => Total::Float(a + *b as f64),
            (Total::Float(a), Bson::Int32(b)) => Total::Float(a + f64::from(*b)),
            (Total::Float(a), Bson::Double(b)) => Total::Float(a + b),
            (_, other) => return Err(self.unsupported(other)),
        })
    }

    fn average(&self, doc: &Document) -> Result<f64, PlannerError> {
        let count = match doc.get(self.dependencies[1]) {
            Value::Scalar(Bson::Int64(n)) => *n,
            Value::Scalar(Bson::Int32(n)) => i64::from(*n),
            Value::Null => 0,
            Value::Scalar(other) => return Err(self.unsupported(other)),
            _ => return Err(self.unsupported(&Bson::Null)),
        };
        if count == 0 {
            return Ok(0.0);
        }
        let sum = match doc.get(self.dependencies[0]) {
            Value::Scalar(Bson::Int64(s)) => *s as f64,
            Value::Scalar(Bson::Int32(s)) => f64::from(*s),
            Value::Scalar(Bson::Double(s)) => *s,
            Value::Scalar(other) => return Err(self.unsupported(other)),
            _ => return Err(self.unsupported(&Bson::Null)),
        };
        Ok(sum / count as f64)
    }

    fn unsupported(&self, value: &Bson) -> PlannerError {
        PlannerError::UnsupportedNumeric {
            aggregate: self.name.clone(),
            found: format!("{:?}", value.element_type()),
        }
    }

    pub(crate) fn node_kind(&self) -> NodeKind {
        match self.kind {
            AggregateKind::Count => NodeKind::Count,
            AggregateKind::Sum => NodeKind::Sum,
            AggregateKind::Average => NodeKind::Average,
        }
    }

    pub(crate) fn sources(&self) -> Vec<(usize, Option<usize>)> {
        self.targets.iter().map(|t| (t.host, t.child)).collect()
    }
}

fn window<T>(items: Vec<T>, limit: Option<Limit>) -> Vec<T> {
    match limit {
        Some(limit) => items
            .into_iter()
            .enumerate()
            .filter(|(i, _)| limit.contains(*i as u64))
            .map(|(_, item)| item)
            .collect(),
        None => items,
    }
}

/// Computes one aggregate into each row of its source.
pub struct AggregateNode {
    pub(crate) source: Option<NodeId>,
    pub(crate) step: AggregateStep,
    pub(crate) current: Document,
}

impl AggregateNode {
    pub(crate) fn new(step: AggregateStep) -> Self {
        Self {
            source: None,
            step,
            current: Document::default(),
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.step.node_kind()
    }

    pub(crate) fn source_id(&self) -> Result<NodeId, PlannerError> {
        wired(self.source, self.kind().name())
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        arena.init(self.source_id()?)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        let source = self.source_id()?;
        if !arena.next(source)? {
            return Ok(false);
        }
        let mut doc = arena.value(source)?.clone();
        self.step.apply(&mut doc)?;
        self.current = doc;
        Ok(true)
    }
}
