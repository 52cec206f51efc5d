use strata_query::{Condition, Document, Value};
use tracing::trace;

use crate::error::PlannerError;
use crate::filter::{Filter, merge_conditions, remove_condition_index};
use crate::plan::{Arena, NodeId};

/// How related rows are found for each parent row. Chosen once when the
/// plan is built.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinStrategy {
    /// The parent holds the related key in `foreign_key`; point lookup.
    OnePrimary { foreign_key: usize },
    /// The related row holds the parent key in `foreign_key`; at most one.
    OneSecondary { foreign_key: usize, parent_key: usize },
    /// The related rows hold the parent key in `foreign_key`.
    Many { foreign_key: usize, parent_key: usize },
    /// Latest commits of the parent document.
    Version { dag: NodeId, parent_key: usize },
}

impl JoinStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            JoinStrategy::OnePrimary { .. } | JoinStrategy::OneSecondary { .. } => "typeJoinOne",
            JoinStrategy::Many { .. } => "typeJoinMany",
            JoinStrategy::Version { .. } => "typeJoinVersion",
        }
    }
}

pub struct TypeJoinNode {
    pub(crate) root: NodeId,
    pub(crate) sub: NodeId,
    /// Scan of the related plan, narrowed or refiltered per parent row.
    pub(crate) sub_scan: Option<NodeId>,
    /// The related scan's own filter, before the per-row key condition.
    pub(crate) sub_filter: Option<Condition>,
    pub(crate) strategy: JoinStrategy,
    /// Parent slot receiving the related value.
    pub(crate) index: usize,
    pub(crate) root_name: String,
    pub(crate) sub_type_name: String,
    pub(crate) current: Document,
}

impl TypeJoinNode {
    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        arena.init(self.root)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !arena.next(self.root)? {
            return Ok(false);
        }
        let mut doc = arena.value(self.root)?.clone();
        let related = match &self.strategy {
            JoinStrategy::OnePrimary { foreign_key } => match doc.get(*foreign_key).as_str() {
                Some(key) => {
                    let scan = self.sub_scan()?;
                    arena.narrow_scan_to_keys(scan, &[key.to_string()])?;
                    self.run_sub(arena)?;
                    self.take_one(arena)?
                }
                None => Value::Null,
            },
            JoinStrategy::OneSecondary { foreign_key, parent_key } => {
                self.refilter(arena, *foreign_key, doc.get(*parent_key))?;
                self.take_one(arena)?
            }
            JoinStrategy::Many { foreign_key, parent_key } => {
                self.refilter(arena, *foreign_key, doc.get(*parent_key))?;
                Value::Objects(self.drain(arena)?)
            }
            JoinStrategy::Version { dag, parent_key } => match doc.get(*parent_key).as_str() {
                Some(key) => {
                    arena.retarget_dag(*dag, key)?;
                    self.run_sub(arena)?;
                    Value::Objects(self.drain(arena)?)
                }
                None => Value::Objects(Vec::new()),
            },
        };
        trace!(join = self.strategy.name(), field = %self.sub_type_name, null = related.is_null(), "joined");
        doc.set(self.index, related);
        self.current = doc;
        Ok(true)
    }

    fn sub_scan(&self) -> Result<NodeId, PlannerError> {
        self.sub_scan.ok_or(PlannerError::Unwired("typeIndexJoin"))
    }

    /// Restrict the related scan to rows whose foreign key equals the parent key.
    fn refilter(&self, arena: &mut Arena<'_>, foreign_key: usize, parent_key: &Value) -> Result<(), PlannerError> {
        let key = parent_key.as_scalar().cloned().unwrap_or(bson::Bson::Null);
        let base = self.sub_filter.clone().and_then(|c| remove_condition_index(c, foreign_key));
        let condition = merge_conditions(base, Some(Condition::eq(foreign_key, key)));
        arena.set_scan_filter(self.sub_scan()?, Filter::from_option(condition)?)?;
        self.run_sub(arena)
    }

    fn run_sub(&self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        arena.init(self.sub)?;
        arena.start(self.sub)
    }

    fn take_one(&self, arena: &mut Arena<'_>) -> Result<Value, PlannerError> {
        if arena.next(self.sub)? {
            Ok(Value::Object(arena.value(self.sub)?.clone()))
        } else {
            Ok(Value::Null)
        }
    }

    fn drain(&self, arena: &mut Arena<'_>) -> Result<Vec<Document>, PlannerError> {
        let mut rows = Vec::new();
        while arena.next(self.sub)? {
            rows.push(arena.value(self.sub)?.clone());
        }
        Ok(rows)
    }
}
