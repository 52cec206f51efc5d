use std::collections::HashSet;

use strata_query::{Document, DocumentMapping};

use super::wired;
use crate::error::PlannerError;
use crate::filter::Filter;
use crate::plan::{Arena, NodeId};

/// Applies the residual filter and the explicit key allow-list.
pub struct SelectNode {
    pub(crate) source: NodeId,
    pub(crate) filter: Option<Filter>,
    pub(crate) doc_keys: Option<HashSet<String>>,
    pub(crate) key_index: Option<usize>,
    pub(crate) mapping: DocumentMapping,
    pub(crate) type_name: String,
    pub(crate) filter_matches: u64,
    pub(crate) current: Document,
}

impl SelectNode {
    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        arena.init(self.source)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        while arena.next(self.source)? {
            let doc = arena.value(self.source)?;
            if let (Some(keys), Some(index)) = (&self.doc_keys, self.key_index) {
                if !doc.get(index).as_str().is_some_and(|k| keys.contains(k)) {
                    continue;
                }
            }
            if self.filter.as_ref().is_some_and(|f| !f.matches(doc)) {
                continue;
            }
            self.filter_matches += 1;
            let mut doc = doc.clone();
            self.mapping.set_type_name(&mut doc, &self.type_name);
            self.current = doc;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Root of one selection: records the stages built for it and, once wired,
/// the outermost of them.
pub struct SelectTopNode {
    pub(crate) select: NodeId,
    pub(crate) scan: NodeId,
    pub(crate) group: Option<NodeId>,
    pub(crate) aggregates: Vec<NodeId>,
    pub(crate) order: Option<NodeId>,
    pub(crate) limit: Option<NodeId>,
    pub(crate) plan: Option<NodeId>,
}

impl SelectTopNode {
    pub(crate) fn plan(&self) -> Result<NodeId, PlannerError> {
        wired(self.plan, "selectTopNode")
    }
}
