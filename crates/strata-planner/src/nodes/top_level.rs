use strata_query::{Document, DocumentMapping};

use super::AggregateStep;
use crate::error::PlannerError;
use crate::plan::{Arena, NodeId};

/// Answers several selections as a single document, with aggregates
/// computed over their results.
pub struct TopLevelNode {
    /// Mapping slot and plan of each selection.
    pub(crate) children: Vec<(usize, NodeId)>,
    pub(crate) steps: Vec<AggregateStep>,
    pub(crate) mapping: DocumentMapping,
    yielded: bool,
    pub(crate) current: Document,
}

impl TopLevelNode {
    pub(crate) fn new(mapping: DocumentMapping, children: Vec<(usize, NodeId)>, steps: Vec<AggregateStep>) -> Self {
        Self {
            children,
            steps,
            mapping,
            yielded: false,
            current: Document::default(),
        }
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.yielded = false;
        self.children.iter().try_for_each(|(_, child)| arena.init(*child))
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if self.yielded {
            return Ok(false);
        }
        self.yielded = true;

        let mut doc = self.mapping.new_doc();
        for (slot, child) in &self.children {
            let mut rows = Vec::new();
            while arena.next(*child)? {
                rows.push(arena.value(*child)?.clone());
            }
            doc.set(*slot, rows);
        }
        for step in self.steps.iter().rev() {
            step.apply(&mut doc)?;
        }
        self.current = doc;
        Ok(true)
    }
}
