use strata_query::{Document, DocumentMapping, Limit, Select, Value};
use tracing::debug;

use super::wired;
use crate::error::PlannerError;
use crate::plan::{Arena, CacheId, NodeId};

/// One grouped sub-selection and the plan feeding it.
pub struct GroupChild {
    /// Slot in the grouped row holding this child's rows.
    pub index: usize,
    pub(crate) select: Select,
    pub(crate) plan: Option<NodeId>,
    /// Rows outside this window are hidden, never removed.
    pub limit: Option<Limit>,
}

/// Partitions rows by the group-by value tuple, in first-seen order.
pub struct GroupNode {
    pub(crate) source: Option<NodeId>,
    pub(crate) group_by: Vec<usize>,
    pub(crate) children: Vec<GroupChild>,
    /// Slot receiving raw rows when no sub-selection is requested.
    pub(crate) rows_index: Option<usize>,
    pub(crate) mapping: DocumentMapping,
    /// Base rows shared by the main chain and the children, when there are children.
    pub(crate) cache: Option<CacheId>,
    groups: Vec<(Vec<Value>, Document)>,
    materialized: bool,
    position: usize,
    pub(crate) current: Document,
}

impl GroupNode {
    pub(crate) fn new(
        group_by: Vec<usize>,
        children: Vec<GroupChild>,
        rows_index: Option<usize>,
        mapping: DocumentMapping,
    ) -> Self {
        Self {
            source: None,
            group_by,
            children,
            rows_index,
            mapping,
            cache: None,
            groups: Vec::new(),
            materialized: false,
            position: 0,
            current: Document::default(),
        }
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.reset();
        // A re-init (a join moving to the next parent row) must refill the
        // cache from the source, not replay the previous rows.
        if let Some(cache) = self.cache {
            arena.cache_mut(cache)?.reset();
        }
        arena.init(wired(self.source, "groupNode")?)?;
        for child in &self.children {
            arena.init(wired(child.plan, "groupNode")?)?;
        }
        Ok(())
    }

    pub(crate) fn start(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        arena.start(wired(self.source, "groupNode")?)?;
        for child in &self.children {
            arena.start(wired(child.plan, "groupNode")?)?;
        }
        Ok(())
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !self.materialized {
            self.materialize(arena)?;
        }
        match self.groups.get(self.position) {
            Some((_, doc)) => {
                self.current = doc.clone();
                self.position += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn materialize(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        let source = wired(self.source, "groupNode")?;
        while arena.next(source)? {
            let row = arena.value(source)?.clone();
            let group = self.group_for(&row);
            if self.children.is_empty() {
                if let Some(index) = self.rows_index {
                    self.push_row(group, index, row);
                }
            }
        }

        for i in 0..self.children.len() {
            let plan = wired(self.children[i].plan, "groupNode")?;
            let index = self.children[i].index;
            while arena.next(plan)? {
                let row = arena.value(plan)?.clone();
                // Groups come from the filtered parent rows only.
                if let Some(group) = self.find_group(&self.key_of(&row)) {
                    self.push_row(group, index, row);
                }
            }
        }

        for child in &self.children {
            let Some(limit) = child.limit else { continue };
            for (_, doc) in &mut self.groups {
                if let Some(rows) = doc.fields.get_mut(child.index).and_then(Value::as_objects_mut) {
                    for (position, row) in rows.iter_mut().enumerate() {
                        row.hidden = !limit.contains(position as u64);
                    }
                }
            }
        }

        debug!(groups = self.groups.len(), "group materialized");
        self.materialized = true;
        Ok(())
    }

    /// Index of the group owning `row`, creating it on first sight.
    fn group_for(&mut self, row: &Document) -> usize {
        let key = self.key_of(row);
        if let Some(pos) = self.find_group(&key) {
            return pos;
        }
        let mut doc = self.mapping.new_doc();
        for (&index, value) in self.group_by.iter().zip(&key) {
            doc.set(index, value.clone());
        }
        for child in &self.children {
            doc.set(child.index, Vec::<Document>::new());
        }
        if let Some(index) = self.rows_index {
            doc.set(index, Vec::<Document>::new());
        }
        self.groups.push((key, doc));
        self.groups.len() - 1
    }

    fn key_of(&self, row: &Document) -> Vec<Value> {
        self.group_by.iter().map(|&i| row.get(i).clone()).collect()
    }

    fn find_group(&self, key: &[Value]) -> Option<usize> {
        self.groups.iter().position(|(k, _)| k.as_slice() == key)
    }

    fn push_row(&mut self, group: usize, index: usize, row: Document) {
        if let Some(rows) = self.groups[group].1.fields.get_mut(index).and_then(Value::as_objects_mut) {
            rows.push(row);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.groups.clear();
        self.materialized = false;
        self.position = 0;
    }
}
