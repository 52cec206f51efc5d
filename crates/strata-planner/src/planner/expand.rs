use std::collections::HashSet;

use strata_query::Select;
use tracing::debug;

use super::Planner;
use crate::error::PlannerError;
use crate::nodes::PipeNode;
use crate::plan::{NodeId, NodeKind, PlanNode};

impl Planner<'_> {
    pub(super) fn expand_from(&mut self, root: NodeId, expanded: &mut HashSet<NodeId>) -> Result<(), PlannerError> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !expanded.insert(id) {
                continue;
            }
            if self.arena.kind(id)? == NodeKind::SelectTop {
                self.expand_select_top(id, expanded)?;
            }
            stack.extend(self.arena.children(id));
            stack.extend(self.arena.source(id));
        }
        Ok(())
    }

    /// select → [group] → [aggregates] → [order] → [limit].
    ///
    /// Aggregates run back to front, so the last one registered sits
    /// innermost and the first one outermost.
    fn expand_select_top(&mut self, top: NodeId, expanded: &mut HashSet<NodeId>) -> Result<(), PlannerError> {
        let (select, group, aggregates, order, limit) = match self.arena.get(top)? {
            PlanNode::SelectTop(n) => (n.select, n.group, n.aggregates.clone(), n.order, n.limit),
            _ => return Ok(()),
        };

        let mut outer = select;
        let stages = group
            .into_iter()
            .chain(aggregates.into_iter().rev())
            .chain(order)
            .chain(limit);
        for stage in stages {
            self.arena.set_source(stage, outer)?;
            outer = stage;
        }
        if let PlanNode::SelectTop(n) = self.arena.get_mut(top)? {
            n.plan = Some(outer);
        }

        if let Some(base) = self.arena.source(select) {
            self.expand_from(base, expanded)?;
        }
        if let Some(group) = group {
            self.expand_group(group, select, expanded)?;
        }
        Ok(())
    }

    /// Build the plan of every group child. The main chain and the children
    /// read the base rows through pipes over one cache.
    fn expand_group(&mut self, group: NodeId, select: NodeId, expanded: &mut HashSet<NodeId>) -> Result<(), PlannerError> {
        let children: Vec<Select> = match self.arena.get(group)? {
            PlanNode::Group(n) => n.children.iter().map(|c| c.select.clone()).collect(),
            _ => return Ok(()),
        };
        if children.is_empty() {
            return Ok(());
        }

        let base = self.arena.source(select).ok_or(PlannerError::Unwired("selectNode"))?;
        // A nested group reads through its ancestor's cache and leaves
        // resetting it to the ancestor.
        let (cache, owned) = match self.arena.get(base)? {
            PlanNode::Pipe(pipe) => (pipe.cache, false),
            _ => {
                let cache = self.arena.new_cache(base);
                let pipe = self.arena.push(PlanNode::Pipe(PipeNode::new(cache)));
                self.walk_and_replace(select, base, pipe)?;
                (cache, true)
            }
        };

        let mut plans = Vec::with_capacity(children.len());
        for child in &children {
            let built = self.build_select(child, false, false)?;
            let child_select = match self.arena.get(built.top)? {
                PlanNode::SelectTop(n) => n.select,
                other => {
                    return Err(PlannerError::InvalidRequest(format!(
                        "group child built as {}",
                        other.kind().name()
                    )));
                }
            };
            let pipe = self.arena.push(PlanNode::Pipe(PipeNode::new(cache)));
            if !self.walk_and_replace(child_select, built.scan, pipe)? {
                return Err(PlannerError::Unwired("groupNode"));
            }
            self.expand_from(built.top, expanded)?;
            plans.push(built.top);
        }

        if let PlanNode::Group(n) = self.arena.get_mut(group)? {
            n.cache = owned.then_some(cache);
            for (child, plan) in n.children.iter_mut().zip(plans) {
                child.plan = Some(plan);
            }
        }
        debug!(children = children.len(), "group expanded");
        Ok(())
    }
}
