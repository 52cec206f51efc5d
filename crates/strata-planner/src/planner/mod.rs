//! Plan construction.
//!
//! Building is two passes. [`Planner::new_plan`] translates a request into
//! unwired nodes, recording on each `selectTopNode` the stages it needs.
//! [`Planner::expand_plan`] then chains those stages, builds the child plans
//! of group nodes and splices shared row caches into place.

mod expand;
mod select;

use std::collections::HashSet;

use strata_query::{CommitSelect, Field, Mutation, MutationKind, Operation, Request, Select, TopLevelSelect};
use strata_store::Datastore;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::fetcher::HeadFetcher;
use crate::keys::{COMPOSITE_FIELD, HeadStoreKey};
use crate::nodes::{
    AggregateStep, CreateNode, DagScanNode, DeleteNode, HeadsetNode, LimitNode, OrderNode, TopLevelNode, UpdateNode,
};
use crate::plan::{Arena, NodeId, PlanNode};

pub(crate) use select::BuiltSelect;

pub struct Planner<'t> {
    arena: Arena<'t>,
    config: PlannerConfig,
}

impl<'t> Planner<'t> {
    pub fn new(ds: &'t dyn Datastore, config: PlannerConfig) -> Self {
        Self {
            arena: Arena::new(ds),
            config,
        }
    }

    pub fn arena(&self) -> &Arena<'t> {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena<'t> {
        &mut self.arena
    }

    pub fn into_arena(self) -> Arena<'t> {
        self.arena
    }

    /// Build the unwired plan for one request and return its root.
    pub fn new_plan(&mut self, request: &Request) -> Result<NodeId, PlannerError> {
        let root = match &request.operation {
            Operation::Select(select) => self.build_select(select, true, true)?.top,
            Operation::TopLevel(top) => self.build_top_level(top)?,
            Operation::Commits(commits) => self.build_commits(commits)?,
            Operation::Mutation(mutation) => self.build_mutation(mutation)?,
        };
        debug!(root = root.0, nodes = self.arena.len(), "plan built");
        Ok(root)
    }

    /// Wire every `selectTopNode` reachable from `root`.
    pub fn expand_plan(&mut self, root: NodeId) -> Result<(), PlannerError> {
        let mut expanded = HashSet::new();
        self.expand_from(root, &mut expanded)?;
        debug!(root = root.0, nodes = self.arena.len(), "plan expanded");
        Ok(())
    }

    /// Find the node below `start` whose source is `target` and point it at
    /// `replacement` instead. Returns whether a node was rewired.
    pub fn walk_and_replace(&mut self, start: NodeId, target: NodeId, replacement: NodeId) -> Result<bool, PlannerError> {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if self.arena.source(id) == Some(target) {
                return self.arena.set_source(id, replacement);
            }
            stack.extend(self.arena.children(id));
            stack.extend(self.arena.source(id));
        }
        Ok(false)
    }

    // ── Top level ───────────────────────────────────────────

    fn build_top_level(&mut self, top: &TopLevelSelect) -> Result<NodeId, PlannerError> {
        let mut children = Vec::with_capacity(top.selects.len());
        for select in &top.selects {
            children.push((select.index, self.build_select(select, true, true)?.top));
        }
        let steps = top
            .aggregates
            .iter()
            .map(|agg| AggregateStep::build(agg, &top.mapping))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .arena
            .push(PlanNode::TopLevel(TopLevelNode::new(top.mapping.clone(), children, steps))))
    }

    // ── Commits ─────────────────────────────────────────────

    fn build_commits(&mut self, commits: &CommitSelect) -> Result<NodeId, PlannerError> {
        if commits.doc_key.is_none() && commits.cid.is_none() {
            return Err(PlannerError::InvalidRequest(format!(
                "{} needs a document key or a commit id",
                commits.name
            )));
        }
        let depth = commits.depth.or(self.config.default_commit_depth);
        let (top, _) = self.build_commit_chain(commits, commits.doc_key.is_some(), depth)?;
        Ok(top)
    }

    /// dagScanNode → [orderNode] → [limitNode], wired. Returns the outermost
    /// node and the DAG scan.
    pub(crate) fn build_commit_chain(
        &mut self,
        commits: &CommitSelect,
        with_heads: bool,
        depth: Option<u64>,
    ) -> Result<(NodeId, NodeId), PlannerError> {
        let headset = if with_heads {
            let doc_key = commits.doc_key.as_deref().unwrap_or_default();
            let field = commits.field.as_deref().unwrap_or(COMPOSITE_FIELD);
            let node = HeadsetNode::new(HeadStoreKey::new(doc_key, field), HeadFetcher::new(self.arena.ds()));
            Some(self.arena.push(PlanNode::Headset(node)))
        } else {
            None
        };
        let dag = self
            .arena
            .push(PlanNode::DagScan(DagScanNode::new(commits, headset, depth)?));

        let mut outer = dag;
        if !commits.order_by.is_empty() {
            let mut order = OrderNode::new(commits.order_by.clone());
            order.source = Some(outer);
            outer = self.arena.push(PlanNode::Order(order));
        }
        if let Some(limit) = commits.limit {
            let mut node = LimitNode::new(limit);
            node.source = Some(outer);
            outer = self.arena.push(PlanNode::Limit(node));
        }
        Ok((outer, dag))
    }

    // ── Mutations ───────────────────────────────────────────

    fn build_mutation(&mut self, mutation: &Mutation) -> Result<NodeId, PlannerError> {
        let desc = Catalog::load_collection(self.arena.ds(), &mutation.select.collection)?;
        let response = Select {
            filter: None,
            doc_keys: None,
            ..mutation.select.clone()
        };
        let built = self.build_select(&response, true, true)?;

        let node = match mutation.kind {
            MutationKind::Create => {
                let input = mutation
                    .input
                    .clone()
                    .ok_or_else(|| PlannerError::InvalidRequest("create needs an input document".into()))?;
                PlanNode::Create(CreateNode::new(desc, input, built.top, built.scan))
            }
            MutationKind::Update => {
                let patch = mutation
                    .input
                    .clone()
                    .ok_or_else(|| PlannerError::InvalidRequest("update needs an input document".into()))?;
                let (matcher, key_index) = self.build_matcher(mutation)?;
                PlanNode::Update(UpdateNode::new(desc, patch, matcher, key_index, built.top, built.scan))
            }
            MutationKind::Delete => {
                let (matcher, key_index) = self.build_matcher(mutation)?;
                PlanNode::Delete(DeleteNode::new(desc, matcher, key_index, built.top, built.scan))
            }
        };
        Ok(self.arena.push(node))
    }

    /// Selection of the documents an update or delete applies to.
    fn build_matcher(&mut self, mutation: &Mutation) -> Result<(NodeId, usize), PlannerError> {
        let source = &mutation.select;
        let fields = source
            .fields
            .iter()
            .filter(|f| match f {
                Field::Plain { .. } => true,
                Field::Select(child) => child.relation.is_some(),
                Field::Aggregate(_) | Field::Commits(_) => false,
            })
            .cloned()
            .collect();
        let matcher = Select {
            fields,
            filter: mutation.filter.clone(),
            doc_keys: mutation.doc_keys.clone(),
            order_by: Vec::new(),
            limit: None,
            group_by: None,
            ..source.clone()
        };
        let key_index = matcher
            .key_index()
            .ok_or_else(|| PlannerError::FieldNotFound(strata_query::KEY_FIELD.into()))?;
        Ok((self.build_select(&matcher, true, true)?.top, key_index))
    }
}
