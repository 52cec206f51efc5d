use strata_query::{Cardinality, Condition, Document, Field, GROUP_FIELD, RelationSide, Select, SortDirection};
use strata_store::Cid;
use tracing::debug;

use super::Planner;
use crate::catalog::Catalog;
use crate::error::PlannerError;
use crate::fetcher::{DocumentFetcher, Fetcher, VersionedFetcher};
use crate::filter::{Filter, merge_conditions, related_condition, split_pushdown, validate};
use crate::nodes::{
    AggregateNode, AggregateStep, GroupChild, GroupNode, JoinStrategy, LimitNode, MultiScanNode, OrderNode,
    ParallelNode, ScanNode, SelectNode, SelectTopNode, TypeJoinNode,
};
use crate::plan::{NodeId, PlanNode};

/// Nodes of interest in a freshly built selection.
#[derive(Debug, Clone)]
pub(crate) struct BuiltSelect {
    pub(crate) top: NodeId,
    pub(crate) scan: NodeId,
    /// Condition pushed into the scan.
    pub(crate) scan_filter: Option<Condition>,
}

/// A join whose sub-plan is built but whose parent source is not chosen yet.
struct PendingJoin {
    sub: NodeId,
    sub_scan: Option<NodeId>,
    sub_filter: Option<Condition>,
    strategy: JoinStrategy,
    index: usize,
    sub_type_name: String,
}

impl<'t> Planner<'t> {
    /// Build the unwired stages of one selection.
    ///
    /// With `pushdown` off the whole filter stays on the select stage. With
    /// `with_limit` off no limit stage is built; group children apply their
    /// window by hiding rows instead.
    pub(crate) fn build_select(
        &mut self,
        select: &Select,
        pushdown: bool,
        with_limit: bool,
    ) -> Result<BuiltSelect, PlannerError> {
        let desc = Catalog::load_collection(self.arena.ds(), &select.collection)?;
        if let Some(filter) = &select.filter {
            validate(filter, &select.mapping)?;
        }

        let key_index = select.key_index();
        let key_order = match select.order_by.as_slice() {
            [order] if select.group_by.is_none() && key_index.is_some_and(|k| order.field_indexes == [k]) => {
                Some(order.direction)
            }
            _ => None,
        };

        let (scan_filter, residual) = if pushdown {
            split_pushdown(select.filter.clone())
        } else {
            (None, select.filter.clone())
        };

        let fetcher: Box<dyn Fetcher<'t> + 't> = match &select.commit {
            Some(cid) => Box::new(VersionedFetcher::new(self.arena.ds(), Cid::parse(cid)?)),
            None => Box::new(DocumentFetcher::new(self.arena.ds())),
        };
        let mut scan = ScanNode::new(desc.clone(), select.mapping.clone(), fetcher);
        scan.filter = Filter::from_option(scan_filter.clone())?;
        scan.reverse = key_order == Some(SortDirection::Desc);
        scan.show_deleted = select.show_deleted;
        scan.commit = select.commit.clone();
        if let Some(keys) = &select.doc_keys {
            scan.narrow_to_keys(keys);
        }
        let scan = self.arena.push(PlanNode::Scan(scan));

        // ── Joins ──
        let mut pending = Vec::new();
        for field in &select.fields {
            match field {
                Field::Select(child) if child.relation.is_some() => {
                    pending.push(self.build_join(select, child)?);
                }
                Field::Select(child) if select.group_by.is_none() => {
                    return Err(PlannerError::UnknownRelation(child.name.clone()));
                }
                Field::Commits(commits) => {
                    let parent_key = key_index.ok_or_else(|| PlannerError::FieldNotFound(strata_query::KEY_FIELD.into()))?;
                    let (sub, dag) = self.build_commit_chain(commits, true, commits.depth.or(Some(1)))?;
                    pending.push(PendingJoin {
                        sub,
                        sub_scan: None,
                        sub_filter: None,
                        strategy: JoinStrategy::Version { dag, parent_key },
                        index: commits.index,
                        sub_type_name: commits.name.clone(),
                    });
                }
                _ => {}
            }
        }
        let source = self.attach_joins(scan, &select.name, pending);

        let select_node = SelectNode {
            source,
            filter: Filter::from_option(residual)?,
            doc_keys: select.doc_keys.as_ref().map(|keys| keys.iter().cloned().collect()),
            key_index,
            mapping: select.mapping.clone(),
            type_name: desc.name.clone(),
            filter_matches: 0,
            current: Document::default(),
        };
        let select_id = self.arena.push(PlanNode::Select(select_node));

        // ── Post-processing stages, wired by expand ──
        let group = match &select.group_by {
            Some(group_by) => {
                let (parent_scan_filter, _) = split_pushdown(select.filter.clone());
                let children = select
                    .child_selects()
                    .filter(|child| child.relation.is_none())
                    .map(|child| {
                        let mut child = child.clone();
                        child.filter = merge_conditions(parent_scan_filter.clone(), child.filter.take());
                        if child.doc_keys.is_none() {
                            child.doc_keys = select.doc_keys.clone();
                        }
                        if let Some(nested) = &mut child.group_by {
                            let mut fields = group_by.fields.clone();
                            fields.extend(nested.fields.iter().filter(|f| !group_by.fields.contains(f)));
                            nested.fields = fields;
                        }
                        GroupChild {
                            index: child.index,
                            limit: child.limit,
                            select: child,
                            plan: None,
                        }
                    })
                    .collect::<Vec<_>>();
                let rows_index = if children.is_empty() {
                    select.mapping.first_index_of_name(GROUP_FIELD)
                } else {
                    None
                };
                let node = GroupNode::new(group_by.fields.clone(), children, rows_index, select.mapping.clone());
                Some(self.arena.push(PlanNode::Group(node)))
            }
            None => None,
        };

        let mut aggregates = Vec::new();
        for agg in select.aggregates() {
            let step = AggregateStep::build(agg, &select.mapping)?;
            aggregates.push(self.arena.push(PlanNode::Aggregate(AggregateNode::new(step))));
        }

        let order = if select.order_by.is_empty() || key_order.is_some() {
            None
        } else {
            Some(self.arena.push(PlanNode::Order(OrderNode::new(select.order_by.clone()))))
        };
        let limit = match select.limit {
            Some(limit) if with_limit => Some(self.arena.push(PlanNode::Limit(LimitNode::new(limit)))),
            _ => None,
        };

        let top = self.arena.push(PlanNode::SelectTop(SelectTopNode {
            select: select_id,
            scan,
            group,
            aggregates,
            order,
            limit,
            plan: None,
        }));
        debug!(
            collection = %desc.name,
            reverse = key_order == Some(SortDirection::Desc),
            grouped = group.is_some(),
            "select built"
        );
        Ok(BuiltSelect { top, scan, scan_filter })
    }

    /// Build the related sub-plan of `child` and pick its join strategy.
    fn build_join(&mut self, parent: &Select, child: &Select) -> Result<PendingJoin, PlannerError> {
        let Some(relation) = child.relation else {
            return Err(PlannerError::UnknownRelation(child.name.clone()));
        };
        let parent_key = || {
            parent
                .key_index()
                .ok_or_else(|| PlannerError::FieldNotFound(strata_query::KEY_FIELD.into()))
        };
        let strategy = match (relation.cardinality, relation.side) {
            (Cardinality::One, RelationSide::Primary) => JoinStrategy::OnePrimary {
                foreign_key: relation.foreign_key,
            },
            (Cardinality::One, RelationSide::Secondary) => JoinStrategy::OneSecondary {
                foreign_key: relation.foreign_key,
                parent_key: parent_key()?,
            },
            (Cardinality::Many, RelationSide::Secondary) => JoinStrategy::Many {
                foreign_key: relation.foreign_key,
                parent_key: parent_key()?,
            },
            (Cardinality::Many, RelationSide::Primary) => {
                return Err(PlannerError::UnknownRelation(child.name.clone()));
            }
        };

        // Conditions the parent places on a single related object are
        // checked on the related scan as well.
        let mut child = child.clone();
        if relation.cardinality == Cardinality::One {
            let upward = parent
                .filter
                .as_ref()
                .and_then(|f| related_condition(f, child.index));
            child.filter = merge_conditions(child.filter.take(), upward);
        }

        let built = self.build_select(&child, true, true)?;
        Ok(PendingJoin {
            sub: built.top,
            sub_scan: Some(built.scan),
            sub_filter: built.scan_filter,
            strategy,
            index: child.index,
            sub_type_name: child.name.clone(),
        })
    }

    /// One join reads the scan directly. Several share it through a
    /// multiScanNode and are merged by a parallelNode.
    fn attach_joins(&mut self, scan: NodeId, root_name: &str, pending: Vec<PendingJoin>) -> NodeId {
        if pending.is_empty() {
            return scan;
        }
        let root = if pending.len() == 1 {
            scan
        } else {
            self.arena
                .push(PlanNode::MultiScan(MultiScanNode::new(scan, pending.len())))
        };
        let joins: Vec<NodeId> = pending
            .into_iter()
            .map(|join| {
                self.arena.push(PlanNode::TypeJoin(TypeJoinNode {
                    root,
                    sub: join.sub,
                    sub_scan: join.sub_scan,
                    sub_filter: join.sub_filter,
                    strategy: join.strategy,
                    index: join.index,
                    root_name: root_name.to_string(),
                    sub_type_name: join.sub_type_name,
                    current: Document::default(),
                }))
            })
            .collect();
        match joins.as_slice() {
            [single] => *single,
            _ => self.arena.push(PlanNode::Parallel(ParallelNode {
                children: joins,
                current: Document::default(),
            })),
        }
    }
}
