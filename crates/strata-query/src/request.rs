use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, AggregateKind, AggregateTarget};
use crate::commit::CommitSelect;
use crate::mapping::DocumentMapping;
use crate::mutation::Mutation;
use crate::select::{Select, push_aggregate, push_average};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainMode {
    Simple,
    Execute,
    Debug,
}

/// Several selections and aggregates over them, answered as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopLevelSelect {
    pub mapping: DocumentMapping,
    pub selects: Vec<Select>,
    pub aggregates: Vec<Aggregate>,
}

impl TopLevelSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_select(&mut self, mut select: Select, render: bool) -> usize {
        let index = self.mapping.add_next(&select.name);
        select.index = index;
        self.mapping.set_child_at(index, select.mapping.clone());
        if render {
            self.mapping.add_render(index, &select.name);
        }
        self.selects.push(select);
        index
    }

    pub fn add_count(&mut self, name: &str, target: AggregateTarget) -> usize {
        let aggs = push_aggregate(&mut self.mapping, name, AggregateKind::Count, vec![target], true);
        self.push(aggs)
    }

    pub fn add_sum(&mut self, name: &str, targets: Vec<AggregateTarget>) -> usize {
        let aggs = push_aggregate(&mut self.mapping, name, AggregateKind::Sum, targets, true);
        self.push(aggs)
    }

    pub fn add_average(&mut self, name: &str, targets: Vec<AggregateTarget>) -> usize {
        let aggs = push_average(&mut self.mapping, name, targets);
        self.push(aggs)
    }

    fn push(&mut self, aggs: Vec<Aggregate>) -> usize {
        let index = aggs.first().map_or(0, |a| a.index);
        self.aggregates.extend(aggs);
        index
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select(Select),
    TopLevel(TopLevelSelect),
    Commits(CommitSelect),
    Mutation(Mutation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    pub explain: Option<ExplainMode>,
}

impl Request {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            explain: None,
        }
    }

    pub fn select(select: Select) -> Self {
        Self::new(Operation::Select(select))
    }

    pub fn commits(commits: CommitSelect) -> Self {
        Self::new(Operation::Commits(commits))
    }

    pub fn mutation(mutation: Mutation) -> Self {
        Self::new(Operation::Mutation(mutation))
    }

    pub fn top_level(top: TopLevelSelect) -> Self {
        Self::new(Operation::TopLevel(top))
    }

    pub fn explain(mut self, mode: ExplainMode) -> Self {
        self.explain = Some(mode);
        self
    }
}
