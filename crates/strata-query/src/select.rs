use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, AggregateKind, AggregateTarget};
use crate::commit::CommitSelect;
use crate::filter::{CompareOp, Condition};
use crate::mapping::DocumentMapping;
use crate::order::OrderCondition;
use crate::{GROUP_FIELD, KEY_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Limit {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub fn with_offset(limit: Option<u64>, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Whether the zero-based row position falls inside the window.
    pub fn contains(&self, position: u64) -> bool {
        position >= self.offset && self.limit.is_none_or(|l| position < self.offset.saturating_add(l))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBy {
    pub fields: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationSide {
    /// The parent record stores the foreign key.
    Primary,
    /// The related record stores the foreign key.
    Secondary,
}

/// Static shape of the relation behind a nested select.
///
/// For the primary side `foreign_key` is a slot in the parent mapping that
/// holds the related document's key; otherwise it is a slot in the child
/// mapping that holds the parent's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub cardinality: Cardinality,
    pub side: RelationSide,
    pub foreign_key: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Plain { index: usize, name: String },
    Select(Box<Select>),
    Aggregate(Aggregate),
    Commits(Box<CommitSelect>),
}

/// A resolved selection over one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Slot in the parent mapping when nested.
    pub index: usize,
    pub name: String,
    pub collection: String,
    pub mapping: DocumentMapping,
    pub fields: Vec<Field>,
    pub filter: Option<Condition>,
    pub limit: Option<Limit>,
    pub order_by: Vec<OrderCondition>,
    pub group_by: Option<GroupBy>,
    pub doc_keys: Option<Vec<String>>,
    /// Read the document as of this commit.
    pub commit: Option<String>,
    pub show_deleted: bool,
    pub relation: Option<Relation>,
}

impl Select {
    /// A selection with the document key registered at slot 0.
    pub fn new(collection: &str) -> Self {
        let mut mapping = DocumentMapping::new();
        mapping.add_next(KEY_FIELD);
        Self {
            index: 0,
            name: collection.to_string(),
            collection: collection.to_string(),
            mapping,
            fields: Vec::new(),
            filter: None,
            limit: None,
            order_by: Vec::new(),
            group_by: None,
            doc_keys: None,
            commit: None,
            show_deleted: false,
            relation: None,
        }
    }

    /// A nested selection reached through `relation`, rendered under `name`.
    pub fn related(collection: &str, name: &str, relation: Relation) -> Self {
        Self {
            name: name.to_string(),
            relation: Some(relation),
            ..Self::new(collection)
        }
    }

    pub fn key_index(&self) -> Option<usize> {
        self.mapping.first_index_of_name(KEY_FIELD)
    }

    /// Also render the document key.
    pub fn render_key(&mut self) {
        self.render_existing(KEY_FIELD);
    }

    /// Render an already registered slot under its own name.
    pub fn render_existing(&mut self, name: &str) {
        if let Some(index) = self.mapping.first_index_of_name(name) {
            self.mapping.add_render(index, name);
        }
    }

    pub fn add_field(&mut self, name: &str) -> usize {
        let index = self.add_hidden_field(name);
        self.mapping.add_render(index, name);
        index
    }

    /// A fetched field that is not part of the rendered output.
    pub fn add_hidden_field(&mut self, name: &str) -> usize {
        let index = self.mapping.add_next(name);
        self.fields.push(Field::Plain {
            index,
            name: name.to_string(),
        });
        index
    }

    /// Attach a nested selection at the next free slot.
    pub fn add_child(&mut self, mut child: Select, render: bool) -> usize {
        let index = self.mapping.add_next(&child.name);
        child.index = index;
        self.mapping.set_child_at(index, child.mapping.clone());
        if render {
            self.mapping.add_render(index, &child.name);
        }
        self.fields.push(Field::Select(Box::new(child)));
        index
    }

    /// A `_group` selection sharing this selection's slot layout.
    pub fn group_child(&self) -> Select {
        Select {
            index: 0,
            name: GROUP_FIELD.to_string(),
            collection: self.collection.clone(),
            mapping: self.mapping.clone_without_render(),
            fields: Vec::new(),
            filter: None,
            limit: None,
            order_by: Vec::new(),
            group_by: None,
            doc_keys: None,
            commit: None,
            show_deleted: self.show_deleted,
            relation: None,
        }
    }

    pub fn add_commits(&mut self, mut commits: CommitSelect) -> usize {
        let index = self.mapping.add_next(&commits.name);
        commits.index = index;
        self.mapping.set_child_at(index, commits.mapping.clone());
        self.mapping.add_render(index, &commits.name);
        self.fields.push(Field::Commits(Box::new(commits)));
        index
    }

    pub fn add_count(&mut self, name: &str, target: AggregateTarget) -> usize {
        let aggs = push_aggregate(&mut self.mapping, name, AggregateKind::Count, vec![target], true);
        self.push_aggregates(aggs)
    }

    pub fn add_sum(&mut self, name: &str, targets: Vec<AggregateTarget>) -> usize {
        let aggs = push_aggregate(&mut self.mapping, name, AggregateKind::Sum, targets, true);
        self.push_aggregates(aggs)
    }

    /// Register an average plus the hidden sum and count it reads.
    pub fn add_average(&mut self, name: &str, targets: Vec<AggregateTarget>) -> usize {
        let aggs = push_average(&mut self.mapping, name, targets);
        self.push_aggregates(aggs)
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &Aggregate> {
        self.fields.iter().filter_map(|f| match f {
            Field::Aggregate(a) => Some(a),
            _ => None,
        })
    }

    pub fn child_selects(&self) -> impl Iterator<Item = &Select> {
        self.fields.iter().filter_map(|f| match f {
            Field::Select(s) => Some(s.as_ref()),
            _ => None,
        })
    }

    fn push_aggregates(&mut self, aggs: Vec<Aggregate>) -> usize {
        let index = aggs.first().map_or(0, |a| a.index);
        self.fields.extend(aggs.into_iter().map(Field::Aggregate));
        index
    }
}

pub(crate) fn push_aggregate(
    mapping: &mut DocumentMapping,
    name: &str,
    kind: AggregateKind,
    targets: Vec<AggregateTarget>,
    render: bool,
) -> Vec<Aggregate> {
    let index = mapping.add_next(name);
    if render {
        mapping.add_render(index, name);
    }
    vec![Aggregate {
        index,
        name: name.to_string(),
        kind,
        targets,
        dependencies: Vec::new(),
    }]
}

/// The average comes first so that back-to-front execution produces the
/// hidden sum and count before it.
pub(crate) fn push_average(
    mapping: &mut DocumentMapping,
    name: &str,
    targets: Vec<AggregateTarget>,
) -> Vec<Aggregate> {
    let mut out = push_aggregate(mapping, name, AggregateKind::Average, targets.clone(), true);
    let avg_index = out[0].index;
    let sum_name = format!("_avg{avg_index}_sum");
    let count_name = format!("_avg{avg_index}_count");

    let count_targets = targets
        .iter()
        .cloned()
        .map(|mut t| {
            if let Some(child) = t.child_index {
                let not_null = Condition::field(child, CompareOp::Ne, Bson::Null);
                t.filter = Some(match t.filter.take() {
                    Some(existing) => Condition::And(vec![existing, not_null]),
                    None => not_null,
                });
            }
            t
        })
        .collect();

    out[0].dependencies = vec![sum_name.clone(), count_name.clone()];
    out.extend(push_aggregate(mapping, &sum_name, AggregateKind::Sum, targets, false));
    out.extend(push_aggregate(mapping, &count_name, AggregateKind::Count, count_targets, false));
    out
}
