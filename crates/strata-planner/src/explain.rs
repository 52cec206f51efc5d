//! Plan reports for `explain` requests.
//!
//! Every node renders as `{ <nodeName>: { attributes.., <source>: {..} } }`.
//! Debug mode keeps the nesting and drops the attributes. Execute mode is
//! rendered after the plan ran and reports counters instead.

use bson::{Bson, Document, doc};
use strata_query::{Condition, ExplainMode, SortDirection};

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::filter::Filter;
use crate::plan::{Arena, NodeId, PlanNode};
use crate::span::{Span, Spans};

pub(crate) fn explain(
    arena: &Arena<'_>,
    root: NodeId,
    mode: ExplainMode,
    config: &PlannerConfig,
) -> Result<Document, PlannerError> {
    let report = Reporter { arena, mode, config };
    Ok(doc! { "explain": report.node(root)? })
}

struct Reporter<'a, 't> {
    arena: &'a Arena<'t>,
    mode: ExplainMode,
    config: &'a PlannerConfig,
}

impl Reporter<'_, '_> {
    fn node(&self, id: NodeId) -> Result<Document, PlannerError> {
        let node = self.arena.get(id)?;
        let mut body = Document::new();
        match self.mode {
            ExplainMode::Simple => {
                self.attributes(node, &mut body)?;
                if self.config.explain_counters {
                    self.counters(id, node, &mut body);
                }
            }
            ExplainMode::Execute => self.counters(id, node, &mut body),
            ExplainMode::Debug => {}
        }
        self.nested(node, &mut body)?;

        let mut out = Document::new();
        out.insert(node.kind().name(), body);
        Ok(out)
    }

    fn nested(&self, node: &PlanNode<'_>, body: &mut Document) -> Result<(), PlannerError> {
        match node {
            PlanNode::TypeJoin(n) => {
                body.insert("root", self.node(n.root)?);
                body.insert("subType", self.node(n.sub)?);
                return Ok(());
            }
            PlanNode::Parallel(n) => {
                body.insert("children", self.list(&n.children)?);
                return Ok(());
            }
            PlanNode::Group(n) => {
                let plans: Vec<NodeId> = n.children.iter().filter_map(|c| c.plan).collect();
                body.insert("childSelects", self.list(&plans)?);
            }
            PlanNode::TopLevel(n) => {
                let plans: Vec<NodeId> = n.children.iter().map(|(_, id)| *id).collect();
                body.insert("selects", self.list(&plans)?);
                return Ok(());
            }
            PlanNode::Update(n) => {
                body.insert("matcher", self.node(n.matcher)?);
            }
            PlanNode::Delete(n) => {
                body.insert("matcher", self.node(n.matcher)?);
            }
            PlanNode::Pipe(n) => {
                let source = self.arena.cache(n.cache)?.source;
                merge(body, self.node(source)?);
                return Ok(());
            }
            _ => {}
        }
        if let Some(source) = node.source() {
            merge(body, self.node(source)?);
        }
        Ok(())
    }

    fn list(&self, ids: &[NodeId]) -> Result<Bson, PlannerError> {
        let docs = ids.iter().map(|id| self.node(*id).map(Bson::Document)).collect::<Result<Vec<_>, _>>()?;
        Ok(Bson::Array(docs))
    }

    fn attributes(&self, node: &PlanNode<'_>, body: &mut Document) -> Result<(), PlannerError> {
        match node {
            PlanNode::Scan(n) => {
                body.insert("collectionID", n.desc.id.to_string());
                body.insert("collectionName", n.desc.name.as_str());
                body.insert("filter", filter_bson(n.filter.as_ref())?);
                body.insert("spans", spans_bson(&n.spans));
                body.insert("reverse", n.reverse);
                if let Some(cid) = &n.commit {
                    body.insert("cid", cid.as_str());
                }
            }
            PlanNode::Select(n) => {
                body.insert("filter", filter_bson(n.filter.as_ref())?);
                if let Some(keys) = &n.doc_keys {
                    let mut keys: Vec<&String> = keys.iter().collect();
                    keys.sort();
                    body.insert("docKeys", keys.into_iter().cloned().collect::<Vec<_>>());
                }
            }
            PlanNode::TypeJoin(n) => {
                body.insert("joinType", n.strategy.name());
                body.insert("rootName", n.root_name.as_str());
                body.insert("subTypeName", n.sub_type_name.as_str());
            }
            PlanNode::Group(n) => {
                let names: Vec<Bson> = n
                    .group_by
                    .iter()
                    .map(|&i| match n.mapping.try_find_name_from_index(i) {
                        Some(name) => Bson::String(name.to_string()),
                        None => Bson::Int64(i as i64),
                    })
                    .collect();
                body.insert("groupByFields", names);
            }
            PlanNode::Aggregate(n) => {
                body.insert("fieldName", n.step.name.as_str());
                let sources: Vec<Bson> = n
                    .step
                    .sources()
                    .into_iter()
                    .map(|(host, child)| {
                        Bson::Document(doc! {
                            "hostIndex": host as i64,
                            "childIndex": child.map_or(Bson::Null, |c| Bson::Int64(c as i64)),
                        })
                    })
                    .collect();
                body.insert("sources", sources);
            }
            PlanNode::Order(n) => {
                let orderings: Vec<Bson> = n
                    .orderings
                    .iter()
                    .map(|o| {
                        Bson::Document(doc! {
                            "fields": o.field_indexes.iter().map(|&i| i as i64).collect::<Vec<_>>(),
                            "direction": match o.direction {
                                SortDirection::Asc => "ASC",
                                SortDirection::Desc => "DESC",
                            },
                        })
                    })
                    .collect();
                body.insert("orderings", orderings);
            }
            PlanNode::Limit(n) => {
                body.insert("limit", n.limit.limit.map_or(Bson::Null, |l| Bson::Int64(l as i64)));
                body.insert("offset", n.limit.offset as i64);
            }
            PlanNode::DagScan(n) => {
                body.insert("cid", n.target.as_ref().or(n.root.as_ref()).map_or(Bson::Null, |c| Bson::String(c.to_string())));
                body.insert("field", n.field.clone().map_or(Bson::Null, Bson::String));
                body.insert("depth", n.depth.map_or(Bson::Null, |d| Bson::Int64(d as i64)));
            }
            PlanNode::Headset(n) => {
                body.insert("spans", spans_bson(&Spans::single(Span::prefix(n.key.prefix()))));
            }
            PlanNode::MultiScan(n) => {
                body.insert("readers", n.readers as i64);
            }
            PlanNode::Create(n) => {
                body.insert("collectionName", n.desc.name.as_str());
                body.insert("data", n.input.clone());
            }
            PlanNode::Update(n) => {
                body.insert("collectionName", n.desc.name.as_str());
                body.insert("data", n.patch.clone());
            }
            PlanNode::Delete(n) => {
                body.insert("collectionName", n.desc.name.as_str());
            }
            PlanNode::SelectTop(_) | PlanNode::Pipe(_) | PlanNode::Parallel(_) | PlanNode::TopLevel(_) => {}
        }
        Ok(())
    }

    fn counters(&self, id: NodeId, node: &PlanNode<'_>, body: &mut Document) {
        body.insert("iterations", self.arena.iterations(id) as i64);
        match node {
            PlanNode::Scan(n) => {
                let stats = n.stats();
                body.insert("docFetches", stats.fetcher.doc_fetches as i64);
                body.insert("fieldFetches", stats.fetcher.field_fetches as i64);
                body.insert("filterMatches", stats.filter_matches as i64);
            }
            PlanNode::Select(n) => {
                body.insert("filterMatches", n.filter_matches as i64);
            }
            _ => {}
        }
    }
}

fn merge(body: &mut Document, nested: Document) {
    for (key, value) in nested {
        body.insert(key, value);
    }
}

fn filter_bson(filter: Option<&Filter>) -> Result<Bson, PlannerError> {
    match filter.map(Filter::condition) {
        Some(condition) => condition_bson(condition),
        None => Ok(Bson::Null),
    }
}

fn condition_bson(condition: &Condition) -> Result<Bson, PlannerError> {
    Ok(bson::serialize_to_bson(condition)?)
}

fn spans_bson(spans: &Spans) -> Bson {
    Bson::Array(
        spans
            .iter()
            .map(|s| {
                Bson::Document(doc! {
                    "start": String::from_utf8_lossy(&s.start).into_owned(),
                    "end": String::from_utf8_lossy(&s.end).into_owned(),
                })
            })
            .collect(),
    )
}
