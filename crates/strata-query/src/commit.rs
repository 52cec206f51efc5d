use serde::{Deserialize, Serialize};

use crate::mapping::DocumentMapping;
use crate::order::OrderCondition;
use crate::select::Limit;

/// Commit history request.
///
/// With a document key the walk starts at the document's current heads
/// for `field` (the composite history when `field` is `None`). With only a
/// `cid` the walk starts at that commit. With both, the walk starts at the
/// heads and yields only the matching commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSelect {
    /// Slot in the parent mapping when nested under a select.
    pub index: usize,
    pub name: String,
    pub mapping: DocumentMapping,
    pub doc_key: Option<String>,
    pub cid: Option<String>,
    pub field: Option<String>,
    pub depth: Option<u64>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<Limit>,
}

impl CommitSelect {
    pub const CID: &'static str = "cid";
    pub const HEIGHT: &'static str = "height";
    pub const DELTA: &'static str = "delta";
    pub const SCHEMA_VERSION_ID: &'static str = "schemaVersionId";
    pub const FIELD_NAME: &'static str = "fieldName";
    pub const DOC_KEY: &'static str = "docKey";
    pub const LINKS: &'static str = "links";
    pub const LINK_NAME: &'static str = "name";
    pub const LINK_CID: &'static str = "cid";

    /// A request rendering every commit attribute, including links.
    pub fn new(name: &str) -> Self {
        let mut mapping = DocumentMapping::new();
        for field in [
            Self::CID,
            Self::HEIGHT,
            Self::DELTA,
            Self::SCHEMA_VERSION_ID,
            Self::FIELD_NAME,
            Self::DOC_KEY,
        ] {
            let index = mapping.add_next(field);
            mapping.add_render(index, field);
        }
        let mut links = DocumentMapping::new();
        for field in [Self::LINK_NAME, Self::LINK_CID] {
            let index = links.add_next(field);
            links.add_render(index, field);
        }
        let links_index = mapping.add_next(Self::LINKS);
        mapping.add_render(links_index, Self::LINKS);
        mapping.set_child_at(links_index, links);

        Self {
            index: 0,
            name: name.to_string(),
            mapping,
            doc_key: None,
            cid: None,
            field: None,
            depth: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Only the current heads.
    pub fn latest(doc_key: &str) -> Self {
        Self {
            doc_key: Some(doc_key.to_string()),
            depth: Some(1),
            ..Self::new("latestCommits")
        }
    }

    /// The full history.
    pub fn all(doc_key: &str) -> Self {
        Self {
            doc_key: Some(doc_key.to_string()),
            ..Self::new("allCommits")
        }
    }
}
