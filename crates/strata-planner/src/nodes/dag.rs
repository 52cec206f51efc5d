use std::collections::{HashSet, VecDeque};

use bson::Bson;
use strata_query::{CommitSelect, Document, DocumentMapping, Value};
use strata_store::Cid;
use tracing::debug;

use crate::block::Block;
use crate::error::PlannerError;
use crate::fetcher::HeadFetcher;
use crate::keys::{COMPOSITE_FIELD, HeadStoreKey};
use crate::plan::{Arena, NodeId};

/// Yields the head commit ids of one document field, one per row in slot 0.
pub struct HeadsetNode<'t> {
    pub(crate) key: HeadStoreKey,
    fetcher: HeadFetcher<'t>,
    pub(crate) current: Document,
}

impl<'t> HeadsetNode<'t> {
    pub(crate) fn new(key: HeadStoreKey, fetcher: HeadFetcher<'t>) -> Self {
        Self {
            key,
            fetcher,
            current: Document::default(),
        }
    }

    pub(crate) fn retarget(&mut self, doc_key: &str) {
        self.key = HeadStoreKey::new(doc_key, &self.key.field);
    }

    pub(crate) fn init(&mut self) -> Result<(), PlannerError> {
        self.fetcher.start(&self.key)
    }

    pub(crate) fn next(&mut self) -> Result<bool, PlannerError> {
        match self.fetcher.fetch_next()? {
            Some(cid) => {
                let mut doc = Document::with_len(1);
                doc.set(0, cid.to_string());
                self.current = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) fn close(&mut self) {
        self.fetcher.close();
    }
}

/// Breadth-first walk over commit history.
///
/// Starts from the heads of a document (through a headset) or from one
/// commit. Each head gets its own depth budget; `_head` links are only
/// queued while the budget allows.
pub struct DagScanNode {
    pub(crate) mapping: DocumentMapping,
    pub(crate) doc_key: Option<String>,
    pub(crate) field: Option<String>,
    /// Only this commit is yielded when set.
    pub(crate) target: Option<Cid>,
    /// Walk root when no document is given.
    pub(crate) root: Option<Cid>,
    pub(crate) depth: Option<u64>,
    pub(crate) headset: Option<NodeId>,
    visited: HashSet<Cid>,
    queue: VecDeque<Cid>,
    pending_root: Option<Cid>,
    depth_visited: u64,
    pub(crate) current: Document,
}

impl DagScanNode {
    pub(crate) fn new(commits: &CommitSelect, headset: Option<NodeId>, depth: Option<u64>) -> Result<Self, PlannerError> {
        let cid = commits.cid.as_deref().map(Cid::parse).transpose()?;
        let root = match headset {
            Some(_) => None,
            None => cid.clone(),
        };
        Ok(Self {
            mapping: commits.mapping.clone(),
            doc_key: commits.doc_key.clone(),
            field: commits.field.clone(),
            target: cid,
            root,
            depth,
            headset,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            pending_root: None,
            depth_visited: 0,
            current: Document::default(),
        })
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.visited.clear();
        self.queue.clear();
        self.depth_visited = 0;
        self.pending_root = self.root.clone();
        match self.headset {
            Some(headset) => arena.init(headset),
            None => Ok(()),
        }
    }

    fn next_head(&mut self, arena: &mut Arena<'_>) -> Result<Option<Cid>, PlannerError> {
        let Some(headset) = self.headset else {
            return Ok(self.pending_root.take());
        };
        if !arena.next(headset)? {
            return Ok(None);
        }
        match arena.value(headset)?.get(0).as_str() {
            Some(cid) => Ok(Some(Cid::parse(cid)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        loop {
            let cid = match self.queue.pop_front() {
                Some(cid) => cid,
                None => match self.next_head(arena)? {
                    Some(head) => {
                        self.depth_visited = 0;
                        head
                    }
                    None => return Ok(false),
                },
            };
            if self.visited.contains(&cid) {
                continue;
            }

            let block = Block::decode(&cid, &arena.ds().get_block(&cid)?)?;
            self.depth_visited += 1;
            self.visited.insert(cid.clone());
            if self.depth.is_none_or(|max| self.depth_visited < max) {
                for link in block.head_links() {
                    self.queue.push_back(link.cid.clone());
                }
            }
            debug!(%cid, priority = block.priority, queued = self.queue.len(), "dag step");

            if self.target.as_ref().is_some_and(|t| *t != cid) {
                continue;
            }
            self.current = self.render(&cid, block);
            return Ok(true);
        }
    }

    fn render(&self, cid: &Cid, block: Block) -> Document {
        let mut doc = self.mapping.new_doc();
        let m = &self.mapping;
        m.set_first_of_name(&mut doc, CommitSelect::CID, cid.to_string());
        m.set_first_of_name(&mut doc, CommitSelect::HEIGHT, block.priority as i64);
        m.set_first_of_name(&mut doc, CommitSelect::SCHEMA_VERSION_ID, block.schema_version_id);
        m.set_first_of_name(&mut doc, CommitSelect::DOC_KEY, block.doc_key);
        let field_name = if block.field_name == COMPOSITE_FIELD {
            Value::Null
        } else {
            Value::from(block.field_name)
        };
        m.set_first_of_name(&mut doc, CommitSelect::FIELD_NAME, field_name);
        m.set_first_of_name(&mut doc, CommitSelect::DELTA, Value::Scalar(block.data));

        if let Some(index) = m.first_index_of_name(CommitSelect::LINKS) {
            let links_mapping = m.child_at(index);
            let links: Vec<Document> = block
                .links
                .iter()
                .map(|l| {
                    let mut link = links_mapping.map_or_else(|| Document::with_len(2), DocumentMapping::new_doc);
                    if let Some(lm) = links_mapping {
                        lm.set_first_of_name(&mut link, CommitSelect::LINK_NAME, l.name.as_str());
                        lm.set_first_of_name(&mut link, CommitSelect::LINK_CID, Bson::String(l.cid.to_string()));
                    }
                    link
                })
                .collect();
            doc.set(index, links);
        }
        doc
    }
}
