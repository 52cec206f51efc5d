use std::collections::{HashMap, HashSet, VecDeque};

use bson::Bson;
use strata_store::{Cid, Datastore};
use tracing::debug;

use super::{EncodedDocument, Fetcher, FetcherStats};
use crate::block::Block;
use crate::catalog::CollectionDescription;
use crate::error::PlannerError;
use crate::keys::COMPOSITE_FIELD;
use crate::span::Spans;

/// Rebuilds one document as of a commit by walking the history below it
/// and keeping the highest-priority value of every field.
pub struct VersionedFetcher<'t> {
    ds: &'t dyn Datastore,
    cid: Cid,
    wanted: Option<HashSet<String>>,
    show_deleted: bool,
    done: bool,
    stats: FetcherStats,
}

impl<'t> VersionedFetcher<'t> {
    pub fn new(ds: &'t dyn Datastore, cid: Cid) -> Self {
        Self {
            ds,
            cid,
            wanted: None,
            show_deleted: false,
            done: false,
            stats: FetcherStats::default(),
        }
    }

    fn load(&self, cid: &Cid) -> Result<Block, PlannerError> {
        Block::decode(cid, &self.ds.get_block(cid)?)
    }

    fn rebuild(&mut self) -> Result<EncodedDocument, PlannerError> {
        let root = self.load(&self.cid)?;
        let deleted = matches!(&root.data, Bson::Document(d) if d.get_bool("_deleted").unwrap_or(false));
        let key = root.doc_key.clone();

        let mut latest: HashMap<String, (u64, Bson)> = HashMap::new();
        let mut visited = HashSet::from([self.cid.clone()]);
        let mut queue = VecDeque::from([root]);

        while let Some(block) = queue.pop_front() {
            let wanted = self.wanted.as_ref().is_none_or(|w| w.contains(&block.field_name));
            if block.field_name != COMPOSITE_FIELD && wanted {
                let newer = latest
                    .get(&block.field_name)
                    .is_none_or(|(priority, _)| block.priority > *priority);
                if newer {
                    latest.insert(block.field_name.clone(), (block.priority, block.data.clone()));
                }
            }
            for link in &block.links {
                if visited.insert(link.cid.clone()) {
                    queue.push_back(self.load(&link.cid)?);
                }
            }
        }
        debug!(cid = %self.cid, blocks = visited.len(), "rebuilt versioned document");

        let mut fields: Vec<(String, Bson)> = latest.into_iter().map(|(name, (_, v))| (name, v)).collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        self.stats.doc_fetches += 1;
        self.stats.field_fetches += fields.len() as u64;
        Ok(EncodedDocument { key, fields, deleted })
    }
}

impl<'t> Fetcher<'t> for VersionedFetcher<'t> {
    fn init(
        &mut self,
        _desc: &CollectionDescription,
        fields: &[String],
        _reverse: bool,
        show_deleted: bool,
    ) -> Result<(), PlannerError> {
        self.wanted = if fields.is_empty() {
            None
        } else {
            Some(fields.iter().cloned().collect())
        };
        self.show_deleted = show_deleted;
        Ok(())
    }

    /// The commit pins the document, so spans are not consulted.
    fn start(&mut self, _spans: &Spans) -> Result<(), PlannerError> {
        self.done = false;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<EncodedDocument>, PlannerError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let doc = self.rebuild()?;
        if doc.deleted && !self.show_deleted {
            return Ok(None);
        }
        Ok(Some(doc))
    }

    fn close(&mut self) -> Result<(), PlannerError> {
        self.done = true;
        Ok(())
    }

    fn stats(&self) -> FetcherStats {
        self.stats
    }
}
