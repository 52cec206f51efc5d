use strata_query::Document;

use super::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheId(pub(crate) usize);

/// Rows pulled once from `source` and replayed to every pipe reading the
/// cache. Readers keep their own cursor into `rows`.
#[derive(Debug)]
pub(crate) struct RowCache {
    pub(crate) source: NodeId,
    pub(crate) rows: Vec<Document>,
    pub(crate) exhausted: bool,
    pub(crate) initialized: bool,
    pub(crate) closed: bool,
}

impl RowCache {
    pub(crate) fn new(source: NodeId) -> Self {
        Self {
            source,
            rows: Vec::new(),
            exhausted: false,
            initialized: false,
            closed: false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.rows.clear();
        self.exhausted = false;
        self.initialized = false;
    }
}
