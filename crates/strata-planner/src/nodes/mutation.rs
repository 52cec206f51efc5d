use strata_query::Document;
use tracing::debug;

use crate::catalog::CollectionDescription;
use crate::collection::CollectionWriter;
use crate::error::PlannerError;
use crate::plan::{Arena, NodeId};

/// Keys of every document the matcher yields.
fn matched_keys(arena: &mut Arena<'_>, matcher: NodeId, key_index: usize) -> Result<Vec<String>, PlannerError> {
    let mut keys = Vec::new();
    while arena.next(matcher)? {
        if let Some(key) = arena.value(matcher)?.get(key_index).as_str() {
            keys.push(key.to_string());
        }
    }
    Ok(keys)
}

/// Point the response selection at `keys` and restart it.
fn reselect(arena: &mut Arena<'_>, select: NodeId, scan: NodeId, keys: &[String]) -> Result<(), PlannerError> {
    arena.narrow_scan_to_keys(scan, keys)?;
    arena.init(select)?;
    arena.start(select)
}

// ── Create ──────────────────────────────────────────────────

pub struct CreateNode {
    pub(crate) desc: CollectionDescription,
    pub(crate) input: bson::Document,
    /// Response selection, read back after the write.
    pub(crate) select: NodeId,
    pub(crate) select_scan: NodeId,
    written: bool,
    pub(crate) current: Document,
}

impl CreateNode {
    pub(crate) fn new(desc: CollectionDescription, input: bson::Document, select: NodeId, select_scan: NodeId) -> Self {
        Self {
            desc,
            input,
            select,
            select_scan,
            written: false,
            current: Document::default(),
        }
    }

    pub(crate) fn init(&mut self) -> Result<(), PlannerError> {
        self.written = false;
        Ok(())
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !self.written {
            let key = CollectionWriter::new(arena.ds(), &self.desc).create(&self.input)?;
            debug!(collection = %self.desc.name, doc_key = %key, "created document");
            reselect(arena, self.select, self.select_scan, &[key])?;
            self.written = true;
        }
        if !arena.next(self.select)? {
            return Ok(false);
        }
        self.current = arena.value(self.select)?.clone();
        Ok(true)
    }
}

// ── Update ──────────────────────────────────────────────────

pub struct UpdateNode {
    pub(crate) desc: CollectionDescription,
    pub(crate) patch: bson::Document,
    /// Selection of the documents to update.
    pub(crate) matcher: NodeId,
    pub(crate) matcher_key_index: usize,
    pub(crate) select: NodeId,
    pub(crate) select_scan: NodeId,
    applied: bool,
    pub(crate) current: Document,
}

impl UpdateNode {
    pub(crate) fn new(
        desc: CollectionDescription,
        patch: bson::Document,
        matcher: NodeId,
        matcher_key_index: usize,
        select: NodeId,
        select_scan: NodeId,
    ) -> Self {
        Self {
            desc,
            patch,
            matcher,
            matcher_key_index,
            select,
            select_scan,
            applied: false,
            current: Document::default(),
        }
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.applied = false;
        arena.init(self.matcher)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !self.applied {
            let keys = matched_keys(arena, self.matcher, self.matcher_key_index)?;
            let writer = CollectionWriter::new(arena.ds(), &self.desc);
            for key in &keys {
                writer.update(key, &self.patch)?;
            }
            debug!(collection = %self.desc.name, updated = keys.len(), "updated documents");
            reselect(arena, self.select, self.select_scan, &keys)?;
            self.applied = true;
        }
        if !arena.next(self.select)? {
            return Ok(false);
        }
        self.current = arena.value(self.select)?.clone();
        Ok(true)
    }
}

// ── Delete ──────────────────────────────────────────────────

/// Reads the matched documents before removing them, then replays what
/// was read.
pub struct DeleteNode {
    pub(crate) desc: CollectionDescription,
    pub(crate) matcher: NodeId,
    pub(crate) matcher_key_index: usize,
    pub(crate) select: NodeId,
    pub(crate) select_scan: NodeId,
    rows: Vec<Document>,
    position: usize,
    applied: bool,
    pub(crate) current: Document,
}

impl DeleteNode {
    pub(crate) fn new(
        desc: CollectionDescription,
        matcher: NodeId,
        matcher_key_index: usize,
        select: NodeId,
        select_scan: NodeId,
    ) -> Self {
        Self {
            desc,
            matcher,
            matcher_key_index,
            select,
            select_scan,
            rows: Vec::new(),
            position: 0,
            applied: false,
            current: Document::default(),
        }
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.reset();
        arena.init(self.matcher)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if !self.applied {
            let keys = matched_keys(arena, self.matcher, self.matcher_key_index)?;
            reselect(arena, self.select, self.select_scan, &keys)?;
            while arena.next(self.select)? {
                self.rows.push(arena.value(self.select)?.clone());
            }
            let writer = CollectionWriter::new(arena.ds(), &self.desc);
            for key in &keys {
                writer.delete(key)?;
            }
            debug!(collection = %self.desc.name, deleted = keys.len(), "deleted documents");
            self.applied = true;
        }
        let Some(row) = self.rows.get(self.position) else {
            return Ok(false);
        };
        self.current = row.clone();
        self.position += 1;
        Ok(true)
    }

    pub(crate) fn reset(&mut self) {
        self.rows.clear();
        self.position = 0;
        self.applied = false;
    }
}
