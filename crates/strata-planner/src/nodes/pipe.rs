use strata_query::Document;

use crate::error::PlannerError;
use crate::plan::{Arena, CacheId};

/// One reader of a shared row cache.
pub struct PipeNode {
    pub(crate) cache: CacheId,
    cursor: usize,
    pub(crate) current: Document,
}

impl PipeNode {
    pub(crate) fn new(cache: CacheId) -> Self {
        Self {
            cache,
            cursor: 0,
            current: Document::default(),
        }
    }

    /// Rewind this reader. The shared source is only initialized by the
    /// first reader after the cache was created or reset.
    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.cursor = 0;
        let cache = arena.cache_mut(self.cache)?;
        if cache.initialized {
            return Ok(());
        }
        cache.initialized = true;
        cache.closed = false;
        let source = cache.source;
        arena.init(source)?;
        arena.start(source)
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        let cache = arena.cache(self.cache)?;
        if let Some(row) = cache.rows.get(self.cursor) {
            self.current = row.clone();
            self.cursor += 1;
            return Ok(true);
        }
        if cache.exhausted {
            return Ok(false);
        }
        let source = cache.source;
        if !arena.next(source)? {
            arena.cache_mut(self.cache)?.exhausted = true;
            return Ok(false);
        }
        let row = arena.value(source)?.clone();
        arena.cache_mut(self.cache)?.rows.push(row.clone());
        self.current = row;
        self.cursor += 1;
        Ok(true)
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }
}
