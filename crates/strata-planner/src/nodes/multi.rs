use strata_query::Document;

use crate::error::PlannerError;
use crate::plan::{Arena, NodeId};

/// Serves one source to `readers` consumers. The source only advances on
/// the first of every `readers` calls; the others see the same row.
pub struct MultiScanNode {
    pub(crate) source: NodeId,
    pub(crate) readers: usize,
    next_calls: usize,
    init_calls: usize,
    start_calls: usize,
    last: bool,
    pub(crate) current: Document,
}

impl MultiScanNode {
    pub(crate) fn new(source: NodeId, readers: usize) -> Self {
        Self {
            source,
            readers: readers.max(1),
            next_calls: 0,
            init_calls: 0,
            start_calls: 0,
            last: false,
            current: Document::default(),
        }
    }

    /// Advance a round-robin counter; true when this call is the first of a round.
    fn gate(counter: &mut usize, readers: usize) -> bool {
        let first = *counter == 0;
        *counter += 1;
        if *counter >= readers {
            *counter = 0;
        }
        first
    }

    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        if Self::gate(&mut self.init_calls, self.readers) {
            self.next_calls = 0;
            self.last = false;
            arena.init(self.source)?;
        }
        Ok(())
    }

    pub(crate) fn start(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        if Self::gate(&mut self.start_calls, self.readers) {
            arena.start(self.source)?;
        }
        Ok(())
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        if Self::gate(&mut self.next_calls, self.readers) {
            self.last = arena.next(self.source)?;
            if self.last {
                self.current = arena.value(self.source)?.clone();
            }
        }
        Ok(self.last)
    }
}

/// Runs several joins over the same parent row and merges their results.
pub struct ParallelNode {
    pub(crate) children: Vec<NodeId>,
    pub(crate) current: Document,
}

impl ParallelNode {
    pub(crate) fn init(&mut self, arena: &mut Arena<'_>) -> Result<(), PlannerError> {
        self.children.iter().try_for_each(|c| arena.init(*c))
    }

    pub(crate) fn next(&mut self, arena: &mut Arena<'_>) -> Result<bool, PlannerError> {
        let mut merged: Option<Document> = None;
        for &child in &self.children {
            if !arena.next(child)? {
                return Ok(false);
            }
            let value = arena.value(child)?;
            match &mut merged {
                Some(doc) => doc.merge_from(value),
                None => merged = Some(value.clone()),
            }
        }
        match merged {
            Some(doc) => {
                self.current = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
