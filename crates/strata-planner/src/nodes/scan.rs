use strata_query::{DELETED_FIELD, Document, DocumentMapping, KEY_FIELD, Value};
use tracing::trace;

use crate::catalog::CollectionDescription;
use crate::error::PlannerError;
use crate::fetcher::{EncodedDocument, Fetcher, FetcherStats};
use crate::filter::Filter;
use crate::span::{Span, Spans};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub filter_matches: u64,
    pub fetcher: FetcherStats,
}

/// Leaf that pulls stored documents through a fetcher and applies the
/// pushed-down filter.
pub struct ScanNode<'t> {
    pub(crate) desc: CollectionDescription,
    pub(crate) mapping: DocumentMapping,
    pub(crate) fields: Vec<String>,
    pub(crate) spans: Spans,
    pub(crate) filter: Option<Filter>,
    pub(crate) reverse: bool,
    pub(crate) show_deleted: bool,
    /// Commit the document is read at, when this is a history read.
    pub(crate) commit: Option<String>,
    fetcher: Box<dyn Fetcher<'t> + 't>,
    done: bool,
    filter_matches: u64,
    pub(crate) current: Document,
}

impl<'t> ScanNode<'t> {
    pub(crate) fn new(
        desc: CollectionDescription,
        mapping: DocumentMapping,
        fetcher: Box<dyn Fetcher<'t> + 't>,
    ) -> Self {
        let fields = desc
            .fields
            .iter()
            .filter(|f| mapping.first_index_of_name(&f.name).is_some())
            .map(|f| f.name.clone())
            .collect();
        let spans = Spans::single(Span::new(desc.data_key().prefix(), desc.data_key().prefix_end()));
        Self {
            desc,
            mapping,
            fields,
            spans,
            filter: None,
            reverse: false,
            show_deleted: false,
            commit: None,
            fetcher,
            done: false,
            filter_matches: 0,
            current: Document::default(),
        }
    }

    pub(crate) fn narrow_to_keys(&mut self, keys: &[String]) {
        let base = self.desc.data_key();
        self.spans = keys
            .iter()
            .map(|k| {
                let doc = base.clone().with_doc(k);
                Span::new(doc.prefix(), doc.prefix_end())
            })
            .collect();
    }

    pub(crate) fn init(&mut self) -> Result<(), PlannerError> {
        self.fetcher
            .init(&self.desc, &self.fields, self.reverse, self.show_deleted)?;
        self.fetcher.start(&self.spans)?;
        self.done = false;
        Ok(())
    }

    pub(crate) fn next(&mut self) -> Result<bool, PlannerError> {
        if self.done {
            return Ok(false);
        }
        loop {
            let Some(encoded) = self.fetcher.fetch_next()? else {
                self.done = true;
                return Ok(false);
            };
            let doc = self.decode(encoded);
            if self.filter.as_ref().is_none_or(|f| f.matches(&doc)) {
                self.filter_matches += 1;
                trace!(collection = %self.desc.name, "scan matched document");
                self.current = doc;
                return Ok(true);
            }
        }
    }

    fn decode(&self, encoded: EncodedDocument) -> Document {
        let mut doc = self.mapping.new_doc();
        for &index in self.mapping.indexes_of_name(KEY_FIELD) {
            doc.set(index, encoded.key.as_str());
        }
        for &index in self.mapping.indexes_of_name(DELETED_FIELD) {
            doc.set(index, encoded.deleted);
        }
        for (name, value) in encoded.fields {
            let indexes = self.mapping.indexes_of_name(&name);
            for &index in indexes {
                doc.set(index, Value::from(value.clone()));
            }
        }
        doc
    }

    pub(crate) fn close(&mut self) -> Result<(), PlannerError> {
        self.done = true;
        self.fetcher.close()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            filter_matches: self.filter_matches,
            fetcher: self.fetcher.stats(),
        }
    }
}
