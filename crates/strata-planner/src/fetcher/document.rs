use std::collections::{HashSet, VecDeque};

use strata_store::{Datastore, KvIter, Region};
use tracing::trace;

use super::{EncodedDocument, Fetcher, FetcherStats};
use crate::catalog::CollectionDescription;
use crate::encoding::decode_value;
use crate::error::PlannerError;
use crate::keys::{DataStoreKey, InstanceType};
use crate::span::{Span, Spans};

/// Reads the primary index span by span, grouping consecutive field keys
/// of one document into a record.
pub struct DocumentFetcher<'t> {
    ds: &'t dyn Datastore,
    desc: Option<CollectionDescription>,
    wanted: Option<HashSet<u32>>,
    reverse: bool,
    show_deleted: bool,
    spans: VecDeque<Span>,
    iter: Option<KvIter<'t>>,
    peeked: Option<(DataStoreKey, Vec<u8>)>,
    stats: FetcherStats,
}

impl<'t> DocumentFetcher<'t> {
    pub fn new(ds: &'t dyn Datastore) -> Self {
        Self {
            ds,
            desc: None,
            wanted: None,
            reverse: false,
            show_deleted: false,
            spans: VecDeque::new(),
            iter: None,
            peeked: None,
            stats: FetcherStats::default(),
        }
    }

    fn next_kv(&mut self) -> Result<Option<(DataStoreKey, Vec<u8>)>, PlannerError> {
        if let Some(kv) = self.peeked.take() {
            return Ok(Some(kv));
        }
        loop {
            if self.iter.is_none() {
                let next = if self.reverse {
                    self.spans.pop_back()
                } else {
                    self.spans.pop_front()
                };
                let Some(span) = next else {
                    return Ok(None);
                };
                self.iter = Some(self.ds.range(Region::Data, &span.start, &span.end, self.reverse)?);
            }
            let Some(iter) = self.iter.as_mut() else {
                continue;
            };
            match iter.next() {
                Some(entry) => {
                    let (key, value) = entry?;
                    return Ok(Some((DataStoreKey::parse(&key)?, value)));
                }
                None => self.iter = None,
            }
        }
    }

    fn add_field(
        &mut self,
        doc: &mut EncodedDocument,
        key: DataStoreKey,
        value: &[u8],
    ) -> Result<(), PlannerError> {
        if key.instance == Some(InstanceType::Deleted) {
            doc.deleted = true;
        }
        let Some(desc) = &self.desc else {
            return Err(PlannerError::Unwired("document fetcher"));
        };
        let Some(field) = desc.field_by_id(&key.field) else {
            return Ok(());
        };
        if self.wanted.as_ref().is_some_and(|w| !w.contains(&field.id)) {
            return Ok(());
        }
        let name = field.name.clone();
        doc.fields.push((name, decode_value(value)?));
        self.stats.field_fetches += 1;
        Ok(())
    }
}

impl<'t> Fetcher<'t> for DocumentFetcher<'t> {
    fn init(
        &mut self,
        desc: &CollectionDescription,
        fields: &[String],
        reverse: bool,
        show_deleted: bool,
    ) -> Result<(), PlannerError> {
        self.wanted = if fields.is_empty() {
            None
        } else {
            Some(fields.iter().filter_map(|f| desc.field(f)).map(|f| f.id).collect())
        };
        self.desc = Some(desc.clone());
        self.reverse = reverse;
        self.show_deleted = show_deleted;
        Ok(())
    }

    fn start(&mut self, spans: &Spans) -> Result<(), PlannerError> {
        self.spans = spans.iter().cloned().collect();
        self.iter = None;
        self.peeked = None;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<EncodedDocument>, PlannerError> {
        loop {
            let Some((key, value)) = self.next_kv()? else {
                return Ok(None);
            };
            let mut doc = EncodedDocument {
                key: key.doc_key.clone(),
                fields: Vec::new(),
                deleted: false,
            };
            self.add_field(&mut doc, key, &value)?;
            loop {
                match self.next_kv()? {
                    Some((key, value)) if key.doc_key == doc.key => self.add_field(&mut doc, key, &value)?,
                    Some(other) => {
                        self.peeked = Some(other);
                        break;
                    }
                    None => break,
                }
            }
            self.stats.doc_fetches += 1;
            trace!(doc_key = %doc.key, fields = doc.fields.len(), deleted = doc.deleted, "fetched document");
            if doc.deleted && !self.show_deleted {
                continue;
            }
            return Ok(Some(doc));
        }
    }

    fn close(&mut self) -> Result<(), PlannerError> {
        self.iter = None;
        self.peeked = None;
        self.spans.clear();
        Ok(())
    }

    fn stats(&self) -> FetcherStats {
        self.stats
    }
}
