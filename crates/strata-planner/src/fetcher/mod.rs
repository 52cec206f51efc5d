mod document;
mod heads;
mod versioned;

pub use document::DocumentFetcher;
pub use heads::HeadFetcher;
pub use versioned::VersionedFetcher;

use bson::Bson;

use crate::catalog::CollectionDescription;
use crate::error::PlannerError;
use crate::span::Spans;

/// One stored document as read from the data region, fields by name.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub key: String,
    pub fields: Vec<(String, Bson)>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetcherStats {
    pub doc_fetches: u64,
    pub field_fetches: u64,
}

/// Turns spans over a collection into a stream of stored documents.
pub trait Fetcher<'t> {
    /// Prepare for a collection. An empty `fields` reads every field.
    fn init(
        &mut self,
        desc: &CollectionDescription,
        fields: &[String],
        reverse: bool,
        show_deleted: bool,
    ) -> Result<(), PlannerError>;

    fn start(&mut self, spans: &Spans) -> Result<(), PlannerError>;

    fn fetch_next(&mut self) -> Result<Option<EncodedDocument>, PlannerError>;

    /// Release storage iterators. The fetcher can be started again.
    fn close(&mut self) -> Result<(), PlannerError>;

    fn stats(&self) -> FetcherStats;
}
