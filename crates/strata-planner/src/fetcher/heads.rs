use strata_store::{Cid, Datastore, KvIter, PrefixQuery, Region};

use crate::error::PlannerError;
use crate::keys::HeadStoreKey;

/// Yields the current head commits of one document field.
pub struct HeadFetcher<'t> {
    ds: &'t dyn Datastore,
    iter: Option<KvIter<'t>>,
}

impl<'t> HeadFetcher<'t> {
    pub fn new(ds: &'t dyn Datastore) -> Self {
        Self { ds, iter: None }
    }

    pub fn start(&mut self, key: &HeadStoreKey) -> Result<(), PlannerError> {
        self.iter = Some(self.ds.query(Region::Heads, &PrefixQuery::new(key.prefix()))?);
        Ok(())
    }

    pub fn fetch_next(&mut self) -> Result<Option<Cid>, PlannerError> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(None);
        };
        match iter.next() {
            Some(entry) => {
                let (key, _) = entry?;
                Ok(Some(HeadStoreKey::parse_cid(&key)?))
            }
            None => {
                self.iter = None;
                Ok(None)
            }
        }
    }

    pub fn close(&mut self) {
        self.iter = None;
    }
}
