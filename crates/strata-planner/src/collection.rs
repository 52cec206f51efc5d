use bson::Bson;
use sha2::{Digest, Sha256};
use strata_store::{Cid, Datastore, PrefixQuery, Region};
use tracing::debug;

use crate::block::{Block, Link};
use crate::catalog::{CollectionDescription, FieldDescription};
use crate::encoding::{decode_value, encode_value};
use crate::error::PlannerError;
use crate::keys::{COMPOSITE_FIELD, DataStoreKey, HeadStoreKey, InstanceType};

/// Derive the key of a new document from its input.
pub fn doc_key_for(input: &bson::Document) -> Result<String, PlannerError> {
    let bytes = bson::serialize_to_vec(input)?;
    let digest = Sha256::digest(&bytes);
    let mut key = String::from("bae-");
    for b in &digest[..16] {
        key.push_str(&format!("{b:02x}"));
    }
    Ok(key)
}

/// Writes documents of one collection together with their commit history.
pub struct CollectionWriter<'t> {
    ds: &'t dyn Datastore,
    desc: &'t CollectionDescription,
}

impl<'t> CollectionWriter<'t> {
    pub fn new(ds: &'t dyn Datastore, desc: &'t CollectionDescription) -> Self {
        Self { ds, desc }
    }

    pub fn create(&self, input: &bson::Document) -> Result<String, PlannerError> {
        let doc_key = doc_key_for(input)?;
        let prefix = self.desc.data_key().with_doc(&doc_key).prefix();
        if self.ds.query(Region::Data, &PrefixQuery::new(prefix).limit(1))?.next().is_some() {
            return Err(PlannerError::DocumentExists(doc_key));
        }
        let values = self.resolve_fields(input)?;
        self.write_fields(&doc_key, &values, Bson::Document(input.clone()))?;
        debug!(collection = %self.desc.name, doc_key, "document created");
        Ok(doc_key)
    }

    pub fn update(&self, doc_key: &str, patch: &bson::Document) -> Result<(), PlannerError> {
        if self.live_keys(doc_key)?.is_empty() {
            return Err(PlannerError::DocumentNotFound(doc_key.to_string()));
        }
        let values = self.resolve_fields(patch)?;
        self.write_fields(doc_key, &values, Bson::Document(patch.clone()))?;
        debug!(collection = %self.desc.name, doc_key, "document updated");
        Ok(())
    }

    /// Move every value key of the document to its deleted instance and
    /// record the deletion in the composite history.
    pub fn delete(&self, doc_key: &str) -> Result<(), PlannerError> {
        let live = self.live_keys(doc_key)?;
        if live.is_empty() {
            return Err(PlannerError::DocumentNotFound(doc_key.to_string()));
        }
        for (key, value) in live {
            let deleted = DataStoreKey::parse(&key)?;
            let deleted = DataStoreKey {
                instance: Some(InstanceType::Deleted),
                ..deleted
            };
            self.ds.put(Region::Data, &deleted.bytes(), &value)?;
            self.ds.delete(Region::Data, &key)?;
        }
        self.append_composite(doc_key, Bson::Document(bson::doc! { "_deleted": true }), Vec::new())?;
        debug!(collection = %self.desc.name, doc_key, "document deleted");
        Ok(())
    }

    fn resolve_fields<'a>(
        &self,
        input: &'a bson::Document,
    ) -> Result<Vec<(&'t FieldDescription, &'a Bson)>, PlannerError> {
        input
            .iter()
            .map(|(name, value)| {
                self.desc
                    .field(name)
                    .map(|f| (f, value))
                    .ok_or_else(|| PlannerError::FieldNotFound(format!("{}.{name}", self.desc.name)))
            })
            .collect()
    }

    fn live_keys(&self, doc_key: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, PlannerError> {
        let prefix = self.desc.data_key().with_doc(doc_key).prefix();
        let mut out = Vec::new();
        for entry in self.ds.query(Region::Data, &PrefixQuery::new(prefix))? {
            let (key, value) = entry?;
            if key.ends_with(b":v") {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    fn write_fields(
        &self,
        doc_key: &str,
        values: &[(&FieldDescription, &Bson)],
        composite_data: Bson,
    ) -> Result<(), PlannerError> {
        let mut field_links = Vec::with_capacity(values.len());
        for (field, value) in values {
            let field_id = field.id.to_string();
            let key = self
                .desc
                .data_key()
                .with_doc(doc_key)
                .with_field(&field_id, InstanceType::Value);
            self.ds.put(Region::Data, &key.bytes(), &encode_value(value)?)?;

            let cid = self.append_block(doc_key, &field_id, &field.name, (*value).clone(), Vec::new())?;
            field_links.push(Link {
                name: field.name.clone(),
                cid,
            });
        }
        self.append_composite(doc_key, composite_data, field_links)
    }

    fn append_composite(&self, doc_key: &str, data: Bson, links: Vec<Link>) -> Result<(), PlannerError> {
        self.append_block(doc_key, COMPOSITE_FIELD, COMPOSITE_FIELD, data, links)?;
        Ok(())
    }

    /// Store a block above the current heads of `head_field` and make it
    /// the only head.
    fn append_block(
        &self,
        doc_key: &str,
        head_field: &str,
        field_name: &str,
        data: Bson,
        mut links: Vec<Link>,
    ) -> Result<Cid, PlannerError> {
        let heads = self.heads(doc_key, head_field)?;
        let priority = heads.iter().map(|(_, p)| *p).max().unwrap_or(0) + 1;
        links.extend(heads.iter().map(|(cid, _)| Link::head(cid.clone())));

        let block = Block {
            priority,
            schema_version_id: self.desc.schema_version_id.clone(),
            field_name: field_name.to_string(),
            doc_key: doc_key.to_string(),
            data,
            links,
        };
        let cid = self.ds.put_block(&block.encode()?)?;

        let head_key = HeadStoreKey::new(doc_key, head_field);
        for (old, _) in &heads {
            self.ds.delete(Region::Heads, &head_key.clone().with_cid(old.clone()).bytes())?;
        }
        self.ds.put(
            Region::Heads,
            &head_key.with_cid(cid.clone()).bytes(),
            &encode_value(&Bson::Int64(priority as i64))?,
        )?;
        Ok(cid)
    }

    fn heads(&self, doc_key: &str, field: &str) -> Result<Vec<(Cid, u64)>, PlannerError> {
        let prefix = HeadStoreKey::new(doc_key, field).prefix();
        let mut heads = Vec::new();
        for entry in self.ds.query(Region::Heads, &PrefixQuery::new(prefix))? {
            let (key, value) = entry?;
            let priority = match decode_value(&value)? {
                Bson::Int64(p) => p as u64,
                Bson::Int32(p) => p as u64,
                _ => 0,
            };
            heads.push((HeadStoreKey::parse_cid(&key)?, priority));
        }
        Ok(heads)
    }
}
