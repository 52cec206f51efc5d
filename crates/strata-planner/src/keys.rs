use std::fmt;

use strata_store::{Cid, prefix_end};

use crate::error::PlannerError;

/// Index id of the primary (document) index.
pub const PRIMARY_INDEX: &str = "1";
/// Field id under which composite (whole document) commits are tracked.
pub const COMPOSITE_FIELD: &str = "C";

const COLLECTION_PREFIX: &str = "/collection/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Value,
    Deleted,
}

impl InstanceType {
    fn as_str(self) -> &'static str {
        match self {
            InstanceType::Value => "v",
            InstanceType::Deleted => "d",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "v" => Some(InstanceType::Value),
            "d" => Some(InstanceType::Deleted),
            _ => None,
        }
    }
}

// ── DataStoreKey ────────────────────────────────────────────

/// Key of one stored field value.
///
/// Layout: `/{collection}/{index}/{doc}/{field}:{instance}`. Empty trailing
/// components are omitted, which makes a shorter key a prefix of every
/// key below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStoreKey {
    pub collection_id: String,
    pub index_id: String,
    pub doc_key: String,
    pub field: String,
    pub instance: Option<InstanceType>,
}

impl DataStoreKey {
    pub fn collection(collection_id: u32) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            index_id: PRIMARY_INDEX.to_string(),
            doc_key: String::new(),
            field: String::new(),
            instance: None,
        }
    }

    pub fn with_doc(mut self, doc_key: &str) -> Self {
        self.doc_key = doc_key.to_string();
        self
    }

    pub fn with_field(mut self, field: &str, instance: InstanceType) -> Self {
        self.field = field.to_string();
        self.instance = Some(instance);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Prefix covering every field of this key's document (or collection).
    pub fn prefix(&self) -> Vec<u8> {
        let mut prefix = self.bytes();
        prefix.push(b'/');
        prefix
    }

    pub fn prefix_end(&self) -> Vec<u8> {
        prefix_end(&self.prefix())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, PlannerError> {
        let malformed = || PlannerError::MalformedKey(String::from_utf8_lossy(bytes).into_owned());
        let s = std::str::from_utf8(bytes).map_err(|_| malformed())?;
        let mut parts = s.strip_prefix('/').ok_or_else(malformed)?.splitn(4, '/');
        let collection_id = parts.next().ok_or_else(malformed)?;
        let index_id = parts.next().ok_or_else(malformed)?;
        let doc_key = parts.next().ok_or_else(malformed)?;
        let field_part = parts.next().ok_or_else(malformed)?;
        let (field, instance) = field_part.rsplit_once(':').ok_or_else(malformed)?;
        let instance = InstanceType::parse(instance).ok_or_else(malformed)?;
        Ok(Self {
            collection_id: collection_id.to_string(),
            index_id: index_id.to_string(),
            doc_key: doc_key.to_string(),
            field: field.to_string(),
            instance: Some(instance),
        })
    }
}

impl fmt::Display for DataStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in [&self.collection_id, &self.index_id, &self.doc_key, &self.field] {
            if !part.is_empty() {
                write!(f, "/{part}")?;
            }
        }
        if let Some(instance) = self.instance {
            write!(f, ":{}", instance.as_str())?;
        }
        Ok(())
    }
}

// ── HeadStoreKey ────────────────────────────────────────────

/// Key of one head commit: `/{doc}/{field}/{cid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadStoreKey {
    pub doc_key: String,
    pub field: String,
    pub cid: Option<Cid>,
}

impl HeadStoreKey {
    pub fn new(doc_key: &str, field: &str) -> Self {
        Self {
            doc_key: doc_key.to_string(),
            field: field.to_string(),
            cid: None,
        }
    }

    pub fn with_cid(mut self, cid: Cid) -> Self {
        self.cid = Some(cid);
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Prefix covering every head of this document field.
    pub fn prefix(&self) -> Vec<u8> {
        format!("/{}/{}/", self.doc_key, self.field).into_bytes()
    }

    pub fn parse_cid(bytes: &[u8]) -> Result<Cid, PlannerError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| PlannerError::MalformedKey(String::from_utf8_lossy(bytes).into_owned()))?;
        let (_, cid) = s
            .rsplit_once('/')
            .ok_or_else(|| PlannerError::MalformedKey(s.to_string()))?;
        Ok(Cid::parse(cid)?)
    }
}

impl fmt::Display for HeadStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.doc_key, self.field)?;
        if let Some(cid) = &self.cid {
            write!(f, "/{cid}")?;
        }
        Ok(())
    }
}

/// System-region key of a collection description.
pub fn collection_key(name: &str) -> Vec<u8> {
    format!("{COLLECTION_PREFIX}{name}").into_bytes()
}

pub fn collection_prefix() -> &'static [u8] {
    COLLECTION_PREFIX.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_key_round_trip() {
        let key = DataStoreKey::collection(3)
            .with_doc("bae-1")
            .with_field("name", InstanceType::Value);
        assert_eq!(key.to_string(), "/3/1/bae-1/name:v");
        assert_eq!(DataStoreKey::parse(&key.bytes()).unwrap(), key);
    }

    #[test]
    fn doc_prefix_does_not_cover_longer_doc_keys() {
        let short = DataStoreKey::collection(1).with_doc("abc");
        let long = DataStoreKey::collection(1)
            .with_doc("abcd")
            .with_field("x", InstanceType::Value);
        let (start, end) = (short.prefix(), short.prefix_end());
        let k = long.bytes();
        assert!(!(k >= start && k < end));
    }

    #[test]
    fn malformed_data_keys_are_rejected() {
        assert!(DataStoreKey::parse(b"/1/1/doc").is_err());
        assert!(DataStoreKey::parse(b"/1/1/doc/field:x").is_err());
        assert!(DataStoreKey::parse(b"no-slash").is_err());
    }

    #[test]
    fn head_key_layout() {
        let cid = Cid::of(b"block");
        let key = HeadStoreKey::new("bae-1", COMPOSITE_FIELD).with_cid(cid.clone());
        assert_eq!(key.to_string(), format!("/bae-1/C/{cid}"));
        assert!(key.bytes().starts_with(&key.prefix()));
        assert_eq!(HeadStoreKey::parse_cid(&key.bytes()).unwrap(), cid);
    }
}
