use bson::{Bson, doc};
use strata_store::Cid;

use crate::error::PlannerError;

/// Link name pointing at the previous head of the same field.
pub const HEAD_LINK: &str = "_head";

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub cid: Cid,
}

impl Link {
    pub fn head(cid: Cid) -> Self {
        Self {
            name: HEAD_LINK.to_string(),
            cid,
        }
    }
}

/// Decoded commit block: a delta envelope plus its parent links.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub priority: u64,
    pub schema_version_id: String,
    pub field_name: String,
    pub doc_key: String,
    pub data: Bson,
    pub links: Vec<Link>,
}

impl Block {
    pub fn encode(&self) -> Result<Vec<u8>, PlannerError> {
        let links: Vec<Bson> = self
            .links
            .iter()
            .map(|l| Bson::Document(doc! { "name": l.name.as_str(), "cid": l.cid.as_str() }))
            .collect();
        let envelope = doc! {
            "priority": self.priority as i64,
            "schema_version_id": self.schema_version_id.as_str(),
            "field_name": self.field_name.as_str(),
            "doc_key": self.doc_key.as_str(),
            "data": self.data.clone(),
            "links": links,
        };
        Ok(bson::serialize_to_vec(&envelope)?)
    }

    /// Decode and validate a stored block.
    pub fn decode(cid: &Cid, bytes: &[u8]) -> Result<Self, PlannerError> {
        let malformed = |reason: &str| PlannerError::MalformedBlock {
            cid: cid.to_string(),
            reason: reason.to_string(),
        };
        let envelope: bson::Document =
            bson::deserialize_from_slice(bytes).map_err(|e| malformed(&e.to_string()))?;

        let priority = match envelope.get("priority") {
            Some(Bson::Int64(p)) if *p > 0 => *p as u64,
            Some(Bson::Int32(p)) if *p > 0 => *p as u64,
            Some(_) => return Err(malformed("invalid priority")),
            None => return Err(malformed("missing priority")),
        };
        let text = |key: &str, what: &str| match envelope.get(key) {
            Some(Bson::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(malformed(&format!("missing {what}"))),
        };
        let schema_version_id = text("schema_version_id", "schema version")?;
        let field_name = text("field_name", "field name")?;
        let doc_key = text("doc_key", "document key")?;
        let data = envelope.get("data").cloned().unwrap_or(Bson::Null);

        let mut links = Vec::new();
        match envelope.get("links") {
            Some(Bson::Array(items)) => {
                for item in items {
                    let Bson::Document(link) = item else {
                        return Err(malformed("link is not a document"));
                    };
                    let (Some(Bson::String(name)), Some(Bson::String(target))) =
                        (link.get("name"), link.get("cid"))
                    else {
                        return Err(malformed("incomplete link"));
                    };
                    let target = Cid::parse(target).map_err(|e| malformed(&e.to_string()))?;
                    links.push(Link {
                        name: name.clone(),
                        cid: target,
                    });
                }
            }
            None => {}
            Some(_) => return Err(malformed("links is not an array")),
        }

        Ok(Self {
            priority,
            schema_version_id,
            field_name,
            doc_key,
            data,
            links,
        })
    }

    pub fn head_links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.name == HEAD_LINK)
    }
}
