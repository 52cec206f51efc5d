use bson::{Bson, doc};

use crate::error::PlannerError;

/// Encode one stored field value.
pub(crate) fn encode_value(value: &Bson) -> Result<Vec<u8>, PlannerError> {
    Ok(bson::serialize_to_vec(&doc! { "v": value.clone() })?)
}

pub(crate) fn decode_value(bytes: &[u8]) -> Result<Bson, PlannerError> {
    let doc: bson::Document = bson::deserialize_from_slice(bytes)?;
    Ok(doc.get("v").cloned().unwrap_or(Bson::Null))
}
