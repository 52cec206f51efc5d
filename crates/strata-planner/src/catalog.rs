use serde::{Deserialize, Serialize};
use strata_store::{Cid, Datastore, PrefixQuery, Region};

use crate::error::PlannerError;
use crate::keys::{DataStoreKey, collection_key, collection_prefix};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub id: u32,
    pub name: String,
}

/// Stored description of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescription {
    pub id: u32,
    pub name: String,
    pub schema_version_id: String,
    pub fields: Vec<FieldDescription>,
}

impl CollectionDescription {
    pub fn field(&self, name: &str) -> Option<&FieldDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_id(&self, id: &str) -> Option<&FieldDescription> {
        let id: u32 = id.parse().ok()?;
        self.fields.iter().find(|f| f.id == id)
    }

    /// Key prefix of the primary index.
    pub fn data_key(&self) -> DataStoreKey {
        DataStoreKey::collection(self.id)
    }
}

pub struct Catalog;

impl Catalog {
    /// Create a collection with the given field names. Creating an existing
    /// collection returns its stored description unchanged.
    pub fn create_collection(
        ds: &dyn Datastore,
        name: &str,
        fields: &[&str],
    ) -> Result<CollectionDescription, PlannerError> {
        if let Some(existing) = Self::find_collection(ds, name)? {
            return Ok(existing);
        }
        let id = Self::list_collections(ds)?.len() as u32 + 1;
        let fields: Vec<FieldDescription> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| FieldDescription {
                id: i as u32 + 1,
                name: (*f).to_string(),
            })
            .collect();
        let schema = bson::serialize_to_vec(&bson::doc! {
            "name": name,
            "fields": fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        })?;
        let desc = CollectionDescription {
            id,
            name: name.to_string(),
            schema_version_id: Cid::of(&schema).to_string(),
            fields,
        };
        Self::save_collection(ds, &desc)?;
        Ok(desc)
    }

    pub fn save_collection(ds: &dyn Datastore, desc: &CollectionDescription) -> Result<(), PlannerError> {
        let value = bson::serialize_to_vec(desc)?;
        ds.put(Region::System, &collection_key(&desc.name), &value)?;
        Ok(())
    }

    pub fn load_collection(ds: &dyn Datastore, name: &str) -> Result<CollectionDescription, PlannerError> {
        Self::find_collection(ds, name)?.ok_or_else(|| PlannerError::CollectionNotFound(name.to_string()))
    }

    fn find_collection(ds: &dyn Datastore, name: &str) -> Result<Option<CollectionDescription>, PlannerError> {
        match ds.get(Region::System, &collection_key(name))? {
            Some(bytes) => Ok(Some(bson::deserialize_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_collections(ds: &dyn Datastore) -> Result<Vec<String>, PlannerError> {
        let prefix = collection_prefix();
        let mut names = Vec::new();
        for entry in ds.query(Region::System, &PrefixQuery::new(prefix))? {
            let (key, _) = entry?;
            if let Some(name) = key.strip_prefix(prefix) {
                if let Ok(s) = std::str::from_utf8(name) {
                    names.push(s.to_string());
                }
            }
        }
        Ok(names)
    }
}
