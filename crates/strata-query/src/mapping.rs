use std::collections::HashMap;

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::value::Value;

/// A slot to project into rendered output, and the key to render it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderKey {
    pub index: usize,
    pub key: String,
}

/// Slot that receives the type name, and the key it renders under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub index: usize,
    pub key: String,
}

/// Compiled per-query-shape layout of a [`Document`].
///
/// One logical name may own several slots (aliases). Child mappings are
/// indexed by the parent slot that holds the nested value. `next_index`
/// only ever grows, so every registered slot is below it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMapping {
    pub indexes_by_name: HashMap<String, Vec<usize>>,
    pub next_index: usize,
    pub child_mappings: Vec<Option<DocumentMapping>>,
    pub type_info: Option<TypeInfo>,
    pub render_keys: Vec<RenderKey>,
}

impl DocumentMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `index` as holding a value for `name`.
    pub fn add(&mut self, index: usize, name: &str) {
        self.indexes_by_name
            .entry(name.to_string())
            .or_default()
            .push(index);
        if index >= self.next_index {
            self.next_index = index + 1;
        }
    }

    /// Register `name` at the next free slot and return it.
    pub fn add_next(&mut self, name: &str) -> usize {
        let index = self.next_index;
        self.add(index, name);
        index
    }

    pub fn add_render(&mut self, index: usize, key: &str) {
        self.render_keys.push(RenderKey {
            index,
            key: key.to_string(),
        });
    }

    pub fn first_index_of_name(&self, name: &str) -> Option<usize> {
        self.indexes_by_name.get(name).and_then(|v| v.first().copied())
    }

    pub fn indexes_of_name(&self, name: &str) -> &[usize] {
        self.indexes_by_name
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_of_name<'d>(&self, doc: &'d Document, name: &str) -> Option<&'d Value> {
        self.first_index_of_name(name).map(|i| doc.get(i))
    }

    /// Set the first slot registered for `name`. Unmapped names are ignored.
    pub fn set_first_of_name(&self, doc: &mut Document, name: &str, value: impl Into<Value>) {
        if let Some(index) = self.first_index_of_name(name) {
            doc.set(index, value);
        }
    }

    pub fn new_doc(&self) -> Document {
        Document::with_len(self.next_index)
    }

    /// Same slot layout with nothing to render.
    pub fn clone_without_render(&self) -> Self {
        Self {
            indexes_by_name: self.indexes_by_name.clone(),
            next_index: self.next_index,
            child_mappings: self.child_mappings.clone(),
            type_info: None,
            render_keys: Vec::new(),
        }
    }

    pub fn set_type_name(&self, doc: &mut Document, name: &str) {
        if let Some(info) = &self.type_info {
            doc.set(info.index, name);
        }
    }

    pub fn set_child_at(&mut self, index: usize, child: DocumentMapping) {
        if index >= self.child_mappings.len() {
            self.child_mappings.resize(index + 1, None);
        }
        self.child_mappings[index] = Some(child);
    }

    pub fn child_at(&self, index: usize) -> Option<&DocumentMapping> {
        self.child_mappings.get(index).and_then(Option::as_ref)
    }

    pub fn try_find_name_from_index(&self, index: usize) -> Option<&str> {
        self.indexes_by_name
            .iter()
            .find(|(_, indexes)| indexes.contains(&index))
            .map(|(name, _)| name.as_str())
    }

    /// Render `doc` into a name-keyed document restricted to the render keys.
    pub fn to_map(&self, doc: &Document) -> bson::Document {
        let mut out = bson::Document::new();
        for rk in &self.render_keys {
            let rendered = match doc.get(rk.index) {
                Value::Null => Bson::Null,
                Value::Scalar(b) => b.clone(),
                Value::Object(child) => Bson::Document(self.render_child(rk.index, child)),
                Value::Objects(children) => Bson::Array(
                    children
                        .iter()
                        .filter(|c| !c.hidden)
                        .map(|c| Bson::Document(self.render_child(rk.index, c)))
                        .collect(),
                ),
            };
            out.insert(rk.key.clone(), rendered);
        }
        if let Some(info) = &self.type_info {
            let name = match doc.get(info.index) {
                Value::Scalar(b) => b.clone(),
                _ => Bson::Null,
            };
            out.insert(info.key.clone(), name);
        }
        out
    }

    fn render_child(&self, index: usize, child: &Document) -> bson::Document {
        match self.child_at(index) {
            Some(mapping) => mapping.to_map(child),
            None => bson::Document::new(),
        }
    }
}
