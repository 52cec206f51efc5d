use serde::{Deserialize, Serialize};

use crate::value::Value;

static NULL: Value = Value::Null;

/// Fixed-length, slot-addressed record.
///
/// `hidden` marks a row that is still present for aggregates but is
/// suppressed when rendered inside a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Value>,
    pub hidden: bool,
}

impl Document {
    pub fn with_len(len: usize) -> Self {
        Self {
            fields: vec![Value::Null; len],
            hidden: false,
        }
    }

    /// Value at `index`, `Null` when out of range.
    pub fn get(&self, index: usize) -> &Value {
        self.fields.get(index).unwrap_or(&NULL)
    }

    /// Store `value` at `index`, growing the slot list when needed.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) {
        if index >= self.fields.len() {
            self.fields.resize(index + 1, Value::Null);
        }
        self.fields[index] = value.into();
    }

    /// Overwrite this document's slots with every non-null slot of `other`.
    pub fn merge_from(&mut self, other: &Document) {
        for (index, value) in other.fields.iter().enumerate() {
            if !value.is_null() {
                self.set(index, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_are_null() {
        let doc = Document::with_len(2);
        assert!(doc.get(5).is_null());
    }

    #[test]
    fn set_grows_slots() {
        let mut doc = Document::default();
        doc.set(3, "x");
        assert_eq!(doc.fields.len(), 4);
        assert_eq!(doc.get(3).as_str(), Some("x"));
    }

    #[test]
    fn clone_is_deep() {
        let mut child = Document::with_len(1);
        child.set(0, "inner");
        let mut doc = Document::with_len(2);
        doc.set(0, child.clone());
        doc.set(1, vec![child]);

        let mut copy = doc.clone();
        if let Value::Object(inner) = &mut copy.fields[0] {
            inner.set(0, "changed");
        }
        if let Some(list) = copy.fields[1].as_objects_mut() {
            list[0].hidden = true;
        }

        assert_eq!(doc.get(0).as_object().unwrap().get(0).as_str(), Some("inner"));
        assert!(!doc.get(1).as_objects().unwrap()[0].hidden);
    }

    #[test]
    fn merge_keeps_existing_slots_for_null_sources() {
        let mut base = Document::with_len(3);
        base.set(0, "key");
        let mut other = Document::with_len(3);
        other.set(2, 7i64);
        base.merge_from(&other);
        assert_eq!(base.get(0).as_str(), Some("key"));
        assert_eq!(base.get(2), &Value::from(7i64));
    }
}
