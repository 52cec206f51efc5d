use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// A slot value: a scalar, one nested document, or a list of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Scalar(Bson),
    Object(Document),
    Objects(Vec<Document>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Scalar(Bson::Null))
    }

    pub fn as_scalar(&self) -> Option<&Bson> {
        match self {
            Value::Scalar(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Bson::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Document> {
        match self {
            Value::Object(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&[Document]> {
        match self {
            Value::Objects(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_objects_mut(&mut self) -> Option<&mut Vec<Document>> {
        match self {
            Value::Objects(d) => Some(d),
            _ => None,
        }
    }
}

impl From<Bson> for Value {
    fn from(b: Bson) -> Self {
        Value::Scalar(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Bson::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Bson::String(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(Bson::Int64(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Scalar(Bson::Double(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Bson::Boolean(b))
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Object(d)
    }
}

impl From<Vec<Document>> for Value {
    fn from(d: Vec<Document>) -> Self {
        Value::Objects(d)
    }
}
