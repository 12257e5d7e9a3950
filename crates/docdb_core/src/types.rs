//! Request and response payloads exchanged with a driver.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CollectionName, DatabaseName, DriverError};

fn parse_object(kind: &str, s: &str) -> Result<Map<String, Value>, DriverError> {
    match serde_json::from_str::<Value>(s) {
        Ok(v) => into_object(kind, v),
        Err(e) => Err(DriverError::invalid_argument(format!("{kind}: {e}"))),
    }
}

fn into_object(kind: &str, v: Value) -> Result<Map<String, Value>, DriverError> {
    match v {
        Value::Object(map) => Ok(map),
        other => Err(DriverError::invalid_argument(format!("{kind} must be a JSON object, got {other}"))),
    }
}

macro_rules! json_object_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Map<String, Value>);

        impl $name {
            pub fn parse(s: &str) -> Result<Self, DriverError> {
                parse_object($kind, s).map(Self)
            }

            pub fn from_value(v: Value) -> Result<Self, DriverError> {
                into_object($kind, v).map(Self)
            }

            pub fn as_map(&self) -> &Map<String, Value> {
                &self.0
            }

            pub fn into_map(self) -> Map<String, Value> {
                self.0
            }
        }

        impl From<Map<String, Value>> for $name {
            fn from(map: Map<String, Value>) -> Self {
                Self(map)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match serde_json::to_string(&self.0) {
                    Ok(s) => f.write_str(&s),
                    Err(_) => Err(std::fmt::Error),
                }
            }
        }
    };
}

json_object_newtype!(
    /// A JSON document stored in a collection
    Document,
    "document"
);
json_object_newtype!(
    /// JSON-schema collection definition: `title`, `properties`, `primary_key`
    Schema,
    "schema"
);
json_object_newtype!(
    /// Query filter; the empty object matches every document
    Filter,
    "filter"
);
json_object_newtype!(
    /// Mutation with `$set` and/or `$unset`
    Update,
    "update"
);
json_object_newtype!(
    /// Include-projection: `{"field": true}`
    Fields,
    "fields"
);

impl Document {
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DriverError> {
        let v = serde_json::to_value(value).map_err(|e| DriverError::invalid_argument(format!("document: {e}")))?;
        Self::from_value(v)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DriverError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| DriverError::invalid_argument(format!("document: {e}")))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }
}

// -----------------------
// Responses
// -----------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub status: String,
    /// One JSON-encoded primary key per inserted document, in input order
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceResponse {
    pub status: String,
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub status: String,
    pub modified_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub deleted_count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionInfo {
    pub name: CollectionName,
    pub schema: Schema,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseInfo {
    pub name: DatabaseName,
    pub collections: Vec<CollectionInfo>,
}

/// Result set of a read. Drivers may materialise it eagerly.
#[derive(Debug, Default)]
pub struct Documents {
    inner: std::vec::IntoIter<Document>,
}

impl Documents {
    pub fn new(docs: Vec<Document>) -> Self {
        Self { inner: docs.into_iter() }
    }
}

impl Iterator for Documents {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Documents {}
