//! Collections of one database and the document operations on them.
//!
//! The same `Collections` value backs both the committed state of a database
//! and the private snapshot of a transaction.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use docdb_core::{
    CollectionInfo, CollectionName, DeleteResponse, Document, DriverError, Fields, Filter,
    InsertResponse, ReplaceResponse, Schema, Update, UpdateResponse,
};
use serde_json::{Map, Value};

use crate::query;
use crate::schema::{CompiledSchema, FieldType};

/// Ordered primary-key component
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Int(i128),
    Str(String),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key(Vec<KeyPart>);

#[derive(Clone, Debug)]
pub(crate) struct CollectionState {
    schema: CompiledSchema,
    docs: BTreeMap<Key, Document>,
    next_id: u64,
}

impl CollectionState {
    fn new(schema: CompiledSchema) -> Self {
        Self { schema, docs: BTreeMap::new(), next_id: 1 }
    }

    /// Fill auto-generated key fields that are absent, then extract the key.
    fn assign_key(&mut self, doc: &mut Map<String, Value>) -> Result<Key, DriverError> {
        let mut parts = Vec::with_capacity(self.schema.primary_key.len());
        for pk in &self.schema.primary_key {
            let missing = doc.get(&pk.name).map_or(true, Value::is_null);
            if missing {
                if !pk.auto_generate {
                    return Err(DriverError::invalid_argument(format!("document is missing primary key field {:?}", pk.name)));
                }
                let seq = self.next_id;
                self.next_id += 1;
                let generated = match self.schema.fields.get(&pk.name) {
                    Some(FieldType::Integer(_)) => Value::from(seq),
                    _ => Value::String(format!("{seq:024x}")),
                };
                doc.insert(pk.name.clone(), generated);
            }
            parts.push(key_part(&pk.name, doc.get(&pk.name))?);
        }
        Ok(Key(parts))
    }

    fn key_json(&self, doc: &Map<String, Value>) -> String {
        let mut key = Map::new();
        for pk in &self.schema.primary_key {
            if let Some(v) = doc.get(&pk.name) {
                key.insert(pk.name.clone(), v.clone());
            }
        }
        Value::Object(key).to_string()
    }

    /// Validate and key a batch without touching stored documents.
    fn prepare(&mut self, docs: &[Document]) -> Result<Vec<(Key, Document)>, DriverError> {
        let mut prepared = Vec::with_capacity(docs.len());
        for doc in docs {
            let mut map = doc.as_map().clone();
            let key = self.assign_key(&mut map)?;
            self.schema.validate(&map)?;
            prepared.push((key, Document::from(map)));
        }
        Ok(prepared)
    }

    fn matching_keys(&self, filter: &Filter) -> Result<Vec<Key>, DriverError> {
        let mut keys = Vec::new();
        for (key, doc) in &self.docs {
            if query::matches(filter.as_map(), doc.as_map())? {
                keys.push(key.clone());
            }
        }
        Ok(keys)
    }
}

fn key_part(field: &str, value: Option<&Value>) -> Result<KeyPart, DriverError> {
    match value {
        Some(Value::String(s)) => Ok(KeyPart::Str(s.clone())),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .map(KeyPart::Int)
            .ok_or_else(|| DriverError::invalid_argument(format!("primary key field {field:?} must be an integer, got {n}"))),
        Some(other) => Err(DriverError::invalid_argument(format!("primary key field {field:?} has unsupported value {other}"))),
        None => Err(DriverError::invalid_argument(format!("document is missing primary key field {field:?}"))),
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Collections(BTreeMap<CollectionName, CollectionState>);

impl Collections {
    fn get(&self, name: &str) -> Result<&CollectionState, DriverError> {
        let key = CollectionName::try_from(name)?;
        self.0
            .get(&key)
            .ok_or_else(|| DriverError::not_found(format!("collection {name:?} does not exist")))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut CollectionState, DriverError> {
        let key = CollectionName::try_from(name)?;
        self.0
            .get_mut(&key)
            .ok_or_else(|| DriverError::not_found(format!("collection {name:?} does not exist")))
    }

    pub fn describe(&self, name: &str) -> Result<CollectionInfo, DriverError> {
        let coll = self.get(name)?;
        let name = CollectionName::try_from(name)?;
        Ok(CollectionInfo { name, schema: coll.schema.source.clone() })
    }

    pub fn describe_all(&self) -> Vec<CollectionInfo> {
        self.0
            .iter()
            .map(|(name, c)| CollectionInfo { name: name.clone(), schema: c.schema.source.clone() })
            .collect()
    }

    /// Returns true when the collection was created rather than updated.
    pub fn create_or_update(&mut self, name: &str, schema: &Schema) -> Result<bool, DriverError> {
        let key = CollectionName::try_from(name)?;
        let compiled = CompiledSchema::compile(name, schema)?;
        match self.0.get_mut(&key) {
            Some(existing) => {
                if existing.schema.primary_key != compiled.primary_key {
                    return Err(DriverError::invalid_argument(format!("primary key of collection {name:?} cannot change")));
                }
                existing.schema = compiled;
                Ok(false)
            }
            None => {
                self.0.insert(key, CollectionState::new(compiled));
                Ok(true)
            }
        }
    }

    pub fn drop_collection(&mut self, name: &str) -> Result<(), DriverError> {
        let key = CollectionName::try_from(name)?;
        match self.0.remove(&key) {
            Some(_) => Ok(()),
            None => Err(DriverError::not_found(format!("collection {name:?} does not exist"))),
        }
    }

    pub fn list(&self) -> Vec<CollectionName> {
        self.0.keys().cloned().collect()
    }

    /// All-or-nothing: a duplicate key anywhere in the batch rejects the batch.
    pub fn insert(&mut self, name: &str, docs: &[Document]) -> Result<InsertResponse, DriverError> {
        let coll = self.get_mut(name)?;
        let saved_next_id = coll.next_id;
        let prepared = match coll.prepare(docs) {
            Ok(p) => p,
            Err(e) => {
                coll.next_id = saved_next_id;
                return Err(e);
            }
        };
        for (i, (key, doc)) in prepared.iter().enumerate() {
            let dup_in_batch = prepared[..i].iter().any(|(k, _)| k == key);
            if dup_in_batch || coll.docs.contains_key(key) {
                coll.next_id = saved_next_id;
                return Err(DriverError::already_exists(format!("duplicate key {}", coll.key_json(doc.as_map()))));
            }
        }
        let mut keys = Vec::with_capacity(prepared.len());
        for (key, doc) in prepared {
            keys.push(coll.key_json(doc.as_map()));
            coll.docs.insert(key, doc);
        }
        Ok(InsertResponse { status: "inserted".to_string(), keys })
    }

    /// Insert or overwrite by primary key.
    pub fn replace(&mut self, name: &str, docs: &[Document]) -> Result<ReplaceResponse, DriverError> {
        let coll = self.get_mut(name)?;
        let saved_next_id = coll.next_id;
        let prepared = match coll.prepare(docs) {
            Ok(p) => p,
            Err(e) => {
                coll.next_id = saved_next_id;
                return Err(e);
            }
        };
        let mut keys = Vec::with_capacity(prepared.len());
        for (key, doc) in prepared {
            keys.push(coll.key_json(doc.as_map()));
            coll.docs.insert(key, doc);
        }
        Ok(ReplaceResponse { status: "replaced".to_string(), keys })
    }

    pub fn read(&self, name: &str, filter: &Filter, fields: Option<&Fields>) -> Result<Vec<Document>, DriverError> {
        let coll = self.get(name)?;
        let mut out = Vec::new();
        for doc in coll.docs.values() {
            if !query::matches(filter.as_map(), doc.as_map())? {
                continue;
            }
            match fields {
                Some(f) => out.push(Document::from(query::project(doc.as_map(), f.as_map(), &coll.schema)?)),
                None => out.push(doc.clone()),
            }
        }
        Ok(out)
    }

    pub fn update(&mut self, name: &str, filter: &Filter, update: &Update) -> Result<UpdateResponse, DriverError> {
        let coll = self.get_mut(name)?;
        let keys = coll.matching_keys(filter)?;
        let mut changed = Vec::new();
        for key in keys {
            let Some(current) = coll.docs.get(&key) else { continue };
            let mut next = current.as_map().clone();
            query::apply_update(&mut next, update.as_map(), &coll.schema)?;
            coll.schema.validate(&next)?;
            if &next != current.as_map() {
                changed.push((key, Document::from(next)));
            }
        }
        let modified_count = changed.len() as u64;
        for (key, doc) in changed {
            coll.docs.insert(key, doc);
        }
        Ok(UpdateResponse { status: "updated".to_string(), modified_count })
    }

    pub fn delete(&mut self, name: &str, filter: &Filter) -> Result<DeleteResponse, DriverError> {
        let coll = self.get_mut(name)?;
        let keys = coll.matching_keys(filter)?;
        for key in &keys {
            coll.docs.remove(key);
        }
        Ok(DeleteResponse { status: "deleted".to_string(), deleted_count: keys.len() as u64 })
    }
}
