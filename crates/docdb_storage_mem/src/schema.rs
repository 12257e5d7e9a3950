//! JSON-schema subset: compile a collection schema once, validate documents against it.

use std::collections::BTreeMap;

use docdb_core::bytes::base64_decode;
use docdb_core::{DriverError, Schema};
use serde_json::{Map, Value};

pub(crate) const DEFAULT_PRIMARY_KEY: &str = "_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StrFormat {
    Plain,
    Byte,
    Uuid,
    DateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IntFormat {
    Any,
    Int32,
    Int64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FieldType {
    String(StrFormat),
    Number,
    Integer(IntFormat),
    Boolean,
    /// `None` accepts items of any type
    Array(Option<Box<FieldType>>),
    /// `None` is a free-form object
    Object(Option<BTreeMap<String, FieldType>>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PrimaryKeyField {
    pub name: String,
    pub auto_generate: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct CompiledSchema {
    pub fields: BTreeMap<String, FieldType>,
    pub primary_key: Vec<PrimaryKeyField>,
    /// Schema as supplied (plus the implicit `_id` when one was added)
    pub source: Schema,
}

fn bad(msg: impl Into<String>) -> DriverError {
    DriverError::invalid_argument(msg)
}

impl CompiledSchema {
    pub fn compile(collection: &str, schema: &Schema) -> Result<Self, DriverError> {
        let root = schema.as_map();
        if let Some(title) = root.get("title") {
            match title.as_str() {
                Some(t) if t == collection => {}
                _ => return Err(bad(format!("schema title {title} does not match collection {collection:?}"))),
            }
        }
        let properties = match root.get("properties") {
            Some(Value::Object(p)) => p,
            Some(_) => return Err(bad("schema properties must be an object")),
            None => return Err(bad("schema is missing properties")),
        };
        let mut fields = compile_properties("", properties)?;
        let mut source = schema.clone().into_map();

        let primary_key = match root.get("primary_key") {
            Some(Value::Array(names)) if !names.is_empty() => {
                let mut pk = Vec::with_capacity(names.len());
                for n in names {
                    let name = n.as_str().ok_or_else(|| bad("primary_key entries must be strings"))?;
                    let field = fields
                        .get(name)
                        .ok_or_else(|| bad(format!("primary key field {name:?} is not a declared property")))?;
                    if !matches!(field, FieldType::String(_) | FieldType::Integer(_)) {
                        return Err(bad(format!("primary key field {name:?} must be a string or integer")));
                    }
                    if pk.iter().any(|f: &PrimaryKeyField| f.name == name) {
                        return Err(bad(format!("primary key field {name:?} listed twice")));
                    }
                    let auto_generate = properties
                        .get(name)
                        .and_then(|p| p.get("autoGenerate"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    pk.push(PrimaryKeyField { name: name.to_string(), auto_generate });
                }
                pk
            }
            Some(Value::Array(_)) => return Err(bad("primary_key must not be empty")),
            Some(_) => return Err(bad("primary_key must be an array")),
            None => {
                if fields.contains_key(DEFAULT_PRIMARY_KEY) {
                    if !matches!(fields.get(DEFAULT_PRIMARY_KEY), Some(FieldType::String(_) | FieldType::Integer(_))) {
                        return Err(bad(format!("implicit primary key {DEFAULT_PRIMARY_KEY:?} must be a string or integer")));
                    }
                } else {
                    fields.insert(DEFAULT_PRIMARY_KEY.to_string(), FieldType::String(StrFormat::Plain));
                    if let Some(Value::Object(props)) = source.get_mut("properties") {
                        props.insert(
                            DEFAULT_PRIMARY_KEY.to_string(),
                            serde_json::json!({ "type": "string", "autoGenerate": true }),
                        );
                    }
                }
                source.insert("primary_key".to_string(), serde_json::json!([DEFAULT_PRIMARY_KEY]));
                vec![PrimaryKeyField { name: DEFAULT_PRIMARY_KEY.to_string(), auto_generate: true }]
            }
        };

        Ok(Self { fields, primary_key, source: Schema::from(source) })
    }

    /// Check every field of `doc`; undeclared fields are rejected.
    pub fn validate(&self, doc: &Map<String, Value>) -> Result<(), DriverError> {
        validate_object("", &self.fields, doc)
    }

    pub fn is_primary_key(&self, field: &str) -> bool {
        self.primary_key.iter().any(|f| f.name == field)
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") }
}

fn compile_properties(prefix: &str, props: &Map<String, Value>) -> Result<BTreeMap<String, FieldType>, DriverError> {
    let mut out = BTreeMap::new();
    for (name, def) in props {
        if name.is_empty() || name.contains('.') || name.starts_with('$') {
            return Err(bad(format!("invalid field name {:?}", join(prefix, name))));
        }
        out.insert(name.clone(), compile_field(&join(prefix, name), def)?);
    }
    Ok(out)
}

fn compile_field(path: &str, def: &Value) -> Result<FieldType, DriverError> {
    let def = def.as_object().ok_or_else(|| bad(format!("definition of {path:?} must be an object")))?;
    let ty = def
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| bad(format!("field {path:?} has no type")))?;
    let format = def.get("format").and_then(Value::as_str);
    let field = match ty {
        "string" => FieldType::String(match format {
            None => StrFormat::Plain,
            Some("byte") => StrFormat::Byte,
            Some("uuid") => StrFormat::Uuid,
            Some("date-time") => StrFormat::DateTime,
            Some(other) => return Err(bad(format!("unsupported string format {other:?} for {path:?}"))),
        }),
        "integer" => FieldType::Integer(match format {
            None => IntFormat::Any,
            Some("int32") => IntFormat::Int32,
            Some("int64") => IntFormat::Int64,
            Some(other) => return Err(bad(format!("unsupported integer format {other:?} for {path:?}"))),
        }),
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "array" => match def.get("items") {
            Some(items) => FieldType::Array(Some(Box::new(compile_field(&format!("{path}[]"), items)?))),
            None => FieldType::Array(None),
        },
        "object" => match def.get("properties") {
            Some(Value::Object(p)) => FieldType::Object(Some(compile_properties(path, p)?)),
            Some(_) => return Err(bad(format!("properties of {path:?} must be an object"))),
            None => FieldType::Object(None),
        },
        other => return Err(bad(format!("unsupported type {other:?} for {path:?}"))),
    };
    Ok(field)
}

fn validate_object(prefix: &str, fields: &BTreeMap<String, FieldType>, obj: &Map<String, Value>) -> Result<(), DriverError> {
    for (name, value) in obj {
        let path = join(prefix, name);
        let ty = fields
            .get(name)
            .ok_or_else(|| bad(format!("field {path:?} is not declared in the schema")))?;
        validate_value(&path, ty, value)?;
    }
    Ok(())
}

fn validate_value(path: &str, ty: &FieldType, value: &Value) -> Result<(), DriverError> {
    if value.is_null() {
        return Ok(());
    }
    let mismatch = || bad(format!("field {path:?}: {value} does not match the declared type"));
    match ty {
        FieldType::String(fmt) => {
            let s = value.as_str().ok_or_else(mismatch)?;
            match fmt {
                StrFormat::Plain => {}
                StrFormat::Byte => {
                    base64_decode(s).map_err(|e| bad(format!("field {path:?}: {}", e.message)))?;
                }
                StrFormat::Uuid if uuid::Uuid::parse_str(s).is_err() => return Err(bad(format!("field {path:?}: {s:?} is not a uuid"))),
                StrFormat::DateTime if chrono::DateTime::parse_from_rfc3339(s).is_err() => {
                    return Err(bad(format!("field {path:?}: {s:?} is not an RFC 3339 date-time")))
                }
                StrFormat::Uuid | StrFormat::DateTime => {}
            }
        }
        FieldType::Number => {
            if !value.is_number() {
                return Err(mismatch());
            }
        }
        FieldType::Integer(fmt) => {
            let ok = match fmt {
                IntFormat::Any => value.is_i64() || value.is_u64(),
                IntFormat::Int64 => value.is_i64(),
                IntFormat::Int32 => value.as_i64().map_or(false, |v| i32::try_from(v).is_ok()),
            };
            if !ok {
                return Err(bad(format!("field {path:?}: {value} is not a valid {fmt:?} integer")));
            }
        }
        FieldType::Boolean => {
            if !value.is_boolean() {
                return Err(mismatch());
            }
        }
        FieldType::Array(items) => {
            let arr = value.as_array().ok_or_else(mismatch)?;
            if let Some(item_ty) = items {
                for (i, item) in arr.iter().enumerate() {
                    validate_value(&format!("{path}[{i}]"), item_ty, item)?;
                }
            }
        }
        FieldType::Object(props) => {
            let obj = value.as_object().ok_or_else(mismatch)?;
            if let Some(props) = props {
                validate_object(path, props, obj)?;
            }
        }
    }
    Ok(())
}
