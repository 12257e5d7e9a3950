//! Schema compilation and document validation edge cases

use std::convert::TryFrom;

use docdb_core::{Code, Context, Database, DatabaseName, Document, DocumentStore, Driver, Filter, Schema};
use docdb_storage_mem::MemDriver;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn database() -> Box<dyn Database> {
    let ctx = Context::background();
    let driver = MemDriver::new();
    let name = DatabaseName::try_from("schemas").unwrap();
    driver.create_database(&ctx, &name).unwrap();
    driver.use_database(&name)
}

fn create(db: &dyn Database, name: &str, schema: serde_json::Value) -> Result<(), docdb_core::DriverError> {
    db.create_or_update_collection(&Context::background(), name, &Schema::from_value(schema).unwrap())
}

fn insert(db: &dyn Database, name: &str, doc: serde_json::Value) -> Result<(), docdb_core::DriverError> {
    db.insert(&Context::background(), name, &[Document::from_value(doc).unwrap()]).map(|_| ())
}

#[test]
fn large_integers_round_trip_exactly() {
    let db = database();
    create(
        db.as_ref(),
        "ints",
        json!({
            "properties": {
                "id": { "type": "integer" },
                "i64": { "type": "integer", "format": "int64" },
                "num": { "type": "number" }
            },
            "primary_key": ["id"]
        }),
    )
    .unwrap();
    insert(db.as_ref(), "ints", json!({ "id": 1, "i64": i64::MAX, "num": u64::MAX })).unwrap();
    insert(db.as_ref(), "ints", json!({ "id": 2, "i64": i64::MIN })).unwrap();

    let docs: Vec<Document> = db.read(&Context::background(), "ints", &Filter::all(), None).unwrap().collect();
    assert_eq!(docs[0].get("i64"), Some(&json!(i64::MAX)));
    assert_eq!(docs[0].get("num").and_then(|v| v.as_u64()), Some(u64::MAX));
    assert_eq!(docs[1].get("i64").and_then(|v| v.as_i64()), Some(i64::MIN));
}

#[test]
fn int64_rejects_values_beyond_i64() {
    let db = database();
    create(
        db.as_ref(),
        "ints",
        json!({ "properties": { "v": { "type": "integer", "format": "int64" } } }),
    )
    .unwrap();
    let err = insert(db.as_ref(), "ints", json!({ "v": u64::MAX })).unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
}

#[test]
fn int32_range_is_enforced() {
    let db = database();
    create(db.as_ref(), "small", json!({ "properties": { "v": { "type": "integer", "format": "int32" } } })).unwrap();
    insert(db.as_ref(), "small", json!({ "v": i32::MAX })).unwrap();
    assert!(insert(db.as_ref(), "small", json!({ "v": i64::from(i32::MAX) + 1 })).is_err());
    assert!(insert(db.as_ref(), "small", json!({ "v": 1.5 })).is_err());
}

#[test]
fn null_array_items_are_accepted() {
    let db = database();
    create(
        db.as_ref(),
        "arrays",
        json!({
            "properties": {
                "tags": { "type": "array", "items": { "type": "string" } },
                "note": { "type": "string" }
            }
        }),
    )
    .unwrap();
    insert(db.as_ref(), "arrays", json!({ "tags": ["a", null, "b"], "note": null })).unwrap();
    let err = insert(db.as_ref(), "arrays", json!({ "tags": ["a", 1] })).unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
}

#[test]
fn undeclared_fields_are_rejected() {
    let db = database();
    create(db.as_ref(), "strict", json!({ "properties": { "a": { "type": "boolean" } } })).unwrap();
    assert!(insert(db.as_ref(), "strict", json!({ "b": true })).is_err());
}

#[test]
fn nested_objects_are_validated() {
    let db = database();
    create(
        db.as_ref(),
        "nested",
        json!({
            "properties": {
                "address": { "type": "object", "properties": { "zip": { "type": "integer" } } },
                "meta": { "type": "object" }
            }
        }),
    )
    .unwrap();
    insert(db.as_ref(), "nested", json!({ "address": { "zip": 12345 }, "meta": { "anything": [1, "x"] } })).unwrap();
    assert!(insert(db.as_ref(), "nested", json!({ "address": { "zip": "12345" } })).is_err());
    assert!(insert(db.as_ref(), "nested", json!({ "address": { "street": "x" } })).is_err());
}

#[test]
fn byte_format_requires_base64() {
    let db = database();
    create(db.as_ref(), "blobs", json!({ "properties": { "b": { "type": "string", "format": "byte" } } })).unwrap();
    insert(db.as_ref(), "blobs", json!({ "b": "aGVsbG8=" })).unwrap();
    assert!(insert(db.as_ref(), "blobs", json!({ "b": "not base64!" })).is_err());
}

#[test]
fn uuid_and_date_time_values_are_checked() {
    let db = database();
    create(
        db.as_ref(),
        "events",
        json!({
            "properties": {
                "id": { "type": "integer" },
                "ref": { "type": "string", "format": "uuid" },
                "t": { "type": "string", "format": "date-time" }
            },
            "primary_key": ["id"]
        }),
    )
    .unwrap();
    insert(db.as_ref(), "events", json!({ "id": 1, "ref": "1b4e28ba-2fa1-11d2-883f-0016d3cca427", "t": "2022-08-03T10:00:00+02:00" }))
        .unwrap();

    let err = insert(db.as_ref(), "events", json!({ "id": 2, "t": "2022-13-45T99:99:99Z" })).unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
    assert!(insert(db.as_ref(), "events", json!({ "id": 3, "t": "2023-02-29T00:00:00Z" })).is_err());
    assert!(insert(db.as_ref(), "events", json!({ "id": 4, "ref": "1b4e28ba-2fa1-11d2-883f-0016d3cca42" })).is_err());
    assert_eq!(db.read(&Context::background(), "events", &Filter::all(), None).unwrap().count(), 1);
}

#[test]
fn invalid_schemas_are_rejected() {
    let db = database();
    let cases = [
        json!({ "title": "other", "properties": {} }),
        json!({ "properties": [] }),
        json!({ "properties": { "a": { "type": "date" } } }),
        json!({ "properties": { "a": { "type": "string", "format": "email" } } }),
        json!({ "properties": { "a": { "type": "number" } }, "primary_key": ["a"] }),
        json!({ "properties": { "a": { "type": "string" } }, "primary_key": ["b"] }),
        json!({ "properties": { "a": { "type": "string" } }, "primary_key": [] }),
    ];
    for schema in cases {
        let err = create(db.as_ref(), "bad", schema.clone()).unwrap_err();
        assert_eq!(err.code, Code::InvalidArgument, "{schema}");
    }
}

#[test]
fn schema_update_keeps_documents_and_primary_key() {
    let db = database();
    let v1 = json!({ "properties": { "id": { "type": "string" } }, "primary_key": ["id"] });
    let v2 = json!({ "properties": { "id": { "type": "string" }, "extra": { "type": "boolean" } }, "primary_key": ["id"] });
    create(db.as_ref(), "evolving", v1).unwrap();
    insert(db.as_ref(), "evolving", json!({ "id": "a" })).unwrap();
    create(db.as_ref(), "evolving", v2).unwrap();
    insert(db.as_ref(), "evolving", json!({ "id": "b", "extra": true })).unwrap();

    let count = db.read(&Context::background(), "evolving", &Filter::all(), None).unwrap().count();
    assert_eq!(count, 2);

    let changed_pk = json!({ "properties": { "id": { "type": "string" }, "k": { "type": "string" } }, "primary_key": ["k"] });
    assert!(create(db.as_ref(), "evolving", changed_pk).is_err());
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Account {
    id: String,
    balance: i64,
    #[serde(default)]
    created: Option<String>,
}

#[test]
fn typed_documents() {
    let db = database();
    create(
        db.as_ref(),
        "accounts",
        json!({
            "properties": {
                "id": { "type": "string", "format": "uuid" },
                "balance": { "type": "integer" },
                "created": { "type": "string", "format": "date-time" }
            },
            "primary_key": ["id"]
        }),
    )
    .unwrap();
    let account = Account {
        id: "1b4e28ba-2fa1-11d2-883f-0016d3cca427".into(),
        balance: 10,
        created: Some("2022-08-03T10:00:00Z".into()),
    };
    db.insert(&Context::background(), "accounts", &[Document::from_serializable(&account).unwrap()])
        .unwrap();
    let back: Vec<Account> = db
        .read(&Context::background(), "accounts", &Filter::all(), None)
        .unwrap()
        .map(|d| d.deserialize().unwrap())
        .collect();
    assert_eq!(back, vec![account]);
}
