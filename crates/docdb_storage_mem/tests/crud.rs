//! Document operations against committed state of the in-memory driver

use std::convert::TryFrom;

use docdb_core::bytes::{base64_encode, hex_decode};
use docdb_core::{
    Code, CollectionDescriber, Context, Database, DatabaseName, Document, DocumentStore, Driver, Fields,
    Filter, Schema, Update,
};
use docdb_storage_mem::MemDriver;
use serde_json::json;

fn setup(schema: &str) -> (MemDriver, Box<dyn Database>) {
    let ctx = Context::background();
    let driver = MemDriver::new();
    let name = DatabaseName::try_from("test").unwrap();
    driver.create_database(&ctx, &name).unwrap();
    let db = driver.use_database(&name);
    db.create_or_update_collection(&ctx, "users", &Schema::parse(schema).unwrap()).unwrap();
    (driver, db)
}

const USERS: &str = r#"{
    "title": "users",
    "properties": {
        "balance": { "type": "number" },
        "_id": { "type": "string", "format": "byte" }
    },
    "primary_key": ["_id"]
}"#;

fn read_all(db: &dyn Database, filter: &Filter) -> Vec<Document> {
    db.read(&Context::background(), "users", filter, None).unwrap().collect()
}

#[test]
fn byte_id_lifecycle() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    let id = base64_encode(&hex_decode("62ea6a943d44b10e1b6b8797").unwrap());
    let filter = Filter::from_value(json!({ "_id": id })).unwrap();
    let doc = Document::from_value(json!({ "_id": id, "balance": 1 })).unwrap();

    let inserted = db.insert(&ctx, "users", &[doc]).unwrap();
    assert_eq!(inserted.status, "inserted");
    assert_eq!(inserted.keys, vec![json!({ "_id": id }).to_string()]);
    assert_eq!(read_all(db.as_ref(), &filter).len(), 1);

    let updated = db
        .update(&ctx, "users", &filter, &Update::parse(r#"{"$set": {"balance": 2}}"#).unwrap())
        .unwrap();
    assert_eq!(updated.modified_count, 1);
    let docs = read_all(db.as_ref(), &filter);
    assert_eq!(docs[0].get("balance"), Some(&json!(2)));

    let deleted = db.delete(&ctx, "users", &filter).unwrap();
    assert_eq!(deleted.deleted_count, 1);
    assert!(read_all(db.as_ref(), &filter).is_empty());
}

#[test]
fn duplicate_key_rejects_whole_batch() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    let a = Document::from_value(json!({ "_id": "AQ==", "balance": 1 })).unwrap();
    let b = Document::from_value(json!({ "_id": "Ag==", "balance": 2 })).unwrap();
    db.insert(&ctx, "users", &[a.clone()]).unwrap();

    let err = db.insert(&ctx, "users", &[b, a]).unwrap_err();
    assert_eq!(err.code, Code::AlreadyExists);
    assert_eq!(read_all(db.as_ref(), &Filter::all()).len(), 1);
}

#[test]
fn replace_upserts_by_key() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    db.insert(&ctx, "users", &[Document::from_value(json!({ "_id": "AQ==", "balance": 1 })).unwrap()])
        .unwrap();
    let resp = db
        .replace(
            &ctx,
            "users",
            &[
                Document::from_value(json!({ "_id": "AQ==", "balance": 10 })).unwrap(),
                Document::from_value(json!({ "_id": "Ag==" })).unwrap(),
            ],
        )
        .unwrap();
    assert_eq!(resp.status, "replaced");
    assert_eq!(resp.keys.len(), 2);

    let docs = read_all(db.as_ref(), &Filter::all());
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].get("balance"), Some(&json!(10)));
    assert_eq!(docs[1].get("balance"), None);
}

#[test]
fn update_counts_only_changed_documents() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    let docs: Vec<Document> = ["AQ==", "Ag==", "Aw=="]
        .iter()
        .map(|id| Document::from_value(json!({ "_id": id, "balance": 5 })).unwrap())
        .collect();
    db.insert(&ctx, "users", &docs).unwrap();
    db.update(&ctx, "users", &Filter::parse(r#"{"_id": "AQ=="}"#).unwrap(), &Update::parse(r#"{"$set": {"balance": 7}}"#).unwrap())
        .unwrap();

    let resp = db
        .update(&ctx, "users", &Filter::all(), &Update::parse(r#"{"$set": {"balance": 7}}"#).unwrap())
        .unwrap();
    assert_eq!(resp.modified_count, 2);
}

#[test]
fn primary_key_cannot_be_updated() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    db.insert(&ctx, "users", &[Document::from_value(json!({ "_id": "AQ==" })).unwrap()]).unwrap();
    let err = db
        .update(&ctx, "users", &Filter::all(), &Update::parse(r#"{"$set": {"_id": "Ag=="}}"#).unwrap())
        .unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);
}

#[test]
fn unset_removes_field() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    db.insert(&ctx, "users", &[Document::from_value(json!({ "_id": "AQ==", "balance": 3 })).unwrap()])
        .unwrap();
    db.update(&ctx, "users", &Filter::all(), &Update::parse(r#"{"$unset": ["balance"]}"#).unwrap())
        .unwrap();
    assert_eq!(read_all(db.as_ref(), &Filter::all())[0].get("balance"), None);
}

#[test]
fn generated_ids_are_ordered() {
    let ctx = Context::background();
    let (_driver, db) = setup(r#"{"properties": {"n": {"type": "integer"}}}"#);
    let docs: Vec<Document> = (0..3).map(|n| Document::from_value(json!({ "n": n })).unwrap()).collect();
    let resp = db.insert(&ctx, "users", &docs).unwrap();
    assert_eq!(resp.keys[0], json!({ "_id": format!("{:024x}", 1) }).to_string());

    let read: Vec<i64> = read_all(db.as_ref(), &Filter::all())
        .iter()
        .map(|d| d.get("n").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(read, vec![0, 1, 2]);
}

#[test]
fn comparison_filters_and_projection() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    let docs: Vec<Document> = [("AQ==", 1), ("Ag==", 5), ("Aw==", 9)]
        .iter()
        .map(|(id, b)| Document::from_value(json!({ "_id": id, "balance": b })).unwrap())
        .collect();
    db.insert(&ctx, "users", &docs).unwrap();

    let filter = Filter::parse(r#"{"balance": {"$gt": 1, "$lte": 9}}"#).unwrap();
    let fields = Fields::parse(r#"{"balance": true}"#).unwrap();
    let hits: Vec<Document> = db.read(&ctx, "users", &filter, Some(&fields)).unwrap().collect();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|d| d.get("_id").is_some()));

    let fields = Fields::parse(r#"{"balance": false}"#).unwrap();
    let hits: Vec<Document> = db.read(&ctx, "users", &Filter::all(), Some(&fields)).unwrap().collect();
    assert!(hits.iter().all(|d| d.get("balance").is_none()));
}

#[test]
fn missing_collection_is_not_found() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    assert_eq!(db.describe_collection(&ctx, "orders").unwrap_err().code, Code::NotFound);
    assert_eq!(db.read(&ctx, "orders", &Filter::all(), None).unwrap_err().code, Code::NotFound);
    assert_eq!(db.drop_collection(&ctx, "orders").unwrap_err().code, Code::NotFound);
}

#[test]
fn handle_to_missing_database_fails_precondition() {
    let ctx = Context::background();
    let driver = MemDriver::new();
    let db = driver.use_database(&DatabaseName::try_from("nowhere").unwrap());
    assert_eq!(db.describe_collection(&ctx, "users").unwrap_err().code, Code::FailedPrecondition);
    assert_eq!(db.describe_database(&ctx).unwrap_err().code, Code::NotFound);
}

#[test]
fn database_lifecycle() {
    let ctx = Context::background();
    let driver = MemDriver::new();
    let name = DatabaseName::try_from("test").unwrap();
    driver.create_database(&ctx, &name).unwrap();
    assert_eq!(driver.create_database(&ctx, &name).unwrap_err().code, Code::AlreadyExists);
    assert_eq!(driver.list_databases(&ctx).unwrap(), vec![name.clone()]);
    driver.drop_database(&ctx, &name).unwrap();
    assert_eq!(driver.drop_database(&ctx, &name).unwrap_err().code, Code::NotFound);
}

#[test]
fn cancelled_context_stops_operations() {
    let (_driver, db) = setup(USERS);
    let ctx = Context::background();
    ctx.cancel();
    assert_eq!(db.list_collections(&ctx).unwrap_err().code, Code::Cancelled);
}

#[test]
fn describe_database_lists_collections() {
    let ctx = Context::background();
    let (_driver, db) = setup(USERS);
    let info = db.describe_database(&ctx).unwrap();
    assert_eq!(info.collections.len(), 1);
    assert_eq!(info.collections[0].name.as_str(), "users");
}
