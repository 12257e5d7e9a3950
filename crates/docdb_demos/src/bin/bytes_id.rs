//! Document lifecycle keyed by a `byte`-format primary key.

use docdb_core::bytes::{base64_encode, hex_decode};
use docdb_core::{Document, DocumentStore, Filter, Schema, Update};
use docdb_demos::{check, connect, init_tracing, log_documents, reset_database, Result};
use serde_json::json;

const USERS: &str = r#"{
    "title": "users",
    "properties": {
        "balance": { "type": "number" },
        "_id": { "type": "string", "format": "byte" }
    },
    "primary_key": ["_id"]
}"#;

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "test")?;
    db.create_or_update_collection(&ctx, "users", &Schema::parse(USERS)?)?;

    let id = base64_encode(&hex_decode("62ea6a943d44b10e1b6b8797")?);
    let filter = Filter::from_value(json!({ "_id": id }))?;
    let doc = Document::from_value(json!({ "_id": id, "balance": 1 }))?;

    tracing::info!("inserting: {doc}");
    let resp = db.insert(&ctx, "users", &[doc])?;
    tracing::info!("{} {}", resp.status, resp.keys.join(", "));

    tracing::info!("reading: {filter}");
    check(log_documents(db.read(&ctx, "users", &filter, None)?) == 1, "inserted document is readable")?;

    let resp = db.update(&ctx, "users", &filter, &Update::parse(r#"{"$set": {"balance": 2}}"#)?)?;
    tracing::info!("{} {}", resp.status, resp.modified_count);

    tracing::info!("reading after update: {filter}");
    let balance = db
        .read(&ctx, "users", &filter, None)?
        .next()
        .and_then(|d| d.get("balance").and_then(|v| v.as_i64()));
    check(balance == Some(2), "balance updated to 2")?;

    tracing::info!("deleting: {filter}");
    let resp = db.delete(&ctx, "users", &filter)?;
    tracing::info!("{} {}", resp.status, resp.deleted_count);

    tracing::info!("reading after delete: {filter}");
    check(log_documents(db.read(&ctx, "users", &filter, None)?) == 0, "deleted document is gone")?;
    Ok(())
}
