//! 64-bit integers survive a round trip without losing precision.

use docdb_core::{Code, Document, DocumentStore, Filter, Schema};
use docdb_demos::{check, connect, init_tracing, log_documents, reset_database, Result};
use serde_json::json;

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "test")?;
    let schema = Schema::from_value(json!({
        "title": "ints",
        "properties": {
            "id": { "type": "integer" },
            "max": { "type": "integer", "format": "int64" },
            "min": { "type": "integer", "format": "int64" },
            "unsigned": { "type": "number" }
        },
        "primary_key": ["id"]
    }))?;
    db.create_or_update_collection(&ctx, "ints", &schema)?;

    let doc = Document::from_value(json!({ "id": 1, "max": i64::MAX, "min": i64::MIN, "unsigned": u64::MAX }))?;
    db.insert(&ctx, "ints", &[doc])?;

    let back: Vec<Document> = db.read(&ctx, "ints", &Filter::all(), None)?.collect();
    let first = back.first().ok_or_else(|| docdb_demos::DemoError::Check("document read back".into()))?;
    check(first.get("max").and_then(|v| v.as_i64()) == Some(i64::MAX), "i64::MAX intact")?;
    check(first.get("min").and_then(|v| v.as_i64()) == Some(i64::MIN), "i64::MIN intact")?;
    check(first.get("unsigned").and_then(|v| v.as_u64()) == Some(u64::MAX), "u64::MAX intact")?;
    log_documents(db.read(&ctx, "ints", &Filter::all(), None)?);

    let overflow = Document::from_value(json!({ "id": 2, "max": u64::MAX }))?;
    match db.insert(&ctx, "ints", &[overflow]) {
        Err(e) if e.code == Code::InvalidArgument => tracing::info!("int64 field rejected u64::MAX: {e}"),
        Err(e) => return Err(e.into()),
        Ok(_) => check(false, "int64 field must reject u64::MAX")?,
    }
    Ok(())
}
