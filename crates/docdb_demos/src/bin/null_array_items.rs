//! Nulls are accepted as array items and as scalar values.

use docdb_core::{Document, DocumentStore, Filter, Schema};
use docdb_demos::{check, connect, init_tracing, log_documents, reset_database, Result};
use serde_json::json;

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "test")?;
    let schema = Schema::from_value(json!({
        "title": "posts",
        "properties": {
            "id": { "type": "integer" },
            "tags": { "type": "array", "items": { "type": "string" } },
            "note": { "type": "string" }
        },
        "primary_key": ["id"]
    }))?;
    db.create_or_update_collection(&ctx, "posts", &schema)?;

    let doc = Document::from_value(json!({ "id": 1, "tags": ["a", null, "c"], "note": null }))?;
    tracing::info!("inserting: {doc}");
    db.insert(&ctx, "posts", &[doc.clone()])?;

    let back: Vec<Document> = db.read(&ctx, "posts", &Filter::all(), None)?.collect();
    check(back == vec![doc], "document read back unchanged")?;
    log_documents(db.read(&ctx, "posts", &Filter::all(), None)?);
    Ok(())
}
