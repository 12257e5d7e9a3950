//! Replace overwrites existing documents and inserts missing ones.

use docdb_core::{Document, DocumentStore, Filter, Schema};
use docdb_demos::{check, connect, init_tracing, log_documents, reset_database, Result};
use serde_json::json;

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "test")?;
    let schema = Schema::from_value(json!({
        "title": "products",
        "properties": {
            "sku": { "type": "string" },
            "price": { "type": "number" },
            "stock": { "type": "integer" }
        },
        "primary_key": ["sku"]
    }))?;
    db.create_or_update_collection(&ctx, "products", &schema)?;

    let resp = db.insert(&ctx, "products", &[Document::from_value(json!({ "sku": "a-1", "price": 9.5, "stock": 3 }))?])?;
    tracing::info!("{} {}", resp.status, resp.keys.join(", "));
    log_documents(db.read(&ctx, "products", &Filter::all(), None)?);

    let docs = [
        Document::from_value(json!({ "sku": "a-1", "price": 8.0 }))?,
        Document::from_value(json!({ "sku": "b-2", "price": 4.25, "stock": 10 }))?,
    ];
    let resp = db.replace(&ctx, "products", &docs)?;
    tracing::info!("{} {}", resp.status, resp.keys.join(", "));

    let after: Vec<Document> = db.read(&ctx, "products", &Filter::all(), None)?.collect();
    check(after.len() == 2, "two products after replace")?;
    check(after[0].get("stock").is_none(), "replaced document lost its old fields")?;
    log_documents(db.read(&ctx, "products", &Filter::all(), None)?);
    Ok(())
}
