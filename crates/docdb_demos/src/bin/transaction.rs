//! A committed unit of work that probes for its collection, then a failing one that rolls back.

use std::sync::Arc;

use docdb_core::{Document, DocumentStore, Filter, Schema};
use docdb_demos::{check, connect, init_tracing, log_documents, reset_database, Result};
use docdb_engine::{collection_exists, Error, TransactionRunner};
use serde_json::json;

const ORDERS: &str = r#"{
    "title": "orders",
    "properties": {
        "id": { "type": "integer", "autoGenerate": true },
        "item": { "type": "string" }
    },
    "primary_key": ["id"]
}"#;

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "shop")?;
    let runner = TransactionRunner::new(Arc::new(driver.clone()));

    let created = runner.in_transaction(&ctx, "shop", |tx| -> std::result::Result<bool, Error> {
        if collection_exists(&ctx, tx, "orders")? {
            return Ok(false);
        }
        tx.create_or_update_collection(&ctx, "orders", &Schema::parse(ORDERS)?)?;
        tx.insert(&ctx, "orders", &[Document::from_value(json!({ "item": "kettle" }))?])?;
        Ok(true)
    })?;
    tracing::info!(created, "first transaction committed");
    check(collection_exists(&ctx, db.as_ref(), "orders")?, "orders visible after commit")?;

    let failed = runner.in_transaction(&ctx, "shop", |tx| -> std::result::Result<(), Error> {
        tx.insert(&ctx, "orders", &[Document::from_value(json!({ "item": "toaster" }))?])?;
        Err(Error::work("out of stock"))
    });
    match failed {
        Err(e) => tracing::info!(error = %e, "second transaction rolled back"),
        Ok(()) => check(false, "failing work must not commit")?,
    }

    check(log_documents(db.read(&ctx, "orders", &Filter::all(), None)?) == 1, "only the committed order remains")?;
    tracing::info!(stats = ?runner.stats(), "runner stats");
    Ok(())
}
