//! Concurrent schema creation on shared and distinct collection names.

use std::sync::{Arc, Barrier};
use std::thread;

use docdb_core::{DocumentStore, Schema};
use docdb_demos::{check, connect, init_tracing, reset_database, DemoError, Result};
use docdb_engine::collection_exists;
use serde_json::json;

const THREADS: usize = 16;

fn schema(title: &str) -> std::result::Result<Schema, docdb_core::DriverError> {
    Schema::from_value(json!({
        "title": title,
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "value": { "type": "number" }
        },
        "primary_key": ["id"]
    }))
}

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db: Arc<dyn docdb_core::Database> = Arc::from(reset_database(&ctx, &driver, "stress")?);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            let ctx = ctx.clone();
            thread::spawn(move || -> std::result::Result<(), docdb_core::DriverError> {
                barrier.wait();
                db.create_or_update_collection(&ctx, "shared", &schema("shared")?)?;
                let own = format!("coll_{i}");
                db.create_or_update_collection(&ctx, &own, &schema(&own)?)
            })
        })
        .collect();

    for h in handles {
        h.join().map_err(|_| DemoError::Check("worker panicked".into()))??;
    }

    check(collection_exists(&ctx, db.as_ref(), "shared")?, "shared collection exists")?;
    for i in 0..THREADS {
        check(collection_exists(&ctx, db.as_ref(), &format!("coll_{i}"))?, format!("coll_{i} exists"))?;
    }
    let total = db.list_collections(&ctx)?.len();
    check(total == THREADS + 1, format!("{total} collections"))?;
    tracing::info!(collections = total, "all collections created");
    Ok(())
}
