//! Concurrent transactional transfers retried on conflict; the total balance is conserved.

use std::sync::Arc;
use std::thread;

use docdb_core::{Code, Context, Document, DocumentStore, DriverError, Filter, Schema, Tx, Update};
use docdb_demos::{check, connect, init_tracing, reset_database, DemoError, Result};
use docdb_engine::TransactionRunner;
use serde::{Deserialize, Serialize};
use serde_json::json;

const ACCOUNTS: usize = 8;
const WORKERS: usize = 8;
const TRANSFERS: usize = 50;
const OPENING: i64 = 1_000;
const MAX_RETRIES: usize = 1_000;

#[derive(Debug, Serialize, Deserialize)]
struct Account {
    id: i64,
    balance: i64,
}

fn balance(ctx: &Context, tx: &dyn Tx, id: i64) -> std::result::Result<i64, DriverError> {
    let filter = Filter::from_value(json!({ "id": id }))?;
    let doc = tx
        .read(ctx, "accounts", &filter, None)?
        .next()
        .ok_or_else(|| DriverError::not_found(format!("account {id}")))?;
    Ok(doc.deserialize::<Account>()?.balance)
}

fn set_balance(ctx: &Context, tx: &dyn Tx, id: i64, balance: i64) -> std::result::Result<(), DriverError> {
    let filter = Filter::from_value(json!({ "id": id }))?;
    tx.update(ctx, "accounts", &filter, &Update::from_value(json!({ "$set": { "balance": balance } }))?)?;
    Ok(())
}

fn transfer(runner: &TransactionRunner, ctx: &Context, from: i64, to: i64, amount: i64) -> std::result::Result<usize, DriverError> {
    for attempt in 0..MAX_RETRIES {
        let out = runner.in_transaction(ctx, "bank", |tx| {
            let src = balance(ctx, tx, from)?;
            let dst = balance(ctx, tx, to)?;
            set_balance(ctx, tx, from, src - amount)?;
            set_balance(ctx, tx, to, dst + amount)
        });
        match out {
            Err(e) if e.code == Code::Aborted => continue,
            other => return other.map(|()| attempt),
        }
    }
    Err(DriverError::aborted(format!("transfer {from}->{to} gave up after {MAX_RETRIES} attempts")))
}

fn main() -> Result<()> {
    init_tracing();
    let (driver, ctx) = connect()?;
    let db = reset_database(&ctx, &driver, "bank")?;
    let schema = Schema::from_value(json!({
        "title": "accounts",
        "properties": { "id": { "type": "integer" }, "balance": { "type": "integer" } },
        "primary_key": ["id"]
    }))?;
    db.create_or_update_collection(&ctx, "accounts", &schema)?;
    let opening: Vec<Document> = (0..ACCOUNTS as i64)
        .map(|id| Document::from_serializable(&Account { id, balance: OPENING }))
        .collect::<std::result::Result<_, _>>()?;
    db.insert(&ctx, "accounts", &opening)?;

    let runner = Arc::new(TransactionRunner::new(Arc::new(driver.clone())));
    let handles: Vec<_> = (0..WORKERS)
        .map(|w| {
            let runner = Arc::clone(&runner);
            let ctx = ctx.clone();
            thread::spawn(move || -> std::result::Result<usize, DriverError> {
                let mut retries = 0;
                for n in 0..TRANSFERS {
                    let from = ((w + n) % ACCOUNTS) as i64;
                    let to = ((w + n + 1) % ACCOUNTS) as i64;
                    retries += transfer(&runner, &ctx, from, to, (n % 7 + 1) as i64)?;
                }
                Ok(retries)
            })
        })
        .collect();

    let mut retries = 0;
    for h in handles {
        retries += h.join().map_err(|_| DemoError::Check("worker panicked".into()))??;
    }

    let total: i64 = db
        .read(&ctx, "accounts", &Filter::all(), None)?
        .map(|d| d.deserialize::<Account>().map(|a| a.balance))
        .sum::<std::result::Result<i64, _>>()?;
    check(total == OPENING * ACCOUNTS as i64, format!("total balance {total}"))?;
    let stats = runner.stats();
    tracing::info!(total, retries, committed = stats.committed, aborted = stats.commit_failures, "transfers done");
    Ok(())
}
