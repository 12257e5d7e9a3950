//! Scoped transaction ownership: a guard that commits explicitly and rolls back otherwise.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Context, DatabaseName, DriverError, Tx};

/// Lifetime counters of a [`crate::TransactionRunner`]
#[derive(Debug, Default)]
pub struct RunnerStats {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    begin_failures: AtomicU64,
    commit_failures: AtomicU64,
    rollback_failures: AtomicU64,
}

/// Point-in-time copy of [`RunnerStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub begin_failures: u64,
    pub commit_failures: u64,
    pub rollback_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RunnerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            begin_failures: self.begin_failures.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_begin(&self) { bump(&self.begun) }
    pub(crate) fn record_begin_failure(&self) { bump(&self.begin_failures) }
}

/// Owns an in-flight transaction. Dropping the guard without calling
/// [`TxGuard::commit`] rolls the transaction back, including while unwinding
/// from a panic.
pub struct TxGuard<'r> {
    tx: ManuallyDrop<Box<dyn Tx>>,
    /// Set once the handle has been moved out of `tx`.
    finished: bool,
    db: DatabaseName,
    ctx: Context,
    stats: &'r RunnerStats,
}

impl<'r> TxGuard<'r> {
    pub(crate) fn new(tx: Box<dyn Tx>, db: DatabaseName, ctx: &Context, stats: &'r RunnerStats) -> Self {
        Self { tx: ManuallyDrop::new(tx), finished: false, db, ctx: ctx.clone(), stats }
    }

    pub fn database(&self) -> &DatabaseName {
        &self.db
    }

    pub fn tx(&self) -> &dyn Tx {
        &**self.tx
    }

    fn take(&mut self) -> Box<dyn Tx> {
        debug_assert!(!self.finished);
        self.finished = true;
        // SAFETY: `take` runs at most once per guard. Every caller either
        // consumes the guard or is `Drop`, which checks `finished` first, so the
        // handle is never read again after being moved out.
        unsafe { ManuallyDrop::take(&mut self.tx) }
    }

    pub fn commit(mut self) -> Result<(), DriverError> {
        let tx = self.take();
        match tx.commit(&self.ctx) {
            Ok(()) => {
                bump(&self.stats.committed);
                tracing::debug!(database = %self.db, "transaction committed");
                Ok(())
            }
            Err(e) => {
                bump(&self.stats.commit_failures);
                tracing::debug!(database = %self.db, error = %e, "transaction commit failed");
                Err(e)
            }
        }
    }

    /// Roll back and report the driver's answer.
    pub fn rollback(mut self) -> Result<(), DriverError> {
        let tx = self.take();
        rollback_now(tx, &self.db, &self.ctx, self.stats)
    }

    /// Roll back, logging and counting a failed rollback instead of returning it.
    pub fn abort(mut self) {
        let tx = self.take();
        if let Err(e) = rollback_now(tx, &self.db, &self.ctx, self.stats) {
            tracing::warn!(database = %self.db, error = %e, "failed to roll back transaction");
        }
    }
}

fn rollback_now(tx: Box<dyn Tx>, db: &DatabaseName, ctx: &Context, stats: &RunnerStats) -> Result<(), DriverError> {
    match tx.rollback(ctx) {
        Ok(()) => {
            bump(&stats.rolled_back);
            tracing::debug!(database = %db, "transaction rolled back");
            Ok(())
        }
        Err(e) => {
            bump(&stats.rollback_failures);
            Err(e)
        }
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let tx = self.take();
        if std::thread::panicking() {
            tracing::warn!(database = %self.db, "rolling back transaction while unwinding from a panic");
        }
        if let Err(e) = rollback_now(tx, &self.db, &self.ctx, self.stats) {
            tracing::warn!(database = %self.db, error = %e, "failed to roll back transaction");
        }
    }
}
