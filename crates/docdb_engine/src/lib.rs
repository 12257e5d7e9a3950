//! docdb engine (library)
//! Transaction scoping and existence probes on top of any [`Driver`].

pub mod probe;
pub mod tx;
pub mod types;

use std::convert::TryFrom;
use std::sync::Arc;

pub use probe::{collection_exists, is_not_found};
pub use tx::{RunnerStats, StatsSnapshot, TxGuard};
pub use types::{
    Code,
    Context,
    DatabaseName,
    Driver,
    DriverError,
    Error,
    ErrorCode,
    Tx,
};

/// Runs units of work inside transactions of an injected driver.
///
/// The runner holds no per-call state, so one instance can be shared between
/// threads; every call begins its own transaction.
pub struct TransactionRunner {
    driver: Arc<dyn Driver>,
    stats: RunnerStats,
}

impl TransactionRunner {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver, stats: RunnerStats::default() }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Begin a transaction on `db` and hand it to a guard that rolls back
    /// unless committed.
    pub fn begin(&self, ctx: &Context, db: &str) -> Result<TxGuard<'_>, DriverError> {
        let begun = DatabaseName::try_from(db)
            .and_then(|name| self.driver.begin_tx(ctx, &name).map(|tx| (tx, name)));
        match begun {
            Ok((tx, name)) => {
                self.stats.record_begin();
                tracing::debug!(database = %name, "transaction begun");
                Ok(TxGuard::new(tx, name, ctx, &self.stats))
            }
            Err(e) => {
                self.stats.record_begin_failure();
                tracing::debug!(database = %db, error = %e, "failed to begin transaction");
                Err(e)
            }
        }
    }

    /// Execute `work` in a transaction on `db`.
    ///
    /// A begin failure is returned before `work` runs. If `work` fails the
    /// transaction is rolled back and the work error is returned unchanged, even
    /// when the rollback itself fails. Otherwise the transaction is committed
    /// and a commit failure becomes the result.
    pub fn in_transaction<T, E, F>(&self, ctx: &Context, db: &str, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn Tx) -> Result<T, E>,
        E: From<DriverError>,
    {
        let guard = self.begin(ctx, db)?;
        let outcome = work(guard.tx());
        match outcome {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                guard.abort();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for TransactionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRunner").field("stats", &self.stats.snapshot()).finish()
    }
}
