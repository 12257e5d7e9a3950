//! Shared plumbing of the demo programs

use std::convert::TryFrom;

use docdb_core::{Context, Database, DatabaseName, Documents, Driver, DriverConfig, DriverError};
use docdb_storage_mem::MemDriver;

#[derive(thiserror::Error, Debug)]
pub enum DemoError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Engine(#[from] docdb_engine::Error),
    #[error("check failed: {0}")]
    Check(String),
}

pub type Result<T> = std::result::Result<T, DemoError>;

/// Log to stderr, filtered by `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Driver configured from the environment, plus a context honouring its timeout.
pub fn connect() -> Result<(MemDriver, Context)> {
    let config = DriverConfig::from_env()?;
    let driver = MemDriver::connect(&config)?;
    tracing::info!(url = %config.url, "connected");
    Ok((driver, config.context()))
}

/// Drop `name` if present and create it empty.
pub fn reset_database(ctx: &Context, driver: &dyn Driver, name: &str) -> Result<Box<dyn Database>> {
    let name = DatabaseName::try_from(name)?;
    match driver.drop_database(ctx, &name) {
        Ok(()) => tracing::info!(database = %name, "dropped existing database"),
        Err(e) if docdb_engine::is_not_found(&e) => {}
        Err(e) => return Err(e.into()),
    }
    driver.create_database(ctx, &name)?;
    Ok(driver.use_database(&name))
}

pub fn log_documents(docs: Documents) -> usize {
    let mut n = 0;
    for doc in docs {
        tracing::info!("\t{doc}");
        n += 1;
    }
    tracing::info!("\tDONE ({n} documents)");
    n
}

pub fn check(cond: bool, what: impl Into<String>) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(DemoError::Check(what.into()))
    }
}
