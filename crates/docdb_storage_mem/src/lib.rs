//! In-memory implementation of the docdb driver ports.
//!
//! Every database lives in process memory behind one mutex. Transactions work
//! on a private snapshot and are validated optimistically at commit.

mod catalog;
mod query;
mod schema;
mod tx;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use docdb_core::{
    CollectionDescriber, CollectionInfo, CollectionName, Context, Database, DatabaseInfo,
    DatabaseName, DeleteResponse, Document, DocumentStore, Documents, Driver, DriverConfig,
    DriverError, Fields, Filter, InsertResponse, ReplaceResponse, Schema, Tx, Update,
    UpdateResponse,
};

use crate::catalog::Collections;
pub use crate::tx::MemTx;

pub(crate) struct DbState {
    pub collections: Collections,
    /// Changes on every committed mutation; compared at transaction commit
    pub version: u64,
}

#[derive(Default)]
pub(crate) struct State {
    pub databases: HashMap<DatabaseName, DbState>,
    clock: u64,
}

impl State {
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

#[derive(Default)]
pub(crate) struct Shared {
    state: Mutex<State>,
}

impl Shared {
    pub fn lock(&self) -> Result<MutexGuard<'_, State>, DriverError> {
        self.state
            .lock()
            .map_err(|_| DriverError::internal("in-memory state mutex poisoned"))
    }
}

/// In-process driver. Cloning yields another handle to the same databases.
#[derive(Clone, Default)]
pub struct MemDriver {
    shared: Arc<Shared>,
    url: Option<String>,
}

impl MemDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `mem://<name>` or `host:port` urls; the url is kept for diagnostics only.
    pub fn connect(config: &DriverConfig) -> Result<Self, DriverError> {
        validate_url(&config.url)?;
        tracing::debug!(url = %config.url, "in-memory driver connected");
        Ok(Self { shared: Arc::default(), url: Some(config.url.clone()) })
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl std::fmt::Debug for MemDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemDriver").field("url", &self.url).finish()
    }
}

fn validate_url(url: &str) -> Result<(), DriverError> {
    let invalid = || DriverError::invalid_argument(format!("driver url {url:?} must be mem://<name> or host:port"));
    if let Some(name) = url.strip_prefix("mem://") {
        return if name.is_empty() { Err(invalid()) } else { Ok(()) };
    }
    let (host, port) = url.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

impl Driver for MemDriver {
    fn create_database(&self, ctx: &Context, db: &DatabaseName) -> Result<(), DriverError> {
        ctx.check()?;
        let mut state = self.shared.lock()?;
        if state.databases.contains_key(db) {
            return Err(DriverError::already_exists(format!("database {:?} already exists", db.as_str())));
        }
        let version = state.tick();
        state.databases.insert(db.clone(), DbState { collections: Collections::default(), version });
        tracing::debug!(database = %db, "database created");
        Ok(())
    }

    fn drop_database(&self, ctx: &Context, db: &DatabaseName) -> Result<(), DriverError> {
        ctx.check()?;
        let mut state = self.shared.lock()?;
        match state.databases.remove(db) {
            Some(_) => {
                tracing::debug!(database = %db, "database dropped");
                Ok(())
            }
            None => Err(DriverError::not_found(format!("database {:?} does not exist", db.as_str()))),
        }
    }

    fn list_databases(&self, ctx: &Context) -> Result<Vec<DatabaseName>, DriverError> {
        ctx.check()?;
        let state = self.shared.lock()?;
        let mut names: Vec<DatabaseName> = state.databases.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn use_database(&self, db: &DatabaseName) -> Box<dyn Database> {
        Box::new(MemDatabase { shared: Arc::clone(&self.shared), name: db.clone() })
    }

    fn begin_tx(&self, ctx: &Context, db: &DatabaseName) -> Result<Box<dyn Tx>, DriverError> {
        ctx.check()?;
        let state = self.shared.lock()?;
        let current = state
            .databases
            .get(db)
            .ok_or_else(|| DriverError::not_found(format!("database {:?} does not exist", db.as_str())))?;
        let tx = MemTx::new(Arc::clone(&self.shared), db.clone(), current.collections.clone(), current.version);
        Ok(Box::new(tx))
    }
}

/// Handle to one database of a [`MemDriver`]. Operations run directly on the
/// committed state.
pub struct MemDatabase {
    shared: Arc<Shared>,
    name: DatabaseName,
}

impl MemDatabase {
    fn read_state<T>(&self, ctx: &Context, f: impl FnOnce(&Collections) -> Result<T, DriverError>) -> Result<T, DriverError> {
        ctx.check()?;
        let state = self.shared.lock()?;
        let db = state.databases.get(&self.name).ok_or_else(|| missing_database(&self.name))?;
        f(&db.collections)
    }

    /// Run a mutation; the database version moves only when it succeeds.
    fn write_state<T>(&self, ctx: &Context, f: impl FnOnce(&mut Collections) -> Result<T, DriverError>) -> Result<T, DriverError> {
        ctx.check()?;
        let mut state = self.shared.lock()?;
        let version = state.tick();
        let db = state.databases.get_mut(&self.name).ok_or_else(|| missing_database(&self.name))?;
        let out = f(&mut db.collections)?;
        db.version = version;
        Ok(out)
    }
}

/// Collection operations through a handle whose database is gone are a
/// precondition failure, never "not found": absence is reserved for the
/// collection itself.
fn missing_database(db: &DatabaseName) -> DriverError {
    DriverError::failed_precondition(format!("database {:?} does not exist", db.as_str()))
}

impl CollectionDescriber for MemDatabase {
    fn describe_collection(&self, ctx: &Context, collection: &str) -> Result<CollectionInfo, DriverError> {
        self.read_state(ctx, |c| c.describe(collection))
    }
}

impl DocumentStore for MemDatabase {
    fn create_or_update_collection(&self, ctx: &Context, collection: &str, schema: &Schema) -> Result<(), DriverError> {
        let created = self.write_state(ctx, |c| c.create_or_update(collection, schema))?;
        tracing::debug!(database = %self.name, collection, created, "collection schema applied");
        Ok(())
    }

    fn drop_collection(&self, ctx: &Context, collection: &str) -> Result<(), DriverError> {
        self.write_state(ctx, |c| c.drop_collection(collection))?;
        tracing::debug!(database = %self.name, collection, "collection dropped");
        Ok(())
    }

    fn list_collections(&self, ctx: &Context) -> Result<Vec<CollectionName>, DriverError> {
        self.read_state(ctx, |c| Ok(c.list()))
    }

    fn insert(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<InsertResponse, DriverError> {
        self.write_state(ctx, |c| c.insert(collection, docs))
    }

    fn replace(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<ReplaceResponse, DriverError> {
        self.write_state(ctx, |c| c.replace(collection, docs))
    }

    fn read(&self, ctx: &Context, collection: &str, filter: &Filter, fields: Option<&Fields>) -> Result<Documents, DriverError> {
        self.read_state(ctx, |c| c.read(collection, filter, fields).map(Documents::new))
    }

    fn update(&self, ctx: &Context, collection: &str, filter: &Filter, update: &Update) -> Result<UpdateResponse, DriverError> {
        self.write_state(ctx, |c| c.update(collection, filter, update))
    }

    fn delete(&self, ctx: &Context, collection: &str, filter: &Filter) -> Result<DeleteResponse, DriverError> {
        self.write_state(ctx, |c| c.delete(collection, filter))
    }
}

impl Database for MemDatabase {
    fn name(&self) -> &DatabaseName {
        &self.name
    }

    fn describe_database(&self, ctx: &Context) -> Result<DatabaseInfo, DriverError> {
        ctx.check()?;
        let state = self.shared.lock()?;
        let db = state
            .databases
            .get(&self.name)
            .ok_or_else(|| DriverError::not_found(format!("database {:?} does not exist", self.name.as_str())))?;
        Ok(DatabaseInfo { name: self.name.clone(), collections: db.collections.describe_all() })
    }
}
