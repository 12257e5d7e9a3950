use std::sync::{Arc, Mutex, MutexGuard};

use docdb_core::{
    CollectionDescriber, CollectionInfo, CollectionName, Context, DatabaseName, DeleteResponse,
    Document, DocumentStore, Documents, DriverError, Fields, Filter, InsertResponse,
    ReplaceResponse, Schema, Tx, Update, UpdateResponse,
};

use crate::catalog::Collections;
use crate::Shared;

struct Working {
    collections: Collections,
    dirty: bool,
}

/// Transaction over a private copy of one database's collections.
///
/// Nothing is visible to other handles until [`Tx::commit`]. A commit fails
/// with `Aborted` when the database changed after the transaction began.
pub struct MemTx {
    shared: Arc<Shared>,
    db: DatabaseName,
    base_version: u64,
    working: Mutex<Working>,
}

impl MemTx {
    pub(crate) fn new(shared: Arc<Shared>, db: DatabaseName, snapshot: Collections, base_version: u64) -> Self {
        tracing::debug!(database = %db, base_version, "in-memory transaction started");
        Self {
            shared,
            db,
            base_version,
            working: Mutex::new(Working { collections: snapshot, dirty: false }),
        }
    }

    fn working(&self) -> Result<MutexGuard<'_, Working>, DriverError> {
        self.working
            .lock()
            .map_err(|_| DriverError::internal("transaction state mutex poisoned"))
    }

    fn read_snapshot<T>(&self, ctx: &Context, f: impl FnOnce(&Collections) -> Result<T, DriverError>) -> Result<T, DriverError> {
        ctx.check()?;
        let w = self.working()?;
        f(&w.collections)
    }

    fn write_snapshot<T>(&self, ctx: &Context, f: impl FnOnce(&mut Collections) -> Result<T, DriverError>) -> Result<T, DriverError> {
        ctx.check()?;
        let mut w = self.working()?;
        let out = f(&mut w.collections)?;
        w.dirty = true;
        Ok(out)
    }
}

impl CollectionDescriber for MemTx {
    fn describe_collection(&self, ctx: &Context, collection: &str) -> Result<CollectionInfo, DriverError> {
        self.read_snapshot(ctx, |c| c.describe(collection))
    }
}

impl DocumentStore for MemTx {
    fn create_or_update_collection(&self, ctx: &Context, collection: &str, schema: &Schema) -> Result<(), DriverError> {
        self.write_snapshot(ctx, |c| c.create_or_update(collection, schema)).map(|_| ())
    }

    fn drop_collection(&self, ctx: &Context, collection: &str) -> Result<(), DriverError> {
        self.write_snapshot(ctx, |c| c.drop_collection(collection))
    }

    fn list_collections(&self, ctx: &Context) -> Result<Vec<CollectionName>, DriverError> {
        self.read_snapshot(ctx, |c| Ok(c.list()))
    }

    fn insert(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<InsertResponse, DriverError> {
        self.write_snapshot(ctx, |c| c.insert(collection, docs))
    }

    fn replace(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<ReplaceResponse, DriverError> {
        self.write_snapshot(ctx, |c| c.replace(collection, docs))
    }

    fn read(&self, ctx: &Context, collection: &str, filter: &Filter, fields: Option<&Fields>) -> Result<Documents, DriverError> {
        self.read_snapshot(ctx, |c| c.read(collection, filter, fields).map(Documents::new))
    }

    fn update(&self, ctx: &Context, collection: &str, filter: &Filter, update: &Update) -> Result<UpdateResponse, DriverError> {
        self.write_snapshot(ctx, |c| c.update(collection, filter, update))
    }

    fn delete(&self, ctx: &Context, collection: &str, filter: &Filter) -> Result<DeleteResponse, DriverError> {
        self.write_snapshot(ctx, |c| c.delete(collection, filter))
    }
}

impl Tx for MemTx {
    fn database(&self) -> &DatabaseName {
        &self.db
    }

    fn commit(self: Box<Self>, ctx: &Context) -> Result<(), DriverError> {
        ctx.check()?;
        let MemTx { shared, db, base_version, working } = *self;
        let working = working
            .into_inner()
            .map_err(|_| DriverError::internal("transaction state mutex poisoned"))?;
        let mut state = shared.lock()?;
        let version = state.tick();
        let current = state
            .databases
            .get_mut(&db)
            .ok_or_else(|| DriverError::not_found(format!("database {:?} was dropped during the transaction", db.as_str())))?;
        if !working.dirty {
            return Ok(());
        }
        if current.version != base_version {
            tracing::debug!(database = %db, base_version, current = current.version, "in-memory transaction conflict");
            return Err(DriverError::aborted(format!("transaction on {:?} conflicts with a concurrent change", db.as_str())));
        }
        current.collections = working.collections;
        current.version = version;
        Ok(())
    }

    fn rollback(self: Box<Self>, ctx: &Context) -> Result<(), DriverError> {
        ctx.check()?;
        tracing::debug!(database = %self.db, "in-memory transaction discarded");
        Ok(())
    }
}
