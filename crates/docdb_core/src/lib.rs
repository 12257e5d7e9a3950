pub mod bytes;
pub mod config;
pub mod context;
pub mod types;

use std::convert::TryFrom;
use std::fmt;

pub use config::DriverConfig;
pub use context::Context;
pub use types::{
    CollectionInfo, DatabaseInfo, DeleteResponse, Document, Documents, Fields, Filter,
    InsertResponse, ReplaceResponse, Schema, Update, UpdateResponse,
};

// -----------------------
// Driver Ports
// -----------------------

/// Anything that can describe a collection: plain database handles and
/// transactions both qualify.
pub trait CollectionDescriber: Send + Sync {
    fn describe_collection(&self, ctx: &Context, collection: &str) -> Result<CollectionInfo, DriverError>;
}

/// Collection and document operations shared by database and transaction handles
pub trait DocumentStore: CollectionDescriber {
    fn create_or_update_collection(&self, ctx: &Context, collection: &str, schema: &Schema) -> Result<(), DriverError>;
    fn drop_collection(&self, ctx: &Context, collection: &str) -> Result<(), DriverError>;
    fn list_collections(&self, ctx: &Context) -> Result<Vec<CollectionName>, DriverError>;

    fn insert(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<InsertResponse, DriverError>;
    fn replace(&self, ctx: &Context, collection: &str, docs: &[Document]) -> Result<ReplaceResponse, DriverError>;
    fn read(&self, ctx: &Context, collection: &str, filter: &Filter, fields: Option<&Fields>) -> Result<Documents, DriverError>;
    fn update(&self, ctx: &Context, collection: &str, filter: &Filter, update: &Update) -> Result<UpdateResponse, DriverError>;
    fn delete(&self, ctx: &Context, collection: &str, filter: &Filter) -> Result<DeleteResponse, DriverError>;
}

/// Handle to a logical database. Obtaining one performs no network call.
pub trait Database: DocumentStore {
    fn name(&self) -> &DatabaseName;
    fn describe_database(&self, ctx: &Context) -> Result<DatabaseInfo, DriverError>;
}

/// In-flight transaction. Terminating it consumes the handle, so a finished
/// transaction cannot be reused.
pub trait Tx: DocumentStore {
    fn database(&self) -> &DatabaseName;
    fn commit(self: Box<Self>, ctx: &Context) -> Result<(), DriverError>;
    fn rollback(self: Box<Self>, ctx: &Context) -> Result<(), DriverError>;
}

/// Connection to a database service
pub trait Driver: Send + Sync {
    fn create_database(&self, ctx: &Context, db: &DatabaseName) -> Result<(), DriverError>;
    fn drop_database(&self, ctx: &Context, db: &DatabaseName) -> Result<(), DriverError>;
    fn list_databases(&self, ctx: &Context) -> Result<Vec<DatabaseName>, DriverError>;
    fn use_database(&self, db: &DatabaseName) -> Box<dyn Database>;
    fn begin_tx(&self, ctx: &Context, db: &DatabaseName) -> Result<Box<dyn Tx>, DriverError>;
}

// -----------------------
// Errors
// -----------------------

/// Machine-readable error code carried by every driver error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Code {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    Unimplemented,
    Internal,
    Unavailable,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Cancelled => "cancelled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid argument",
            Code::DeadlineExceeded => "deadline exceeded",
            Code::NotFound => "not found",
            Code::AlreadyExists => "already exists",
            Code::PermissionDenied => "permission denied",
            Code::ResourceExhausted => "resource exhausted",
            Code::FailedPrecondition => "failed precondition",
            Code::Aborted => "aborted",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct DriverError {
    pub code: Code,
    pub message: String,
}

impl DriverError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn code(&self) -> Code { self.code }

    pub fn invalid_argument(message: impl Into<String>) -> Self { Self::new(Code::InvalidArgument, message) }
    pub fn not_found(message: impl Into<String>) -> Self { Self::new(Code::NotFound, message) }
    pub fn already_exists(message: impl Into<String>) -> Self { Self::new(Code::AlreadyExists, message) }
    pub fn failed_precondition(message: impl Into<String>) -> Self { Self::new(Code::FailedPrecondition, message) }
    pub fn aborted(message: impl Into<String>) -> Self { Self::new(Code::Aborted, message) }
    pub fn internal(message: impl Into<String>) -> Self { Self::new(Code::Internal, message) }
}

// -----------------------
// Identifiers
// -----------------------

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseName(String);

impl TryFrom<&str> for DatabaseName {
    type Error = DriverError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_identifier("database", value)?;
        Ok(Self(value.to_string()))
    }
}

impl DatabaseName {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionName(String);

impl TryFrom<&str> for CollectionName {
    type Error = DriverError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_identifier("collection", value)?;
        Ok(Self(value.to_string()))
    }
}

impl CollectionName {
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_identifier(kind: &str, s: &str) -> Result<(), DriverError> {
    if s.is_empty() || s.len() > 128 {
        return Err(DriverError::invalid_argument(format!("{kind} name length must be 1..=128: {s:?}")));
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(DriverError::invalid_argument(format!("{kind} name charset: {s:?}")));
    }
    Ok(())
}
