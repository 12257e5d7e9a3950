// Re-export driver types from docdb_core to keep stable paths for callers
pub use docdb_core::{
    Code,
    CollectionDescriber,
    CollectionInfo,
    CollectionName,
    Context,
    Database,
    DatabaseName,
    Driver,
    DriverError,
    Tx,
};

/// Errors that may carry a driver error code.
///
/// Classification helpers look only at the code, never at the concrete error
/// type; an error without a driver code is never treated as "not found".
pub trait ErrorCode {
    fn code(&self) -> Option<Code>;
}

impl ErrorCode for DriverError {
    fn code(&self) -> Option<Code> {
        Some(self.code)
    }
}

/// Engine error: a driver failure or a failure of caller logic
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("work failed: {0}")]
    Work(String),
}

impl Error {
    pub fn work(message: impl Into<String>) -> Self {
        Error::Work(message.into())
    }
}

impl ErrorCode for Error {
    fn code(&self) -> Option<Code> {
        match self {
            Error::Driver(e) => Some(e.code),
            Error::Work(_) => None,
        }
    }
}
