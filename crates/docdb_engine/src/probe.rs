//! Existence probes built on the driver's describe call.

use crate::types::{Code, CollectionDescriber, Context, DriverError, ErrorCode};

/// True when the error carries the driver's "not found" code.
pub fn is_not_found<E: ErrorCode + ?Sized>(err: &E) -> bool {
    err.code() == Some(Code::NotFound)
}

/// Reports whether `collection` exists, through either a database handle or a
/// transaction. Absence is `Ok(false)`; any other describe failure is returned.
pub fn collection_exists<H>(ctx: &Context, handle: &H, collection: &str) -> Result<bool, DriverError>
where
    H: CollectionDescriber + ?Sized,
{
    match handle.describe_collection(ctx, collection) {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e),
    }
}
