//! Engine error taxonomy.
//!
//! Only whole-request failures live here: a request that fails shape
//! validation, a token that does not resolve, a misconfigured schema, or
//! a datastore execution error. Per-clause failures (filters, sorts,
//! scopes, paths) are not errors - they degrade locally and surface
//! through the diagnostic sink.

use crate::exec::DatastoreError;
use crate::schema::{SchemaError, TokenError};

/// Fatal request-level errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request is structurally invalid (missing model or columns).
    #[error("invalid request: {0}")]
    Request(String),

    /// The model token is malformed, forged, or names nothing registered.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The registered schema itself is inconsistent.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The datastore failed to execute a query.
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}
