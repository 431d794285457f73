//! # Datagrid
//!
//! A declarative read-query engine: callers describe which fields of a
//! relational entity to display, filter, sort and search - including
//! fields reached through associations - and get back a paginated result
//! in exactly the requested shape, without per-row query storms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        TableRequest (columns, filters, sort, ...)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [analyze]
//! ┌─────────────────────────────────────────────────────────┐
//! │   ColumnAnalysis (fields / paths / counts / computed)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [plan]
//! ┌─────────────────────────────────────────────────────────┐
//! │        EagerLoadPlan (full loads vs count-only)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [assemble]
//! ┌─────────────────────────────────────────────────────────┐
//! │     QueryPlan (immutable: predicate, order, window)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [exec / optimize / project]
//! ┌─────────────────────────────────────────────────────────┐
//! │       TableResponse (rows + pagination metadata)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The `sql` module renders the assembled plan as multi-dialect SQL; a
//! [`Datastore`](exec::Datastore) implementation executes it.

pub mod analyze;
pub mod assemble;
pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod exec;
pub mod optimize;
pub mod plan;
pub mod project;
pub mod request;
pub mod schema;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::diag::{DiagnosticSink, Diagnostics, LogSink, MemorySink};
    pub use crate::engine::Engine;
    pub use crate::error::EngineError;
    pub use crate::exec::{Datastore, DatastoreError, Row};
    pub use crate::project::{PageLink, TableResponse};
    pub use crate::request::{
        AdvancedFilter, AdvancedOp, ColumnDefinition, FilterValue, LinkSpec, ScopeCall,
        SearchMode, SortDirection, TableRequest,
    };
    pub use crate::schema::{
        Association, AssociationKind, CompareOp, ComputedAttribute, Derivation, EntityDescriptor,
        FieldType, ModelRegistry,
    };
    pub use crate::sql::{Dialect, Query, SqlDialect};
}

// Also export the most-used types at the crate root
pub use config::Settings;
pub use engine::Engine;
pub use error::EngineError;
pub use exec::{Datastore, DatastoreError, Row};
pub use project::TableResponse;
pub use request::{ColumnDefinition, TableRequest};
pub use schema::{EntityDescriptor, ModelRegistry};
pub use sql::Dialect;
