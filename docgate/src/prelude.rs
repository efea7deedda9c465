//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```
//!
//! This provides access to:
//! - Store backends, builders and stores
//! - Identifiers, documents and query construction
//! - Gateway configuration, server and errors

pub use docgate_core::{
    collection::{Collection, InsertedDocument, SpaceOutcome},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
    document::{DocumentBody, OrderDocument, document_from_json, document_to_json},
    backend::{StoreBackend, DynStoreBackend, StoreBackendBuilder, UpdateOutcome},
    id::Identifier,
    query::{Query, QueryVisitor, Expr, Sort, SortDirection, FieldOp, QueryBuilder, Filter, Limit, Update},
    error::{DocumentStoreError, DocumentStoreResult},
};

pub use crate::{
    config::{BackendKind, GatewayConfig},
    error::{ApiError, ApiResult},
    memory::InMemoryStore,
    server::{GatewayServer, ServerError, open_store},
};
