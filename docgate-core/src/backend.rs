//! Storage backend abstraction for the gateway.
//!
//! This module defines the traits that abstract over the datastore the gateway
//! fronts. The gateway itself never talks to a database directly: every route
//! ends in exactly one call on a [`StoreBackend`].
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docgate::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! // Insert a document into a collection, creating the collection on the fly
//! let id = backend.insert_document(doc! { "subject": "Math", "spaces": 5 }, "lessons").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    id::Identifier,
    query::{Expr, Query, Update},
};

/// Counts reported by a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents the filter selected (0 or 1).
    pub matched: u64,
    /// Number of documents whose content actually changed (0 or 1).
    pub modified: u64,
}

/// Abstract interface for document storage backends.
///
/// Collections are addressed by name only. Backends must accept any name:
/// writes to a collection that does not exist yet create it implicitly, and
/// reads from one return an empty result rather than an error.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks. No ordering is promised between concurrent writes to
/// the same document.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Connectivity and engine failures surface as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Queries documents in a collection using a structured query.
    ///
    /// A query with an [`Expr::Text`] filter is a full-text search and
    /// requires a text index on the collection (see [`StoreBackend::create_text_index`]).
    ///
    /// # Arguments
    ///
    /// * `query` - The [`Query`] object specifying filter, sort and limit
    /// * `collection` - The name of the collection to query
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Retrieves a single document by identifier, `None` if it does not exist.
    async fn get_document(
        &self,
        id: Identifier,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Inserts a document, assigning and returning a fresh identifier.
    ///
    /// The collection is created automatically if it doesn't exist.
    ///
    /// # Arguments
    ///
    /// * `document` - The document to insert, without an `_id` field
    /// * `collection` - The name of the collection to insert into
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<Identifier>;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// Returns how many documents were matched and how many actually changed.
    /// Setting a field to the value it already holds counts as matched but not
    /// modified.
    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;

    /// Deletes a single document by identifier, returning how many were deleted (0 or 1).
    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64>;

    /// Declares the fields of `collection` that full-text search runs over.
    ///
    /// Creating an index that already exists with the same fields is a no-op.
    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external
    /// connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn get_document(
        &self,
        id: Identifier,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<Identifier>;
    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome>;
    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64>;
    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn get_document(
        &self,
        id: Identifier,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::get_document(self, id, collection).await
    }

    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<Identifier> {
        StoreBackend::insert_document(self, document, collection).await
    }

    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        StoreBackend::update_document(self, filter, update, collection).await
    }

    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_document(self, id, collection).await
    }

    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        StoreBackend::create_text_index(self, collection, fields).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
