//! Main document store interface for interacting with document backends.
//!
//! This module provides the two store types:
//!
//! - [`DocumentStore`] - Store bound to a specific backend implementation
//! - [`DynDocumentStore`] - Dynamic dispatch store for runtime backend selection
//!
//! # Example
//!
//! ```ignore
//! use docgate::store::{DocumentStore, IntoDynDocumentStore};
//!
//! let store = DocumentStore::new(backend).into_dyn();
//! let lessons = store.collection("lessons");
//! ```

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::Collection,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets a handle on the collection with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the collection
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Ensures a text index over `fields` exists on `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the index.
    pub async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        self.backend
            .create_text_index(collection, fields)
            .await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// This consumes the store and should be called when no longer needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown operation fails.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend trait object.
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets a handle on the collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), &*self.backend)
    }

    /// Ensures a text index over `fields` exists on `collection`.
    pub async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        self.backend
            .create_text_index(collection, fields)
            .await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await
    }
}

/// Conversion trait for converting a document store into a dynamic owned store.
///
/// This allows the binary to pick a backend at runtime and hand the router a
/// single concrete store type.
pub trait IntoDynDocumentStore {
    /// Converts this store into a dynamic owned store.
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::new(Box::new(self.backend))
    }
}

impl IntoDynDocumentStore for DynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore {
        self
    }
}
