//! Collection handles for document store operations.
//!
//! A [`Collection`] binds a collection name to a borrowed backend for the
//! duration of one unit of work (typically one HTTP request). Names are not
//! validated and the collection does not need to exist: reads against a
//! missing collection come back empty and the first write creates it.
//!
//! # Example
//!
//! ```ignore
//! use docgate::{document::DocumentBody, id::Identifier};
//!
//! # async fn example(store: &docgate::store::DynDocumentStore) -> docgate::error::DocumentStoreResult<()> {
//! let lessons = store.collection("lessons");
//! let inserted = lessons
//!     .insert(DocumentBody::Generic(bson::doc! { "subject": "Math", "spaces": 5 }))
//!     .await?;
//! let found = lessons.find_by_id(inserted.id).await?;
//! # Ok(()) }
//! ```

use bson::Document;
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, UpdateOutcome},
    document::{DocumentBody, SPACES_FIELD},
    error::DocumentStoreResult,
    id::{ID_FIELD, Identifier},
    query::{Filter, Query, Update},
};

/// A document freshly written by [`Collection::insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedDocument {
    /// The identifier assigned by the store.
    pub id: Identifier,
    /// The stored fields, including `_id`.
    pub document: Document,
}

/// Result of trying to take one space on a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceOutcome {
    /// The counter was decremented.
    Taken,
    /// No document has the given identifier.
    NotFound,
    /// The document exists but has no space left.
    Exhausted,
}

/// A named collection with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
#[derive(Debug)]
pub struct Collection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> Collection<'a> {
    /// Creates a new collection reference (internal use).
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns every document in the collection in unspecified order.
    pub async fn find_all(&self) -> DocumentStoreResult<Vec<Document>> {
        self.find(Query::new()).await
    }

    /// Queries documents in the collection using a structured query.
    ///
    /// # Arguments
    ///
    /// * `query` - The [`Query`] specifying filter, sort and limit
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Document>> {
        debug!(collection = %self.name, ?query, "querying documents");

        self.backend.query_documents(query, &self.name).await
    }

    /// Retrieves a single document by identifier.
    ///
    /// # Returns
    ///
    /// `None` if no document in the collection has this identifier.
    pub async fn find_by_id(&self, id: Identifier) -> DocumentStoreResult<Option<Document>> {
        debug!(collection = %self.name, %id, "fetching document");

        self.backend.get_document(id, &self.name).await
    }

    /// Runs a free-text search over the collection's text-indexed fields.
    ///
    /// The term is handed to the backend as-is.
    pub async fn search(&self, term: &str) -> DocumentStoreResult<Vec<Document>> {
        self.find(Query::text(term)).await
    }

    /// Inserts a validated body, returning the assigned identifier and the
    /// stored document.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn insert(&self, body: DocumentBody) -> DocumentStoreResult<InsertedDocument> {
        let mut document = body.into_document();
        debug!(collection = %self.name, fields = document.len(), "inserting document");

        let id = self
            .backend
            .insert_document(document.clone(), &self.name)
            .await?;
        document.insert(ID_FIELD, id);

        Ok(InsertedDocument { id, document })
    }

    /// Applies `update` to the document with the given identifier.
    pub async fn update_by_id(
        &self,
        id: Identifier,
        update: Update,
    ) -> DocumentStoreResult<UpdateOutcome> {
        debug!(collection = %self.name, %id, ?update, "updating document");

        self.backend
            .update_document(Filter::id(id), update, &self.name)
            .await
    }

    /// Decrements the `spaces` counter of the document with the given
    /// identifier, never letting it drop below zero.
    ///
    /// When nothing was modified a follow-up lookup tells a missing document
    /// apart from one that is already full.
    pub async fn take_space(&self, id: Identifier) -> DocumentStoreResult<SpaceOutcome> {
        debug!(collection = %self.name, %id, "taking a space");

        let outcome = self
            .backend
            .update_document(
                Filter::id(id).and(Filter::gt(SPACES_FIELD, 0)),
                Update::decrement(SPACES_FIELD),
                &self.name,
            )
            .await?;

        if outcome.modified > 0 {
            return Ok(SpaceOutcome::Taken);
        }

        match self.backend.get_document(id, &self.name).await? {
            Some(_) => Ok(SpaceOutcome::Exhausted),
            None => Ok(SpaceOutcome::NotFound),
        }
    }

    /// Deletes the document with the given identifier.
    ///
    /// # Returns
    ///
    /// `true` if a document was deleted.
    pub async fn delete_by_id(&self, id: Identifier) -> DocumentStoreResult<bool> {
        debug!(collection = %self.name, %id, "deleting document");

        let deleted = self.backend.delete_document(id, &self.name).await?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::StoreBackend,
        query::{Expr, FieldOp},
    };
    use async_trait::async_trait;
    use bson::{Bson, doc};
    use std::sync::Mutex;

    /// Records every call and answers from a single optional document.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        stored: Option<Document>,
        modified: u64,
    }

    impl RecordingBackend {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn query_documents(
            &self,
            query: Query,
            collection: &str,
        ) -> DocumentStoreResult<Vec<Document>> {
            self.record(format!("query {collection} {:?}", query.filter));
            Ok(self.stored.iter().cloned().collect())
        }

        async fn get_document(
            &self,
            id: Identifier,
            collection: &str,
        ) -> DocumentStoreResult<Option<Document>> {
            self.record(format!("get {collection} {id}"));
            Ok(self.stored.clone())
        }

        async fn insert_document(
            &self,
            document: Document,
            collection: &str,
        ) -> DocumentStoreResult<Identifier> {
            self.record(format!("insert {collection} {}", document.len()));
            Ok("65a1f0c2e4b0a1b2c3d4e5f6".parse()?)
        }

        async fn update_document(
            &self,
            filter: Expr,
            _update: Update,
            collection: &str,
        ) -> DocumentStoreResult<UpdateOutcome> {
            let clauses = match filter {
                Expr::And(list) => list.len(),
                _ => 1,
            };
            self.record(format!("update {collection} {clauses}"));
            Ok(UpdateOutcome {
                matched: self.modified,
                modified: self.modified,
            })
        }

        async fn delete_document(
            &self,
            id: Identifier,
            collection: &str,
        ) -> DocumentStoreResult<u64> {
            self.record(format!("delete {collection} {id}"));
            Ok(u64::from(self.stored.is_some()))
        }

        async fn create_text_index(
            &self,
            _collection: &str,
            _fields: &[String],
        ) -> DocumentStoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_insert_returns_document_with_id() {
        let backend = RecordingBackend::default();
        let lessons = Collection::new("lessons".into(), &backend);

        let inserted = lessons
            .insert(DocumentBody::Generic(doc! { "subject": "Art" }))
            .await
            .unwrap();

        assert_eq!(inserted.id.to_hex(), "65a1f0c2e4b0a1b2c3d4e5f6");
        assert_eq!(
            inserted.document.get(ID_FIELD),
            Some(&Bson::ObjectId(inserted.id.as_object_id()))
        );
        assert_eq!(inserted.document.get_str("subject").unwrap(), "Art");
        assert_eq!(backend.calls(), vec!["insert lessons 1".to_string()]);
    }

    #[tokio::test]
    async fn test_search_uses_text_filter() {
        let backend = RecordingBackend::default();
        let lessons = Collection::new("lessons".into(), &backend);

        lessons.search("math").await.unwrap();

        assert_eq!(
            backend.calls(),
            vec![format!("query lessons {:?}", Some(Expr::Text("math".into())))]
        );
    }

    #[tokio::test]
    async fn test_take_space_guards_floor() {
        let backend = RecordingBackend {
            modified: 1,
            ..Default::default()
        };
        let lessons = Collection::new("lessons".into(), &backend);

        let outcome = lessons.take_space(Identifier::generate()).await.unwrap();

        assert_eq!(outcome, SpaceOutcome::Taken);
        // id filter plus the `spaces > 0` guard, and no follow-up lookup
        assert_eq!(backend.calls(), vec!["update lessons 2".to_string()]);
    }

    #[tokio::test]
    async fn test_take_space_distinguishes_missing_from_full() {
        let id = Identifier::generate();

        let missing = RecordingBackend::default();
        assert_eq!(
            Collection::new("lessons".into(), &missing).take_space(id).await.unwrap(),
            SpaceOutcome::NotFound
        );

        let full = RecordingBackend {
            stored: Some(doc! { "_id": id, "spaces": 0 }),
            ..Default::default()
        };
        assert_eq!(
            Collection::new("lessons".into(), &full).take_space(id).await.unwrap(),
            SpaceOutcome::Exhausted
        );
        assert_eq!(full.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_update_by_id_filters_on_id() {
        let backend = RecordingBackend::default();
        let id = Identifier::generate();

        let outcome = Collection::new("orders".into(), &backend)
            .update_by_id(id, Update::Set(doc! { "paid": true }))
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::default());
        assert_eq!(
            Filter::id(id),
            Expr::field(ID_FIELD.into(), FieldOp::Eq, Bson::ObjectId(id.as_object_id()))
        );
    }

    #[tokio::test]
    async fn test_delete_by_id_reports_whether_deleted() {
        let id = Identifier::generate();

        let empty = RecordingBackend::default();
        assert!(!Collection::new("x".into(), &empty).delete_by_id(id).await.unwrap());

        let stored = RecordingBackend {
            stored: Some(doc! { "_id": id }),
            ..Default::default()
        };
        assert!(Collection::new("x".into(), &stored).delete_by_id(id).await.unwrap());
        assert_eq!(stored.calls(), vec![format!("delete x {id}")]);
    }
}
