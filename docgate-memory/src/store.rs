//! In-memory storage implementation for document stores.
//!
//! This module provides a simple in-memory backend that stores documents as
//! BSON documents in ordered maps behind async-safe read-write locks.

use std::{collections::{BTreeMap, HashMap}, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document};
use tracing::debug;

use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{ID_FIELD, Identifier},
    query::{Expr, Query, SortDirection, Update},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

/// Documents of one collection keyed by hex identifier.
type CollectionMap = BTreeMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;
type TextIndexMap = HashMap<String, Vec<String>>;

/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
/// Documents are kept in identifier order, which for freshly generated
/// identifiers is insertion order.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data. Writers are serialized by the lock.
///
/// # Performance
///
/// Queries scan all documents in a collection. Text indexes only record which
/// fields a search runs over; matching is a scan as well.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_document(doc! { "subject": "Math", "spaces": 5 }, "lessons").await?;
///     let lesson = store.get_document(id, "lessons").await?;
///     assert!(lesson.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
    /// Text-indexed fields per collection
    text_indexes: Arc<RwLock<TextIndexMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    ///
    /// The returned store is ready for use and contains no collections or documents.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            text_indexes: Arc::new(RwLock::new(TextIndexMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docgate_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder()
    ///     .text_index("lessons", ["subject", "location"])
    ///     .build()
    ///     .await
    ///     .unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn apply_update(document: &mut Document, update: &Update) -> DocumentStoreResult<bool> {
    match update {
        Update::Set(fields) => {
            let mut changed = false;

            for (key, value) in fields {
                if document.get(key) != Some(value) {
                    document.insert(key.clone(), value.clone());
                    changed = true;
                }
            }

            Ok(changed)
        }
        Update::Increment { field, by } => {
            let next = match document.get(field) {
                None => Bson::Int64(*by),
                Some(Bson::Int32(current)) => match i32::try_from(*by)
                    .ok()
                    .and_then(|by| current.checked_add(by))
                {
                    Some(sum) => Bson::Int32(sum),
                    None => Bson::Int64(i64::from(*current) + by),
                },
                Some(Bson::Int64(current)) => Bson::Int64(current.saturating_add(*by)),
                Some(Bson::Double(current)) => Bson::Double(current + *by as f64),
                Some(other) => {
                    return Err(DocumentStoreError::Backend(format!(
                        "cannot apply $inc to field `{field}` of type {:?}",
                        other.element_type()
                    )));
                }
            };

            document.insert(field.clone(), next);

            Ok(*by != 0)
        }
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let text_fields = match &query.filter {
            Some(filter) if contains_text(filter) => self
                .text_indexes
                .read()
                .await
                .get(collection)
                .cloned(),
            _ => None,
        };

        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => {
                if text_fields.is_none() && query.filter.as_ref().is_some_and(contains_text) {
                    return Err(DocumentStoreError::Backend(
                        "text index required for $text query".to_string(),
                    ));
                }
                return Ok(vec![]);
            }
        };

        // Apply filter expressions if present
        let mut documents = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(
                collection_map.values(),
                filter,
                text_fields.as_deref(),
            )?,
            None => collection_map
                .values()
                .cloned()
                .collect::<Vec<_>>(),
        };

        // Apply sorting if specified
        if let Some(sort) = &query.sort {
            let null = Bson::Null;

            documents.sort_by(|a, b| {
                let left = Comparable::from(a.get(&sort.field).unwrap_or(&null));
                let right = Comparable::from(b.get(&sort.field).unwrap_or(&null));

                match sort.direction {
                    SortDirection::Asc => left.sort_cmp(&right),
                    SortDirection::Desc => right.sort_cmp(&left),
                }
            });
        }

        debug!(collection, matched = documents.len(), "in-memory query");

        Ok(
            documents
                .into_iter()
                .take(query.limit.unwrap_or(usize::MAX))
                .collect()
        )
    }

    async fn get_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<Option<Document>> {
        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|col| col.get(&id.to_hex()))
                .cloned()
        )
    }

    async fn insert_document(&self, mut document: Document, collection: &str) -> DocumentStoreResult<Identifier> {
        let id = Identifier::generate();
        document.insert(ID_FIELD, id);

        self.store
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_hex(), document);

        Ok(id)
    }

    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(UpdateOutcome::default()),
        };

        for document in collection_map.values_mut() {
            if !DocumentEvaluator::new(document, None).evaluate(&filter)? {
                continue;
            }

            let modified = apply_update(document, &update)?;

            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(modified),
            });
        }

        Ok(UpdateOutcome::default())
    }

    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;

        let deleted = store
            .get_mut(collection)
            .and_then(|col| col.remove(&id.to_hex()))
            .is_some();

        Ok(u64::from(deleted))
    }

    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        let mut indexes = self.text_indexes.write().await;

        match indexes.get(collection) {
            Some(existing) if existing.as_slice() != fields => Err(DocumentStoreError::Backend(format!(
                "collection `{collection}` already has a text index over {existing:?}"
            ))),
            Some(_) => Ok(()),
            None => {
                indexes.insert(collection.to_string(), fields.to_vec());
                Ok(())
            }
        }
    }
}

fn contains_text(expr: &Expr) -> bool {
    match expr {
        Expr::Text(_) => true,
        Expr::And(exprs) => exprs.iter().any(contains_text),
        Expr::Field { .. } => false,
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    text_indexes: TextIndexMap,
}

impl InMemoryStoreBuilder {
    /// Declares a text index over `fields` on `collection`.
    pub fn text_index<I, S>(mut self, collection: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_indexes.insert(
            collection.to_string(),
            fields.into_iter().map(Into::into).collect(),
        );
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore {
            store: Arc::new(RwLock::new(StoreMap::new())),
            text_indexes: Arc::new(RwLock::new(self.text_indexes)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docgate_core::query::Filter;

    async fn lessons() -> (InMemoryStore, Vec<Identifier>) {
        let store = InMemoryStore::builder()
            .text_index("lessons", ["subject", "location"])
            .build()
            .await
            .unwrap();

        let mut ids = Vec::new();
        for lesson in [
            doc! { "subject": "Math", "location": "Hendon", "price": 100, "spaces": 5 },
            doc! { "subject": "English", "location": "Colindale", "price": 80, "spaces": 1 },
            doc! { "subject": "Music", "location": "Brent Cross", "price": 90, "spaces": 0 },
        ] {
            ids.push(store.insert_document(lesson, "lessons").await.unwrap());
        }

        (store, ids)
    }

    fn prices(documents: &[Document]) -> Vec<i32> {
        documents
            .iter()
            .map(|doc| doc.get_i32("price").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_identifier() {
        let store = InMemoryStore::new();

        let id = store
            .insert_document(doc! { "subject": "Art" }, "lessons")
            .await
            .unwrap();
        let stored = store.get_document(id, "lessons").await.unwrap().unwrap();

        assert_eq!(stored.get_object_id(ID_FIELD).unwrap(), id.as_object_id());
        assert_eq!(stored.get_str("subject").unwrap(), "Art");
    }

    #[tokio::test]
    async fn test_missing_collection_reads_empty() {
        let store = InMemoryStore::new();

        assert!(store.query_documents(Query::new(), "nope").await.unwrap().is_empty());
        assert!(store.get_document(Identifier::generate(), "nope").await.unwrap().is_none());
        assert_eq!(store.delete_document(Identifier::generate(), "nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sort_and_limit() {
        let (store, _) = lessons().await;

        let desc = store
            .query_documents(Query::builder().sort("price", SortDirection::Desc).limit(2).build(), "lessons")
            .await
            .unwrap();
        assert_eq!(prices(&desc), vec![100, 90]);

        let asc = store
            .query_documents(Query::builder().sort("price", SortDirection::Asc).build(), "lessons")
            .await
            .unwrap();
        assert_eq!(prices(&asc), vec![80, 90, 100]);
    }

    #[tokio::test]
    async fn test_sort_places_missing_fields_first() {
        let store = InMemoryStore::new();
        store.insert_document(doc! { "rank": 2 }, "c").await.unwrap();
        store.insert_document(doc! { "other": true }, "c").await.unwrap();

        let sorted = store
            .query_documents(Query::builder().sort("rank", SortDirection::Asc).build(), "c")
            .await
            .unwrap();

        assert!(sorted[0].get("rank").is_none());
        assert_eq!(sorted[1].get_i32("rank").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_text_search() {
        let (store, _) = lessons().await;

        let found = store.query_documents(Query::text("hendon"), "lessons").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("subject").unwrap(), "Math");

        let none = store.query_documents(Query::text("100"), "lessons").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_text_search_without_index_fails() {
        let store = InMemoryStore::new();
        store.insert_document(doc! { "subject": "Math" }, "lessons").await.unwrap();

        assert!(matches!(
            store.query_documents(Query::text("math"), "lessons").await,
            Err(DocumentStoreError::Backend(_))
        ));
        assert!(matches!(
            store.query_documents(Query::text("math"), "missing").await,
            Err(DocumentStoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_set_update_counts_modifications() {
        let (store, ids) = lessons().await;

        let changed = store
            .update_document(Filter::id(ids[0]), Update::Set(doc! { "price": 120 }), "lessons")
            .await
            .unwrap();
        assert_eq!(changed, UpdateOutcome { matched: 1, modified: 1 });

        let unchanged = store
            .update_document(Filter::id(ids[0]), Update::Set(doc! { "price": 120 }), "lessons")
            .await
            .unwrap();
        assert_eq!(unchanged, UpdateOutcome { matched: 1, modified: 0 });

        let missing = store
            .update_document(Filter::id(Identifier::generate()), Update::Set(doc! { "price": 1 }), "lessons")
            .await
            .unwrap();
        assert_eq!(missing, UpdateOutcome::default());

        let stored = store.get_document(ids[0], "lessons").await.unwrap().unwrap();
        assert_eq!(stored.get_i32("price").unwrap(), 120);
        assert_eq!(stored.get_str("subject").unwrap(), "Math");
    }

    #[tokio::test]
    async fn test_guarded_decrement_stops_at_zero() {
        let (store, ids) = lessons().await;
        let guarded = || Filter::id(ids[1]).and(Filter::gt("spaces", 0));

        let first = store
            .update_document(guarded(), Update::decrement("spaces"), "lessons")
            .await
            .unwrap();
        assert_eq!(first.modified, 1);

        let second = store
            .update_document(guarded(), Update::decrement("spaces"), "lessons")
            .await
            .unwrap();
        assert_eq!(second, UpdateOutcome::default());

        let stored = store.get_document(ids[1], "lessons").await.unwrap().unwrap();
        assert_eq!(stored.get_i32("spaces").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric() {
        let store = InMemoryStore::new();
        let id = store.insert_document(doc! { "spaces": "many" }, "lessons").await.unwrap();

        assert!(store
            .update_document(Filter::id(id), Update::decrement("spaces"), "lessons")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_document() {
        let (store, ids) = lessons().await;

        assert_eq!(store.delete_document(ids[2], "lessons").await.unwrap(), 1);
        assert_eq!(store.delete_document(ids[2], "lessons").await.unwrap(), 0);
        assert_eq!(store.query_documents(Query::new(), "lessons").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_text_index_is_idempotent() {
        let store = InMemoryStore::new();
        let fields = vec!["subject".to_string()];

        store.create_text_index("lessons", &fields).await.unwrap();
        store.create_text_index("lessons", &fields).await.unwrap();
        assert!(store
            .create_text_index("lessons", &["location".to_string()])
            .await
            .is_err());
    }
}
