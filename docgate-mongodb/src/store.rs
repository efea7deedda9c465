use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::{debug, info};
use docgate_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{ID_FIELD, Identifier},
    query::{Expr, Query, QueryVisitor, SortDirection, Update},
};

use crate::query::MongoQueryTranslator;


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

fn update_document_for(update: Update) -> Document {
    match update {
        Update::Set(fields) => doc! { "$set": fields },
        Update::Increment { field, by } => doc! { "$inc": { field: by } },
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        let filter = if let Some(expr) = &query.filter {
            MongoQueryTranslator.visit_expr(expr)?
        } else {
            doc! {}
        };
        debug!(collection, %filter, "mongodb find");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn get_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(doc! { ID_FIELD: id })
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Identifier> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(Identifier::from(oid)),
            other => Err(DocumentStoreError::Backend(format!(
                "unexpected inserted id {other}"
            ))),
        }
    }

    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        let filter = MongoQueryTranslator.visit_expr(&filter)?;
        let update = update_document_for(update);
        debug!(collection, %filter, %update, "mongodb update_one");

        let result = self.get_collection(collection)
            .update_one(filter, update)
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(doc! { ID_FIELD: id })
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        let keys = fields
            .iter()
            .map(|field| (field.clone(), Bson::from("text")))
            .collect::<Document>();

        let created = self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                    .name(format!("{collection}_text"))
                    .build()
                )
                .build()
            )
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        info!(collection, index = %created.index_name, "text index ready");

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Connects and pings the database, so that a bad connection string or an
    /// unreachable cluster fails here rather than on the first request.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database))
    }
}
