//! Route table and handlers.
//!
//! | Verb | Path | Operation |
//! |---|---|---|
//! | GET | `/` | prompt |
//! | GET | `/collections/{name}` | find all |
//! | GET | `/collections/{name}/{max}/{sortAspect}/{sortAscDesc}` | find limited and sorted |
//! | GET | `/collections/{name}/{id}` | find one |
//! | GET | `/search?term=` | text search on `lessons` |
//! | POST | `/collections/{name}` | insert (orders are validated) |
//! | PUT | `/collections/{name}/{id}` | set fields |
//! | PUT | `/collections/{name}/{id}/spaces` | take one space on a lesson |
//! | DELETE | `/collections/{name}/{id}` | delete one |
//! | GET | `/lesson-images/{file}` | static images |
//!
//! Anything else, including an unsupported verb on a known path, answers 404.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query as QueryParams, State, rejection::JsonRejection},
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    routing::{MethodRouter, get, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use docgate_core::{
    collection::SpaceOutcome,
    document::{DocumentBody, LESSONS_COLLECTION},
    id::Identifier,
    query::{Limit, Query, Update},
    store::DynDocumentStore,
};

use crate::{
    config::{ConfigError, GatewayConfig},
    error::{ApiError, ApiResult},
    resolve::ResolvedCollection,
    response::PrettyJson,
};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    store: Arc<DynDocumentStore>,
}

impl AppState {
    pub fn new(store: Arc<DynDocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<DynDocumentStore> {
        Arc::clone(&self.store)
    }
}

/// Builds the gateway router over `state`.
///
/// # Errors
///
/// Fails if a configured CORS origin is not a valid header value.
pub fn build_router(state: AppState, config: &GatewayConfig) -> Result<Router, ConfigError> {
    let cors = CorsLayer::new()
        .allow_origin(config.server.allow_origin()?)
        .allow_methods(Any)
        .allow_headers(Any);
    let images = ServeDir::new(&config.assets.lesson_images_dir)
        .not_found_service(image_not_found.into_service());

    let router: Router = Router::new()
        .route("/", with_404(get(root)))
        .route("/search", with_404(get(search)))
        .route(
            "/collections/{name}",
            with_404(get(find_all).post(insert_document)),
        )
        .route(
            "/collections/{name}/{id}",
            with_404(get(find_by_id).put(update_document).delete(delete_document)),
        )
        .route("/collections/{name}/{id}/spaces", with_404(put(take_space)))
        // The third segment is `max` here; the matcher needs one name per position.
        .route(
            "/collections/{name}/{id}/{sort_aspect}/{sort_direction}",
            with_404(get(find_sorted)),
        )
        .nest_service("/lesson-images", images)
        .fallback(route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(router)
}

fn with_404(router: MethodRouter<AppState>) -> MethodRouter<AppState> {
    router.fallback(route_not_found)
}

async fn root() -> &'static str {
    "Select a collection"
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotMatched
}

async fn image_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Image not found")
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

async fn find_all(collection: ResolvedCollection) -> ApiResult<PrettyJson<Value>> {
    let documents = collection.handle().find_all().await?;

    Ok(PrettyJson::documents(&documents))
}

async fn find_sorted(
    collection: ResolvedCollection,
    Path((_, max, sort_aspect, sort_direction)): Path<(String, String, String, String)>,
) -> ApiResult<PrettyJson<Value>> {
    let limit = Limit::parse(&max);
    if limit == Limit::NotANumber {
        warn!(collection = collection.name(), %max, "limit is not a number, returning all documents");
    }

    let documents = collection
        .handle()
        .find(Query::sorted(limit, &sort_aspect, &sort_direction))
        .await?;

    Ok(PrettyJson::documents(&documents))
}

async fn find_by_id(
    collection: ResolvedCollection,
    Path((_, id)): Path<(String, String)>,
) -> ApiResult<PrettyJson<Value>> {
    let id: Identifier = id.parse()?;

    match collection.handle().find_by_id(id).await? {
        Some(document) => Ok(PrettyJson::document(&document)),
        None => Err(ApiError::NotFound("Document not found")),
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    term: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<PrettyJson<Value>> {
    let term = params
        .term
        .ok_or_else(|| ApiError::BadRequest("Missing search term".to_string()))?;

    let documents = state
        .store
        .collection(LESSONS_COLLECTION)
        .search(&term)
        .await?;

    Ok(PrettyJson::documents(&documents))
}

async fn insert_document(
    collection: ResolvedCollection,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<PrettyJson<Value>> {
    let body = DocumentBody::for_collection(collection.name(), json_body(body)?)?;
    if let DocumentBody::Order(order) = &body {
        info!(customer = order.name(), lessons = order.lesson_ids().len(), "order received");
    }
    let inserted = collection.handle().insert(body).await?;

    Ok(PrettyJson(json!({
        "acknowledged": true,
        "insertedId": inserted.id.to_hex(),
        "document": PrettyJson::document(&inserted.document).0,
    })))
}

async fn update_document(
    collection: ResolvedCollection,
    Path((_, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<PrettyJson<Value>> {
    let id: Identifier = id.parse()?;
    let update = Update::set_from_json(json_body(body)?)?;

    let outcome = collection.handle().update_by_id(id, update).await?;
    if outcome.matched == 0 {
        return Err(ApiError::NotFound("Document not found"));
    }
    if outcome.modified == 0 {
        return Err(ApiError::NotFound("Document not modified"));
    }

    Ok(PrettyJson(json!({ "message": "Document updated successfully" })))
}

async fn take_space(
    State(state): State<AppState>,
    Path((_, id)): Path<(String, String)>,
) -> ApiResult<PrettyJson<Value>> {
    let id: Identifier = id.parse()?;

    match state.store.collection(LESSONS_COLLECTION).take_space(id).await? {
        SpaceOutcome::Taken => Ok(PrettyJson(json!({ "message": "Updated successfully" }))),
        SpaceOutcome::NotFound => Err(ApiError::NotFound("Lesson not found")),
        SpaceOutcome::Exhausted => Err(ApiError::NotFound("No space available")),
    }
}

async fn delete_document(
    collection: ResolvedCollection,
    Path((_, id)): Path<(String, String)>,
) -> ApiResult<PrettyJson<Value>> {
    let id: Identifier = id.parse()?;

    if !collection.handle().delete_by_id(id).await? {
        return Err(ApiError::NotFound("Document not found"));
    }

    Ok(PrettyJson(json!({ "message": "Document deleted successfully" })))
}
