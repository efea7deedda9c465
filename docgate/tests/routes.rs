use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use docgate::{bson::Document, prelude::*};

const ABSENT_ID: &str = "65a1f0c2e4b0a1b2c3d4e5f6";

struct TestApp {
    router: Router,
    _images: TempDir,
}

async fn app_with(configure: impl FnOnce(&mut GatewayConfig)) -> TestApp {
    let images = tempfile::tempdir().unwrap();
    std::fs::write(images.path().join("math.png"), b"png-bytes").unwrap();

    let mut config = GatewayConfig::default();
    config.database.backend = BackendKind::Memory;
    config.assets.lesson_images_dir = images.path().to_path_buf();
    configure(&mut config);

    let store = open_store(&config).await.unwrap();

    TestApp {
        router: GatewayServer::new(config, store).router().unwrap(),
        _images: images,
    }
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

impl TestApp {
    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();

        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.request(Method::GET, uri, None).await
    }

    async fn get_json(&self, uri: &str) -> Value {
        let (status, body) = self.get(uri).await;
        assert_eq!(status, StatusCode::OK, "GET {uri} failed: {body}");
        serde_json::from_str(&body).unwrap()
    }

    /// Inserts a document and returns its identifier.
    async fn insert(&self, collection: &str, document: Value) -> String {
        let (status, body) = self
            .request(Method::POST, &format!("/collections/{collection}"), Some(document))
            .await;
        assert_eq!(status, StatusCode::OK, "insert failed: {body}");

        let inserted: Value = serde_json::from_str(&body).unwrap();
        inserted["insertedId"].as_str().unwrap().to_string()
    }

    async fn seed_lessons(&self) {
        for lesson in [
            json!({ "subject": "Math", "location": "Hendon", "price": 100, "spaces": 5 }),
            json!({ "subject": "English", "location": "Colindale", "price": 80, "spaces": 5 }),
            json!({ "subject": "Music", "location": "Brent Cross", "price": 90, "spaces": 5 }),
            json!({ "subject": "Art", "location": "Golders Green", "price": 95, "spaces": 5 }),
        ] {
            self.insert("lessons", lesson).await;
        }
    }
}

fn prices(documents: &Value) -> Vec<i64> {
    documents
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["price"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn root_prompts_for_a_collection() {
    let app = app().await;

    assert_eq!(app.get("/").await, (StatusCode::OK, "Select a collection".to_string()));
}

#[tokio::test]
async fn missing_collection_lists_empty() {
    let app = app().await;

    assert_eq!(app.get("/collections/nothing-here").await, (StatusCode::OK, "[]".to_string()));
}

#[tokio::test]
async fn insert_then_fetch_by_id() {
    let app = app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/collections/products",
            Some(json!({ "_id": "client-chosen", "title": "Pen", "stock": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let inserted: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(inserted["acknowledged"], json!(true));
    let id = inserted["insertedId"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    assert_eq!(inserted["document"]["_id"], json!(id));

    let fetched = app.get_json(&format!("/collections/products/{id}")).await;
    assert_eq!(fetched, json!({ "_id": id, "title": "Pen", "stock": 3 }));
}

#[tokio::test]
async fn responses_use_three_space_indent() {
    let app = app().await;
    let id = app.insert("products", json!({ "title": "Pen" })).await;

    let (_, body) = app.get(&format!("/collections/products/{id}")).await;
    assert!(body.starts_with("{\n   \""), "unexpected body: {body}");
}

#[tokio::test]
async fn absent_identifier_is_not_found() {
    let app = app().await;
    app.insert("products", json!({ "title": "Pen" })).await;

    assert_eq!(
        app.get(&format!("/collections/products/{ABSENT_ID}")).await,
        (StatusCode::NOT_FOUND, "Document not found".to_string())
    );
}

#[tokio::test]
async fn malformed_identifier_is_rejected() {
    let app = app().await;
    let expected = (StatusCode::BAD_REQUEST, "Invalid document identifier".to_string());

    assert_eq!(app.get("/collections/products/not-an-id").await, expected);
    assert_eq!(
        app.request(Method::DELETE, "/collections/products/123", None).await,
        expected
    );
    assert_eq!(
        app.request(Method::PUT, "/collections/products/xyz", Some(json!({ "a": 1 }))).await,
        expected
    );
    assert_eq!(
        app.request(Method::PUT, "/collections/lessons/xyz/spaces", None).await,
        expected
    );
}

/// Delegates to an in-memory store, counting every call that reaches it.
#[derive(Debug)]
struct CountingBackend {
    inner: InMemoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingBackend {
    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for CountingBackend {
    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.record();
        StoreBackend::query_documents(&self.inner, query, collection).await
    }

    async fn get_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<Option<Document>> {
        self.record();
        StoreBackend::get_document(&self.inner, id, collection).await
    }

    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Identifier> {
        self.record();
        StoreBackend::insert_document(&self.inner, document, collection).await
    }

    async fn update_document(
        &self,
        filter: Expr,
        update: Update,
        collection: &str,
    ) -> DocumentStoreResult<UpdateOutcome> {
        self.record();
        StoreBackend::update_document(&self.inner, filter, update, collection).await
    }

    async fn delete_document(&self, id: Identifier, collection: &str) -> DocumentStoreResult<u64> {
        self.record();
        StoreBackend::delete_document(&self.inner, id, collection).await
    }

    async fn create_text_index(&self, collection: &str, fields: &[String]) -> DocumentStoreResult<()> {
        self.record();
        StoreBackend::create_text_index(&self.inner, collection, fields).await
    }
}

#[tokio::test]
async fn malformed_identifier_is_rejected_before_storage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = CountingBackend {
        inner: InMemoryStore::new(),
        calls: Arc::clone(&calls),
    };
    let images = tempfile::tempdir().unwrap();
    let mut config = GatewayConfig::default();
    config.assets.lesson_images_dir = images.path().to_path_buf();

    let app = TestApp {
        router: GatewayServer::new(config, DocumentStore::new(backend).into_dyn())
            .router()
            .unwrap(),
        _images: images,
    };

    for (method, uri, body) in [
        (Method::GET, "/collections/products/not-an-id", None),
        (Method::PUT, "/collections/products/xyz", Some(json!({ "a": 1 }))),
        (Method::PUT, "/collections/lessons/xyz/spaces", None),
        (Method::DELETE, "/collections/products/123", None),
    ] {
        let (status, _) = app.request(method, uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let (status, _) = app.get(&format!("/collections/products/{ABSENT_ID}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sorted_listing_respects_direction_and_limit() {
    let app = app().await;
    app.seed_lessons().await;

    let desc = app.get_json("/collections/lessons/3/price/desc").await;
    assert_eq!(prices(&desc), vec![100, 95, 90]);

    let asc = app.get_json("/collections/lessons/2/price/asc").await;
    assert_eq!(prices(&asc), vec![80, 90]);

    // anything but the exact literal `desc` sorts ascending
    let other = app.get_json("/collections/lessons/10/price/DESC").await;
    assert_eq!(prices(&other), vec![80, 90, 95, 100]);
}

#[tokio::test]
async fn sorted_listing_limit_edge_cases() {
    let app = app().await;
    app.seed_lessons().await;

    assert_eq!(prices(&app.get_json("/collections/lessons/abc/price/asc").await).len(), 4);
    assert_eq!(prices(&app.get_json("/collections/lessons/0/price/asc").await).len(), 4);
    assert_eq!(prices(&app.get_json("/collections/lessons/-2/price/desc").await), vec![100, 95]);
    assert_eq!(prices(&app.get_json("/collections/lessons/2abc/price/desc").await), vec![100, 95]);
}

#[tokio::test]
async fn orders_require_valid_shape() {
    let app = app().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/collections/orders",
            Some(json!({ "name": "Ada", "phoneNumber": "0700", "lessonIDs": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/collections/orders",
            Some(json!({ "name": "", "phoneNumber": "0700", "lessonIDs": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.get("/collections/orders").await, (StatusCode::OK, "[]".to_string()));

    let lesson = app.insert("lessons", json!({ "subject": "Math", "spaces": 5 })).await;
    app.insert(
        "orders",
        json!({ "name": "Ada", "phoneNumber": "0700", "lessonIDs": [lesson], "spaces": 1 }),
    )
    .await;

    let orders = app.get_json("/collections/orders").await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["name"], json!("Ada"));
}

#[tokio::test]
async fn insert_rejects_non_object_bodies() {
    let app = app().await;

    let (status, _) = app
        .request(Method::POST, "/collections/products", Some(json!([1, 2, 3])))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/collections/products")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/collections/products")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.get("/collections/products").await, (StatusCode::OK, "[]".to_string()));
}

#[tokio::test]
async fn update_sets_fields() {
    let app = app().await;
    let id = app.insert("products", json!({ "title": "Pen", "stock": 3 })).await;
    let uri = format!("/collections/products/{id}");

    let (status, body) = app.request(Method::PUT, &uri, Some(json!({ "stock": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "message": "Document updated successfully" })
    );
    assert_eq!(app.get_json(&uri).await, json!({ "_id": id, "title": "Pen", "stock": 2 }));

    assert_eq!(
        app.request(Method::PUT, &uri, Some(json!({ "stock": 2 }))).await,
        (StatusCode::NOT_FOUND, "Document not modified".to_string())
    );
    assert_eq!(
        app.request(Method::PUT, &format!("/collections/products/{ABSENT_ID}"), Some(json!({ "stock": 1 })))
            .await,
        (StatusCode::NOT_FOUND, "Document not found".to_string())
    );

    let (status, _) = app.request(Method::PUT, &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_rejects_dotted_field_paths() {
    let app = app().await;
    let id = app.insert("products", json!({ "title": "Pen", "stock": 3 })).await;
    let uri = format!("/collections/products/{id}");

    let (status, _) = app
        .request(Method::PUT, &uri, Some(json!({ "stock.count": 2 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.get_json(&uri).await, json!({ "_id": id, "title": "Pen", "stock": 3 }));
}

#[tokio::test]
async fn taking_spaces_stops_at_zero() {
    let app = app().await;
    let id = app.insert("lessons", json!({ "subject": "Math", "spaces": 1 })).await;

    // the collection segment is ignored, spaces always come from lessons
    let (status, body) = app
        .request(Method::PUT, &format!("/collections/anything/{id}/spaces"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "message": "Updated successfully" })
    );

    assert_eq!(
        app.request(Method::PUT, &format!("/collections/lessons/{id}/spaces"), None).await,
        (StatusCode::NOT_FOUND, "No space available".to_string())
    );
    assert_eq!(
        app.request(Method::PUT, &format!("/collections/lessons/{ABSENT_ID}/spaces"), None)
            .await,
        (StatusCode::NOT_FOUND, "Lesson not found".to_string())
    );

    let lesson = app.get_json(&format!("/collections/lessons/{id}")).await;
    assert_eq!(lesson["spaces"], json!(0));
}

#[tokio::test]
async fn delete_removes_once() {
    let app = app().await;
    let id = app.insert("products", json!({ "title": "Pen" })).await;
    let uri = format!("/collections/products/{id}");

    let (status, body) = app.request(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({ "message": "Document deleted successfully" })
    );

    assert_eq!(
        app.request(Method::DELETE, &uri, None).await,
        (StatusCode::NOT_FOUND, "Document not found".to_string())
    );
    assert_eq!(app.get(&uri).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_matches_lessons_text() {
    let app = app().await;
    app.seed_lessons().await;

    let found = app.get_json("/search?term=hendon").await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["subject"], json!("Math"));

    let either = app.get_json("/search?term=music%20art").await;
    assert_eq!(either.as_array().unwrap().len(), 2);

    assert_eq!(app.get_json("/search?term=physics").await, json!([]));

    let (status, _) = app.get("/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_faults_are_generic_500s() {
    let app = app_with(|config| config.search.ensure_index = false).await;
    app.seed_lessons().await;

    assert_eq!(
        app.get("/search?term=math").await,
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    );
}

#[tokio::test]
async fn unmatched_routes_fall_back_to_404() {
    let app = app().await;
    let expected = (StatusCode::NOT_FOUND, "Resource not found!".to_string());

    assert_eq!(app.request(Method::PATCH, "/collections/x", None).await, expected);
    assert_eq!(app.request(Method::POST, "/", None).await, expected);
    assert_eq!(app.get("/nowhere").await, expected);
    assert_eq!(app.get("/collections").await, expected);
    assert_eq!(app.get("/collections/a/b/c").await, expected);
}

#[tokio::test]
async fn lesson_images_are_served() {
    let app = app().await;

    assert_eq!(app.get("/lesson-images/math.png").await, (StatusCode::OK, "png-bytes".to_string()));
    assert_eq!(
        app.get("/lesson-images/missing.png").await,
        (StatusCode::NOT_FOUND, "Image not found".to_string())
    );
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let app = app().await;

    let request = Request::builder()
        .uri("/collections/lessons")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

async fn allowed_origin(app: &TestApp, origin: &str) -> Option<String> {
    let request = Request::builder()
        .uri("/collections/lessons")
        .header(header::ORIGIN, origin)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn cors_wildcard_origin_allows_any() {
    let app = app_with(|config| config.server.cors_origins = vec!["*".to_string()]).await;

    assert_eq!(allowed_origin(&app, "http://example.com").await.as_deref(), Some("*"));
}

#[tokio::test]
async fn cors_origin_list_is_enforced() {
    let app = app_with(|config| {
        config.server.cors_origins = vec!["http://shop.example".to_string()];
    })
    .await;

    assert_eq!(
        allowed_origin(&app, "http://shop.example").await.as_deref(),
        Some("http://shop.example")
    );
    assert_eq!(allowed_origin(&app, "http://elsewhere.example").await, None);
}

#[tokio::test]
async fn invalid_cors_origin_fails_router_construction() {
    let mut config = GatewayConfig::default();
    config.database.backend = BackendKind::Memory;
    config.server.cors_origins = vec!["bad\norigin".to_string()];
    let store = open_store(&config).await.unwrap();

    assert!(matches!(
        GatewayServer::new(config, store).router(),
        Err(ServerError::Config(_))
    ));
}
