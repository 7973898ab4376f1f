use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use stockroom_api::app::services::AppServices;
use stockroom_auth::{JwtClaims, Role};
use stockroom_core::{ProductId, UserId, WarehouseId};
use stockroom_infra::AppConfig;
use stockroom_infra::store::InMemoryStore;
use stockroom_purchasing::{Product, Warehouse};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Warehouse 1, product 5 (stock 20), product 6 (stock 0).
    async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_warehouse(Warehouse::named(WarehouseId::new(1), "Main"))
            .unwrap();
        store
            .insert_product(Product::with_stock(ProductId::new(5), "SKU-5", 20))
            .unwrap();
        store
            .insert_product(Product::with_stock(ProductId::new(6), "SKU-6", 0))
            .unwrap();
        Self::start(store).await
    }

    /// No warehouses or products, like a fresh dev server.
    async fn spawn_empty() -> Self {
        Self::start(Arc::new(InMemoryStore::new())).await
    }

    async fn start(store: Arc<InMemoryStore>) -> Self {
        let services = AppServices::in_memory(store.clone(), &AppConfig::default());
        let app = stockroom_api::app::build_app(SECRET.to_string(), services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn stock(&self, id: i64) -> i64 {
        self.store.product(ProductId::new(id)).unwrap().unwrap().stock
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, user_id: i64, role: Role, ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        user_id: UserId::new(user_id),
        role,
        warehouse_id: Some(WarehouseId::new(1)),
        issued_at: Some(now - ChronoDuration::seconds(5)),
        expires_at: now + ttl,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token() -> String {
    mint_jwt(SECRET, 7, Role::Staff, ChronoDuration::minutes(10))
}

async fn post_purchase(srv: &TestServer, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(srv.url("/purchases"))
        .bearer_auth(token())
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/purchases", "/inventory-movements", "/whoami", "/products", "/products/low-stock"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "unauthorized");
    }

    let forged = mint_jwt("other-secret", 7, Role::Admin, ChronoDuration::minutes(10));
    let res = client
        .get(srv.url("/purchases"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let expired = mint_jwt(SECRET, 7, Role::Admin, ChronoDuration::minutes(-1));
    let res = client
        .get(srv.url("/purchases"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(mint_jwt(SECRET, 42, Role::Manager, ChronoDuration::minutes(10)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], 42);
    assert_eq!(body["role"], "manager");
    assert_eq!(body["warehouse_id"], 1);
}

#[tokio::test]
async fn purchase_lifecycle_create_get_list() {
    let srv = TestServer::spawn().await;

    let res = post_purchase(
        &srv,
        json!({
            "warehouse_id": 1,
            "items": [
                { "product_id": 5, "quantity": 10 },
                { "product_id": 6, "quantity": 4, "unit_price": 2.5 }
            ]
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["message"], "purchase created successfully");
    let purchase = &created["purchase"];
    assert_eq!(purchase["warehouse_id"], 1);
    assert_eq!(purchase["created_by"], 7);
    assert_eq!(purchase["items"].as_array().unwrap().len(), 2);
    let id = purchase["id"].as_i64().unwrap();

    assert_eq!(srv.stock(5), 30);
    assert_eq!(srv.stock(6), 4);

    let client = reqwest::Client::new();
    let res = client
        .get(srv.url(&format!("/purchases?id={id}")))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["purchase"]["id"], id);
    assert_eq!(fetched["purchase"]["items"][1]["unit_price"], 2.5);

    let res = client
        .get(srv.url("/purchases"))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed["purchases"].as_array().unwrap().len(), 1);

    let res = client
        .get(srv.url("/inventory-movements?product_id=5"))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let movements: Value = res.json().await.unwrap();
    let movements = movements["movements"].as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["movement_type"], "purchase");
    assert_eq!(movements[0]["quantity"], 10);
    assert_eq!(movements[0]["reference_type"], "purchase");
    assert_eq!(movements[0]["reference_id"], id);
}

#[tokio::test]
async fn purchases_are_listed_newest_first() {
    let srv = TestServer::spawn().await;
    let mut ids = Vec::new();
    for qty in [1, 2, 3] {
        let res = post_purchase(
            &srv,
            json!({ "warehouse_id": 1, "items": [{ "product_id": 6, "quantity": qty }] }),
        )
        .await;
        let body: Value = res.json().await.unwrap();
        ids.push(body["purchase"]["id"].as_i64().unwrap());
    }

    let listed: Value = reqwest::Client::new()
        .get(srv.url("/purchases"))
        .bearer_auth(token())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed: Vec<i64> = listed["purchases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();

    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn unknown_product_is_404_and_writes_nothing() {
    let srv = TestServer::spawn().await;

    let res = post_purchase(
        &srv,
        json!({
            "warehouse_id": 1,
            "items": [
                { "product_id": 5, "quantity": 10 },
                { "product_id": 999, "quantity": 1 }
            ]
        }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "product not found: product_id=999");

    assert_eq!(srv.stock(5), 20);
    assert_eq!(srv.store.purchase_count().unwrap(), 0);
    assert_eq!(srv.store.movement_count().unwrap(), 0);
}

#[tokio::test]
async fn unknown_warehouse_is_404() {
    let srv = TestServer::spawn().await;
    let res = post_purchase(
        &srv,
        json!({ "warehouse_id": 42, "items": [{ "product_id": 5, "quantity": 1 }] }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "warehouse not found");
}

#[tokio::test]
async fn invalid_bodies_are_400() {
    let srv = TestServer::spawn().await;

    let cases = [
        (json!({ "warehouse_id": 1, "items": [] }), "purchase items are required"),
        (json!({ "warehouse_id": 1 }), "purchase items are required"),
        (
            json!({ "warehouse_id": 1, "items": [{ "product_id": 5, "quantity": 0 }] }),
            "quantity must be greater than zero",
        ),
        (
            json!({ "warehouse_id": 1, "items": [{ "product_id": 5, "quantity": -3 }] }),
            "quantity must be greater than zero",
        ),
    ];

    for (body, message) in cases {
        let res = post_purchase(&srv, body).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], message);
    }

    let res = reqwest::Client::new()
        .post(srv.url("/purchases"))
        .bearer_auth(token())
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    assert_eq!(srv.store.purchase_count().unwrap(), 0);
}

#[tokio::test]
async fn missing_purchase_is_404_and_bad_id_is_400() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/purchases?id=12345"))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "purchase not found");

    let res = client
        .get(srv.url("/purchases?id=abc"))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commit_failure_is_500_without_detail() {
    let srv = TestServer::spawn().await;
    srv.store.fail_next_commit();

    let res = post_purchase(
        &srv,
        json!({ "warehouse_id": 1, "items": [{ "product_id": 5, "quantity": 10 }] }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "internal storage error");
    assert_eq!(srv.stock(5), 20);
}

#[tokio::test]
async fn concurrent_posts_sum_stock() {
    let srv = Arc::new(TestServer::spawn().await);

    let handles: Vec<_> = (1..=10)
        .map(|qty| {
            let srv = srv.clone();
            tokio::spawn(async move {
                post_purchase(
                    &srv,
                    json!({ "warehouse_id": 1, "items": [{ "product_id": 6, "quantity": qty }] }),
                )
                .await
                .status()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    assert_eq!(srv.stock(6), 55);
}

async fn post_json(srv: &TestServer, path: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(srv.url(path))
        .bearer_auth(token())
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn get_json(srv: &TestServer, path: &str) -> Value {
    let res = reqwest::Client::new()
        .get(srv.url(path))
        .bearer_auth(token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "{path}");
    res.json().await.unwrap()
}

#[tokio::test]
async fn catalog_created_over_http_accepts_purchases() {
    let srv = TestServer::spawn_empty().await;

    let res = post_purchase(
        &srv,
        json!({ "warehouse_id": 1, "items": [{ "product_id": 1, "quantity": 1 }] }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = post_json(
        &srv,
        "/warehouses",
        json!({ "name": "Main", "location": "Dock 4" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "warehouse created successfully");
    assert_eq!(body["warehouse"]["location"], "Dock 4");
    let warehouse_id = body["warehouse"]["id"].as_i64().unwrap();

    let res = post_json(
        &srv,
        "/products",
        json!({ "name": "Widget", "sku": "W-1", "price": 4.5, "reorder_level": 5 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["product"]["stock"], 0);
    let product_id = body["product"]["id"].as_i64().unwrap();

    let low = get_json(&srv, "/products/low-stock").await;
    assert_eq!(low["products"][0]["id"], product_id);

    let res = post_purchase(
        &srv,
        json!({ "warehouse_id": warehouse_id, "items": [{ "product_id": product_id, "quantity": 10 }] }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let low = get_json(&srv, "/products/low-stock").await;
    assert!(low["products"].as_array().unwrap().is_empty());

    let products = get_json(&srv, "/products").await;
    assert_eq!(products["products"][0]["stock"], 10);
    assert_eq!(products["products"][0]["price"], 4.5);
}

#[tokio::test]
async fn catalog_rejects_invalid_and_duplicate_rows() {
    let srv = TestServer::spawn().await;

    let res = post_json(&srv, "/products", json!({ "name": "Copy", "sku": "SKU-5" })).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["message"], "product with this sku already exists");

    let res = post_json(&srv, "/products", json!({ "name": "Gadget", "sku": "G-1", "stock": -1 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "stock must not be negative");

    let res = post_json(&srv, "/warehouses", json!({ "name": "" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "warehouse name is required");

    let res = post_json(&srv, "/warehouses", json!({ "location": "nowhere" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let products = get_json(&srv, "/products").await;
    assert_eq!(products["products"].as_array().unwrap().len(), 2);
}
