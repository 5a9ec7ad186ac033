use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use seriesmanager_api::{
    db::MemoryStore,
    middleware::auth::JwtVerifier,
    routes::{create_router, AppState},
    services::{
        catalog::{CatalogError, SeasonCatalog},
        ReconcileOptions,
    },
};

const SECRET: &str = "test-secret";

/// Catalog answering from a fixed table; unknown ids come back malformed
struct FakeCatalog(HashMap<i32, Vec<u32>>);

#[async_trait::async_trait]
impl SeasonCatalog for FakeCatalog {
    async fn seasons_of(&self, catalog_id: i32) -> Result<Vec<u32>, CatalogError> {
        self.0
            .get(&catalog_id)
            .cloned()
            .ok_or_else(|| CatalogError::Malformed(format!("no show {}", catalog_id)))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn create_test_server(catalog: &[(i32, Vec<u32>)]) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let catalog = FakeCatalog(catalog.iter().cloned().collect());
    let state = AppState::new(
        store.clone(),
        store,
        Arc::new(catalog),
        ReconcileOptions::default(),
        JwtVerifier::new(SECRET),
    );
    TestServer::new(create_router(state)).unwrap()
}

fn bearer(user_id: &str) -> HeaderValue {
    let token = JwtVerifier::new(SECRET)
        .issue(user_id, chrono::Duration::hours(1))
        .unwrap();
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn add_series(server: &TestServer, user_id: &str, sid: i32, title: &str) -> i64 {
    let response = server
        .post("/api/series")
        .add_header(AUTHORIZATION, bearer(user_id))
        .json(&json!({
            "sid": sid,
            "title": title,
            "poster": "poster.jpg",
            "episodeLength": 40
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"]["id"].as_i64().unwrap()
}

async fn add_season(server: &TestServer, user_id: &str, series_id: i64, number: i32) -> Value {
    let response = server
        .post("/api/seasons")
        .add_header(AUTHORIZATION, bearer(user_id))
        .json(&json!({
            "seriesId": series_id,
            "number": number,
            "episodes": 10,
            "image": format!("s{}.jpg", number)
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    body["data"].clone()
}

async fn seasons_of(server: &TestServer, user_id: &str, series_id: i64) -> Vec<Value> {
    let response = server
        .get(&format!("/api/seasons/series/{}", series_id))
        .add_header(AUTHORIZATION, bearer(user_id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["data"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(&[]);
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server(&[]);
    let request_id = "7f1c2a3e-1b2c-4d5e-8f90-a1b2c3d4e5f6";

    let response = server
        .get("/health")
        .add_header(
            seriesmanager_api::middleware::request_id::REQUEST_ID_HEADER
                .parse::<axum::http::HeaderName>()
                .unwrap(),
            HeaderValue::from_static(request_id),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-request-id"), request_id);
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let server = create_test_server(&[]);

    let response = server.get("/api/seasons/continue").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/series")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_continue_watching_flow() {
    let server = create_test_server(&[(42, vec![1, 2, 3]), (43, vec![1, 2])]);

    let behind = add_series(&server, "alice", 42, "Dark").await;
    add_season(&server, "alice", behind, 1).await;
    add_season(&server, "alice", behind, 2).await;

    let ahead = add_series(&server, "alice", 43, "Severance").await;
    for number in 1..=3 {
        add_season(&server, "alice", ahead, number).await;
    }

    let response = server
        .get("/api/seasons/continue")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "complete");
    let series = body["data"]["series"].as_array().unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0]["title"], "Dark");
    assert_eq!(series[0]["missingCount"], 1);
}

#[tokio::test]
async fn test_continue_watching_reports_catalog_failures() {
    let server = create_test_server(&[(42, vec![1, 2])]);

    let healthy = add_series(&server, "alice", 42, "Dark").await;
    let broken = add_series(&server, "alice", 99, "Unknown").await;

    let response = server
        .get("/api/seasons/continue")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "partial");
    assert_eq!(body["data"]["series"][0]["seriesId"], healthy);
    assert_eq!(body["data"]["series"][0]["missingCount"], 2);
    assert_eq!(body["data"]["failedSeries"], json!([broken]));
}

#[tokio::test]
async fn test_add_season_is_idempotent() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Dark").await;

    let first = add_season(&server, "alice", series_id, 1).await;
    let response = server
        .post("/api/seasons")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({
            "seriesId": series_id,
            "number": 1,
            "episodes": 12,
            "image": "updated.jpg"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let seasons = seasons_of(&server, "alice", series_id).await;
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0]["id"], first["id"]);
    assert_eq!(seasons[0]["episodes"], 12);
    assert_eq!(seasons[0]["image"], "updated.jpg");
}

#[tokio::test]
async fn test_add_season_rejects_malformed_payload() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Dark").await;

    let response = server
        .post("/api/seasons")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "seriesId": series_id, "episodes": 10 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/seasons")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "seriesId": "nope" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/seasons")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({
            "seriesId": series_id,
            "number": 1,
            "episodes": 10,
            "image": "i".repeat(200)
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(seasons_of(&server, "alice", series_id).await.is_empty());
}

#[tokio::test]
async fn test_bulk_add_shares_viewed_at() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Dark").await;

    let payload = json!({
        "seriesId": series_id.to_string(),
        "viewedAt": "2024-05-01T20:00:00Z",
        "seasons": [
            { "number": 1, "episodes": 10 },
            { "number": 2, "episodes": 8 },
            { "number": 3, "episodes": 8 }
        ]
    });

    for _ in 0..2 {
        let response = server
            .post("/api/seasons/series/all")
            .add_header(AUTHORIZATION, bearer("alice"))
            .json(&payload)
            .await;
        response.assert_status_ok();
    }

    let seasons = seasons_of(&server, "alice", series_id).await;
    assert_eq!(seasons.len(), 3);
    assert!(seasons
        .iter()
        .all(|s| s["viewedAt"] == seasons[0]["viewedAt"] && !s["viewedAt"].is_null()));
}

#[tokio::test]
async fn test_bulk_add_to_foreign_series_writes_nothing() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "bob", 42, "Dark").await;

    let response = server
        .post("/api/seasons/series/all")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({
            "seriesId": series_id.to_string(),
            "seasons": [
                { "number": 1, "episodes": 10 },
                { "number": 2, "episodes": 10 },
                { "number": 3, "episodes": 10 }
            ]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert!(seasons_of(&server, "bob", series_id).await.is_empty());
}

#[tokio::test]
async fn test_update_and_viewed_details() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Dark").await;
    let season = add_season(&server, "alice", series_id, 1).await;
    add_season(&server, "alice", series_id, 2).await;
    let season_id = season["id"].as_i64().unwrap();

    let response = server
        .patch(&format!("/api/seasons/{}", season_id))
        .add_header(AUTHORIZATION, bearer("bob"))
        .json(&json!({ "viewedAt": "2024-05-01T20:00:00Z" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .patch(&format!("/api/seasons/{}", season_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "viewedAt": "2024-05-01T20:00:00Z" }))
        .await;
    response.assert_status_ok();

    let response = server
        .get(&format!("/api/seasons/series/{}/viewed", series_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(
        body["data"],
        json!([{ "number": 1, "total": 1 }, { "number": 2, "total": 0 }])
    );

    let response = server
        .get(&format!("/api/seasons/1/series/{}/infos", series_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"][0]["duration"], 400);
    assert_eq!(body["data"][0]["viewedAt"], "2024-05-01T20:00:00Z");
}

#[tokio::test]
async fn test_duplicate_series_conflicts() {
    let server = create_test_server(&[]);
    add_series(&server, "alice", 42, "Dark").await;

    let response = server
        .post("/api/series")
        .add_header(AUTHORIZATION, bearer("alice"))
        .json(&json!({ "sid": 42, "title": "Dark", "episodeLength": 40 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_series_search_and_infos() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Breaking Bad").await;
    add_series(&server, "alice", 43, "Dark").await;
    add_season(&server, "alice", series_id, 1).await;
    add_season(&server, "alice", series_id, 2).await;

    let response = server
        .get("/api/series/titles/bad")
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["title"], "Breaking Bad");

    let response = server
        .get(&format!("/api/series/{}/infos", series_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["seasons"], 2);
    assert_eq!(body["data"]["episodes"], 20);
    assert_eq!(body["data"]["duration"], 800);
    assert!(body["data"]["beginAt"].is_null());
}

#[tokio::test]
async fn test_delete_series_cascades_and_foreign_delete_fails() {
    let server = create_test_server(&[]);
    let series_id = add_series(&server, "alice", 42, "Dark").await;
    let season = add_season(&server, "alice", series_id, 1).await;

    let response = server
        .delete(&format!("/api/seasons/{}", season["id"]))
        .add_header(AUTHORIZATION, bearer("bob"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(seasons_of(&server, "alice", series_id).await.len(), 1);

    let response = server
        .delete(&format!("/api/series/{}", series_id))
        .add_header(AUTHORIZATION, bearer("bob"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .delete(&format!("/api/series/{}", series_id))
        .add_header(AUTHORIZATION, bearer("alice"))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    assert!(seasons_of(&server, "alice", series_id).await.is_empty());
}
