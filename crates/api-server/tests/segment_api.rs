//! Router tests over the in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use crm_api::rest::ErrorResponse;
use crm_api::segment_rest::PreviewResponse;
use crm_api::{router, AppState};
use crm_core::config::AppConfig;
use crm_core::types::Customer;
use crm_store::{MemoryStore, StoreHandles};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn customer(first_name: &str, status: &str, value: f64) -> Customer {
    Customer {
        id: 0,
        first_name: first_name.into(),
        last_name: "Doe".into(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        phone: None,
        company: Some("Initech".into()),
        industry: Some("Technology".into()),
        status: status.into(),
        value,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
        updated_at: None,
        last_contact: None,
        address: None,
        tags: vec!["VIP".into()],
    }
}

fn app() -> Router {
    let store = MemoryStore::new();
    store.insert_customer(customer("Ann", "Active", 5000.0));
    store.insert_customer(customer("Bob", "Active", 2500.0));
    store.insert_customer(customer("Cid", "Active", 900.0));
    store.insert_customer(customer("Dee", "Inactive", 8000.0));

    let state = AppState::new(&AppConfig::default(), StoreHandles::memory(Arc::new(store)));
    router(state)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create(app: &Router, name: &str, rules: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/segments",
            json!({ "name": name, "criteria": { "rules": rules } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_create_returns_rules_and_live_count() {
    let app = app();
    let body = create(
        &app,
        "High Value Active",
        json!([
            { "field": "status", "operator": "eq", "value": "Active" },
            { "field": "value", "operator": "gt", "value": 1000 }
        ]),
    )
    .await;

    assert_eq!(body["name"], "High Value Active");
    assert_eq!(body["count"], 2);
    assert_eq!(body["rules"].as_array().unwrap().len(), 2);

    let response = app.clone().oneshot(get("/api/segments")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let list: Vec<Value> = body_json(response).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["count"], 2);
}

#[tokio::test]
async fn test_create_rejects_blank_name() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/segments",
            json!({ "name": "   ", "criteria": { "rules": [] } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = body_json(response).await;
    assert_eq!(body.error, "invalid_request");
}

#[tokio::test]
async fn test_preview_counts_without_persisting() {
    let app = app();
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/segments/preview",
            json!({ "rules": [
                { "field": "status", "operator": "eq", "value": "Active" },
                { "field": "password", "operator": "eq", "value": "x" }
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let preview: PreviewResponse = body_json(response).await;
    assert_eq!(preview.count, 3);
    assert_eq!(preview.valid_rules, 1);

    let list: Vec<Value> = body_json(app.oneshot(get("/api/segments")).await.unwrap()).await;
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_export_returns_csv_attachment() {
    let app = app();
    let segment = create(
        &app,
        "Tech Buyers",
        json!([{ "field": "status", "operator": "eq", "value": "Active" }]),
    )
    .await;
    let id = segment["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/segments/{id}/export")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Tech_Buyers_customers.csv\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 4);

    let activities: Vec<Value> =
        body_json(app.oneshot(get("/api/activities")).await.unwrap()).await;
    let actions: Vec<&str> = activities
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["segment_exported", "segment_created"]);
}

#[tokio::test]
async fn test_export_of_non_ascii_segment_name_keeps_utf8_filename() {
    let app = app();
    let segment = create(
        &app,
        "Café Clients",
        json!([{ "field": "status", "operator": "eq", "value": "Active" }]),
    )
    .await;

    let response = app
        .oneshot(get(&format!("/api/segments/{}/export", segment["id"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Caf__Clients_customers.csv\"; \
         filename*=UTF-8''Caf%C3%A9_Clients_customers.csv"
    );
}

#[tokio::test]
async fn test_export_reports_invalid_rules_and_empty_results_differently() {
    let app = app();
    let invalid = create(
        &app,
        "Broken",
        json!([{ "field": "value", "operator": "gt", "value": "lots" }]),
    )
    .await;
    let nobody = create(
        &app,
        "Nobody",
        json!([{ "field": "status", "operator": "eq", "value": "Churned" }]),
    )
    .await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/segments/{}/export", invalid["id"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = body_json(response).await;
    assert_eq!(body.error, "no_valid_rules");

    let response = app
        .oneshot(get(&format!("/api/segments/{}/export", nobody["id"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = body_json(response).await;
    assert_eq!(body.error, "no_matching_records");
}

#[tokio::test]
async fn test_preview_drops_contains_on_free_text_fields() {
    let response = app()
        .oneshot(json_request(
            Method::POST,
            "/api/segments/preview",
            json!({ "rules": [
                { "field": "email", "operator": "contains", "value": "example" },
                { "field": "value", "operator": "gt", "value": "1000 USD" }
            ]}),
        ))
        .await
        .unwrap();
    let preview: PreviewResponse = body_json(response).await;
    assert_eq!(preview.valid_rules, 1);
    assert_eq!(preview.count, 3);
}

/// Deleting an unknown id answers 404 rather than a blanket success.
#[tokio::test]
async fn test_delete_then_missing() {
    let app = app();
    let segment = create(&app, "Temp", json!([])).await;
    assert_eq!(segment["count"], 0);
    let uri = format!("/api/segments/{}", segment["id"]);

    let delete = || {
        Request::builder()
            .method(Method::DELETE)
            .uri(&uri)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = body_json(response).await;
    assert_eq!(body, json!({ "success": true }));

    let response = app.oneshot(delete()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_probes() {
    let app = app();
    for path in ["/health", "/ready", "/live"] {
        let response = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}
