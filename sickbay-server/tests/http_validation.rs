//! Router-level tests for requests rejected before any query runs.
//!
//! The pool is created lazily against a closed port, so a test that
//! accidentally reaches the database fails instead of passing.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sickbay_server::models::AntiTheftPolicy;
use sickbay_server::{build_router, AppState};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgres://sickbay@127.0.0.1:1/unreachable")
        .expect("lazy pool");

    let state = AppState {
        pool,
        online: None,
        anti_theft: AntiTheftPolicy::default(),
    };
    build_router(Arc::new(state), false)
}

async fn send(method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn warehouse_path(suffix: &str) -> String {
    format!("/api/warehouses/{}/{}", Uuid::new_v4(), suffix)
}

#[tokio::test]
async fn health_reports_unreachable_and_disabled_stores() {
    let (status, body) = send(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["offline"], "unreachable");
    assert_eq!(body["online"], "disabled");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn blank_warehouse_name_is_400() {
    let (status, body) = send(Method::POST, "/api/warehouses", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "name cannot be empty");
}

#[tokio::test]
async fn malformed_json_is_400_with_error_body() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/warehouses")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn non_uuid_path_is_400() {
    let (status, body) = send(Method::GET, "/api/students/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "id: invalid UUID format");
}

#[tokio::test]
async fn short_password_is_400() {
    let (status, body) = send(
        Method::POST,
        &warehouse_path("users"),
        Some(json!({
            "username": "nurse.joy",
            "password": "short",
            "full_name": "Joy",
            "role": "nurse"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password must be at least 8 characters");
}

#[tokio::test]
async fn unknown_role_is_400() {
    let (status, body) = send(
        Method::POST,
        &warehouse_path("users"),
        Some(json!({
            "username": "nurse.joy",
            "password": "long enough",
            "full_name": "Joy",
            "role": "janitor"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn impossible_username_login_is_401() {
    let (status, body) = send(
        Method::POST,
        "/api/auth/login",
        Some(json!({ "username": "x", "password": "whatever1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn invalid_blood_group_is_400() {
    let (status, body) = send(
        Method::POST,
        &warehouse_path("students"),
        Some(json!({
            "matric_number": "MED/2021/7",
            "first_name": "Bisi",
            "last_name": "Ade",
            "blood_group": "C+"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid blood group value: 'C+'");
}

#[tokio::test]
async fn empty_price_patch_is_400() {
    let uri = format!("/api/products/{}/price", Uuid::new_v4());
    let (status, body) = send(Method::PATCH, &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "prices cannot be empty");
}

#[tokio::test]
async fn zero_stock_change_is_400() {
    let uri = format!("/api/products/{}/stock", Uuid::new_v4());
    let (status, _) = send(
        Method::POST,
        &uri,
        Some(json!({ "quantity_change": 0, "reason": "restock" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_quantity_dispense_is_400() {
    let (status, body) = send(
        Method::POST,
        &warehouse_path("drug-tracking"),
        Some(json!({ "product_id": Uuid::new_v4(), "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "quantity must be greater than zero");
}

#[tokio::test]
async fn consultation_with_bad_payment_is_400() {
    let (status, body) = send(
        Method::POST,
        &warehouse_path("consultations"),
        Some(json!({
            "student_id": Uuid::new_v4(),
            "items": [{ "product_id": Uuid::new_v4(), "quantity": 1 }],
            "payments": [{ "method": "cheque", "amount": "10.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid payment method value: 'cheque'");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = send(Method::GET, "/api/nothing-here", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
