// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! General API tests.
//!
//! These tests verify that:
//! 1. The health endpoint responds
//! 2. The sync blob round-trips and last write wins
//! 3. Stats adjustments accept negative amounts and report level-ups
//! 4. Auth routes map missing accounts and bad providers to the right codes

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _store) = common::create_test_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_sync_blob_round_trip() {
    let (app, _store) = common::create_test_app();

    // Never set: an empty object, not an error
    let response = app.clone().oneshot(get("/data")).await.unwrap();
    assert_eq!(body_json(response).await, serde_json::json!({}));

    app.clone()
        .oneshot(post_json("/data", serde_json::json!({"layout": "grid"})))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/data", serde_json::json!({"layout": "list"})))
        .await
        .unwrap();

    let response = app.oneshot(get("/data")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"layout": "list"})
    );
}

#[tokio::test]
async fn test_stats_adjust_and_level_up() {
    let (app, _store) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/stats/alice/xp", serde_json::json!({"amount": 120})))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["xp"], serde_json::json!(120));
    assert_eq!(body["level"], serde_json::json!(2));
    assert_eq!(body["leveled_up"], serde_json::json!(true));

    // Gold never levels
    let response = app
        .clone()
        .oneshot(post_json(
            "/stats/alice/gold",
            serde_json::json!({"amount": 500}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["gold"], serde_json::json!(500));
    assert_eq!(body["leveled_up"], serde_json::json!(false));

    // Negative amounts are allowed (spending gold)
    let response = app
        .clone()
        .oneshot(post_json(
            "/stats/alice/gold",
            serde_json::json!({"amount": -200}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["gold"], serde_json::json!(300));
}

#[tokio::test]
async fn test_refresh_without_account_is_auth_required() {
    let (app, _store) = common::create_test_app();

    let response = app.oneshot(get("/auth/refresh/nobody")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await["error"],
        serde_json::json!("auth_required")
    );
}

#[tokio::test]
async fn test_refresh_with_unknown_provider_is_validation_error() {
    let (app, _store) = common::create_test_app();

    let response = app
        .oneshot(get("/auth/refresh/alice?provider=instagram"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (app, _store) = common::create_test_app();

    // Disconnecting an account that was never linked still succeeds
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/auth/accounts/alice/calendar")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["success"],
        serde_json::json!(true)
    );
}

#[tokio::test]
async fn test_agenda_events_rejects_inverted_range() {
    let (app, _store) = common::create_test_app();

    let response = app
        .oneshot(get(
            "/agenda/events?start=2024-06-30T00:00:00Z&end=2024-06-01T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agenda_events_with_no_accounts_is_empty() {
    let (app, _store) = common::create_test_app();

    let response = app
        .oneshot(get(
            "/agenda/events?start=2024-06-01T00:00:00Z&end=2024-06-30T00:00:00Z",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["items"], serde_json::json!([]));
    assert_eq!(body["partial_errors"], serde_json::json!([]));
}
