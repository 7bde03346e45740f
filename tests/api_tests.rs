// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! HTTP API tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Meeting transitions map their rejections to the documented statuses
//! 3. The inbound push relay answers 202 for good, malformed and unreadable
//!    payloads
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{test_profile, TestApp};

async fn two_people() -> TestApp {
    let app = TestApp::new();
    app.seed([
        test_profile("1", "Alice", 46.0, 6.0, &["music"]),
        test_profile("2", "Bob", 46.0005, 6.0, &["music"]),
    ])
    .await;
    app
}

/// Send `method uri` as `uid` with an optional JSON body.
async fn call(
    app: &TestApp,
    uid: &str,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, app.bearer(uid));
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app.router.clone(), request).await
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTHENTICATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::new();

    let (status, _) = send(
        app.router.clone(),
        Request::builder()
            .method("GET")
            .uri("/api/me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = TestApp::new();

    let (status, _) = send(
        app.router.clone(),
        Request::builder()
            .method("GET")
            .uri("/api/me")
            .header(header::AUTHORIZATION, "Bearer invalid.token.here")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let app = two_people().await;
    let token = app.bearer("1").trim_start_matches("Bearer ").to_string();

    let (status, body) = send(
        app.router.clone(),
        Request::builder()
            .method("GET")
            .uri("/api/me")
            .header(header::COOKIE, format!("icebreakrr_token={}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uid"], "1");
    assert_eq!(body["name"], "Alice");
}

#[tokio::test]
async fn test_me_without_profile_is_not_found() {
    let app = TestApp::new();
    let (status, body) = call(&app, "ghost", "GET", "/api/me", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_create_profile() {
    let app = TestApp::new();
    let (status, body) = call(
        &app,
        "7",
        "POST",
        "/api/me",
        Some(json!({"name": "Eve", "gender": "FEMALE", "birthDate": "2000-02-29"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["uid"], "7");
    assert_eq!(body["meetingRequestSent"], json!([]));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let app = TestApp::new();

    let (status, body) = send(
        app.router.clone(),
        Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["offline"], true);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

// ═══════════════════════════════════════════════════════════════════════════
// MEETINGS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_meeting_flow_over_http() {
    let app = two_people().await;

    let (status, body) = call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/request",
        Some(json!({"message": "Hey, meet?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["peer"], "2");
    assert_eq!(body["state"], "sent");

    let (_, body) = call(&app, "2", "GET", "/api/meetings/1", None).await;
    assert_eq!(body["state"], "received");
    assert_eq!(body["message"], "Hey, meet?");

    let (status, body) = call(&app, "2", "POST", "/api/meetings/1/accept", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "location_pending");

    let (status, body) = call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/location",
        Some(json!({"latitude": 46.0, "longitude": 6.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "confirmed");
    assert_eq!(body["latitude"], 46.0);

    let (status, body) = call(
        &app,
        "2",
        "POST",
        "/api/meetings/1/cancel",
        Some(json!({"reason": "CLOSED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "cancelled");

    let (_, body) = call(&app, "2", "POST", "/api/meetings/1/cancel", None).await;
    assert_eq!(body["outcome"], "already_cancelled");
}

#[tokio::test]
async fn test_meeting_rejections_map_to_statuses() {
    let app = two_people().await;

    // Accept with nothing open
    let (status, body) = call(&app, "2", "POST", "/api/meetings/1/accept", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/request",
        Some(json!({"message": "Hi"})),
    )
    .await;
    call(&app, "2", "POST", "/api/meetings/1/accept", None).await;

    // Rendezvous point too far away
    let (status, body) = call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/location",
        Some(json!({"latitude": 46.05, "longitude": 6.0})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_meeting_radius");

    // Unknown cancellation reason
    let (status, _) = call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/cancel",
        Some(json!({"reason": "BORED"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Blocked pair
    call(&app, "1", "POST", "/api/profiles/2/block", None).await;
    let (status, body) = call(
        &app,
        "2",
        "POST",
        "/api/meetings/1/request",
        Some(json!({"message": "Hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "blocked");
}

// ═══════════════════════════════════════════════════════════════════════════
// SETTINGS & INBOUND PUSHES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_hiding_clears_location() {
    let app = two_people().await;

    let (status, body) = call(
        &app,
        "1",
        "PUT",
        "/api/settings",
        Some(json!({"isDiscoverable": false, "selectedRadiusM": 2000.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selectedRadiusM"], 2000.0);

    assert!(app.profile("1").await.location().is_none());
    assert!(app.profile("1").await.geohash().is_none());

    let (_, body) = call(&app, "1", "GET", "/api/settings", None).await;
    assert_eq!(body["isDiscoverable"], false);
}

#[tokio::test]
async fn test_inbound_push_relay() {
    let app = two_people().await;
    call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/request",
        Some(json!({"message": "Hey"})),
    )
    .await;

    let (status, body) = call(
        &app,
        "2",
        "POST",
        "/push/inbound",
        Some(json!({
            "title": "MEETING REQUEST",
            "message": "Hey",
            "senderUID": "1",
            "senderName": "Alice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["event"]["type"], "request_received");

    let (status, body) = call(
        &app,
        "2",
        "POST",
        "/push/inbound",
        Some(json!({
            "title": "MEETING CANCELLATION",
            "message": "BECAUSE",
            "senderUID": "1",
            "senderName": "Alice"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "dropped");
    assert!(app.profile("2").await.has_meeting_with(&"1".into()));
}

#[tokio::test]
async fn test_inbound_push_with_missing_fields_is_dropped() {
    let app = two_people().await;

    let (status, body) = call(
        &app,
        "2",
        "POST",
        "/push/inbound",
        Some(json!({"title": "MEETING CANCELLATION", "senderUID": "1"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "dropped");

    let request = Request::builder()
        .method("POST")
        .uri("/push/inbound")
        .header(header::AUTHORIZATION, app.bearer("2"))
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(app.router.clone(), request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "dropped");
}

#[tokio::test]
async fn test_block_reports_whether_newly_blocked() {
    let app = two_people().await;

    let (status, body) = call(&app, "1", "POST", "/api/profiles/2/block", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);

    let (status, body) = call(&app, "1", "POST", "/api/profiles/2/block", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], false);
}

#[tokio::test]
async fn test_delete_account_over_http() {
    let app = two_people().await;
    call(
        &app,
        "1",
        "POST",
        "/api/meetings/2/request",
        Some(json!({"message": "Hey"})),
    )
    .await;

    let (status, body) = call(&app, "1", "DELETE", "/api/account", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["purged"], 1);
    assert!(!app.profile("2").await.has_meeting_with(&"1".into()));
}
