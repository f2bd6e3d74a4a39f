//! HTTP surface tests.
//!
//! Most tests drive the real router in-process with `oneshot`; the last
//! group goes through a spawned server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rc_test_utils::{
    assert_registry_consistent, build_test_app, TestRoomServer, TestServerOptions,
    TEST_ACCESS_KEY, TEST_APP_SECRET,
};
use room_coordinator::repositories::{InMemoryRoomRegistry, RoomRegistry};
use room_coordinator::services::provisioner::mock::MockRoomProvisioner;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    build_test_app(TestServerOptions::default()).unwrap().0
}

fn app_with_registry() -> (Router, Arc<dyn RoomRegistry>) {
    let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new());
    let options = TestServerOptions {
        registry: registry.clone(),
        ..TestServerOptions::default()
    };
    (build_test_app(options).unwrap().0, registry)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn join_request(user: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/join-randomroom")
        .header("authorization", format!("Bearer {user}"))
        .body(Body::empty())
        .unwrap()
}

fn leave_request(user: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/leave-room")
        .header("authorization", format!("Bearer {user}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn decode_token(token: &str) -> Value {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    decode::<Value>(
        token,
        &DecodingKey::from_secret(TEST_APP_SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims
}

// ============================================================================
// Public endpoints
// ============================================================================

#[tokio::test]
async fn test_liveness_text() {
    let response = app()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Token Generation Server is running!");
}

#[tokio::test]
async fn test_metrics_endpoint_is_public() {
    let response = app()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = app()
        .oneshot(Request::get("/generate-app-token").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_join_without_token_is_unauthorized() {
    let request = Request::builder()
        .method("POST")
        .uri("/join-randomroom")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("www-authenticate"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Unauthorized: No token provided");
}

#[tokio::test]
async fn test_management_token_requires_auth() {
    let request = Request::builder()
        .method("POST")
        .uri("/generate-management-token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Join
// ============================================================================

#[tokio::test]
async fn test_join_returns_room_participants_and_token() {
    let app = app();

    let (status, first) = send(&app, join_request("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["participants"], serde_json::json!(["alice"]));

    let (status, second) = send(&app, join_request("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["roomID"], first["roomID"]);
    assert_eq!(second["participants"], serde_json::json!(["alice", "bob"]));

    let claims = decode_token(second["token"].as_str().unwrap());
    assert_eq!(claims["type"], "app");
    assert_eq!(claims["access_key"], TEST_ACCESS_KEY);
    assert_eq!(claims["room_id"], second["roomID"]);
    assert_eq!(claims["user_id"], "bob");
    assert_eq!(claims["role"], "host");
    assert_eq!(claims["version"], 2);
}

#[tokio::test]
async fn test_repeat_join_is_bad_request_with_room_id() {
    let app = app();

    let (_, first) = send(&app, join_request("alice")).await;
    let (status, body) = send(&app, join_request("alice")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["roomid"], first["roomID"]);
    assert_eq!(body["error"], "User is already in a room");
}

#[tokio::test]
async fn test_join_provisioning_failure_is_server_error() {
    let options = TestServerOptions {
        provisioner: Arc::new(MockRoomProvisioner::failing()),
        ..TestServerOptions::default()
    };
    let app = build_test_app(options).unwrap().0;

    let (status, body) = send(&app, join_request("alice")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "External service request failed");
    assert!(body["details"].as_str().unwrap().contains("Failed to create room"));
}

// ============================================================================
// Leave
// ============================================================================

#[tokio::test]
async fn test_leave_after_join() {
    let (app, registry) = app_with_registry();

    let (_, joined) = send(&app, join_request("alice")).await;
    let room_id = joined["roomID"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        leave_request("alice", &format!(r#"{{"roomId":"{room_id}"}}"#)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User successfully left the room");
    assert_eq!(body["success"], true);
    assert_eq!(body["roomID"], room_id.as_str());
    assert!(registry.get(&room_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_leave_without_room_id_is_bad_request() {
    let app = app();

    for payload in ["{}", r#"{"roomId":"  "}"#, "not json"] {
        let (status, body) = send(&app, leave_request("alice", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "roomId is required");
    }
}

#[tokio::test]
async fn test_leave_unknown_room_is_not_found() {
    let (status, body) = send(&app(), leave_request("alice", r#"{"roomId":"nope"}"#)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Room not found");
}

#[tokio::test]
async fn test_leave_by_non_member_is_bad_request() {
    let app = app();

    let (_, joined) = send(&app, join_request("alice")).await;
    let room_id = joined["roomID"].as_str().unwrap();

    let (status, _) = send(
        &app,
        leave_request("mallory", &format!(r#"{{"roomId":"{room_id}"}}"#)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_body_user_id_is_ignored() {
    let (app, registry) = app_with_registry();

    let (_, joined) = send(&app, join_request("alice")).await;
    let room_id = joined["roomID"].as_str().unwrap().to_string();

    // mallory names alice in the body; the verified identity still decides
    let (status, _) = send(
        &app,
        leave_request(
            "mallory",
            &format!(r#"{{"roomId":"{room_id}","userId":"alice"}}"#),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        registry.membership("alice").await.unwrap(),
        Some(room_id)
    );
}

// ============================================================================
// Management token
// ============================================================================

#[tokio::test]
async fn test_generate_management_token() {
    let request = Request::builder()
        .method("POST")
        .uri("/generate-management-token")
        .header("authorization", "Bearer operator")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app(), request).await;

    assert_eq!(status, StatusCode::OK);
    let claims = decode_token(body["token"].as_str().unwrap());
    assert_eq!(claims["type"], "management");
    assert_eq!(claims["access_key"], TEST_ACCESS_KEY);
    assert!(claims.get("room_id").is_none());
}

// ============================================================================
// Spawned server
// ============================================================================

#[tokio::test]
async fn test_spawned_server_join_and_leave_flow() -> Result<(), anyhow::Error> {
    let server = TestRoomServer::spawn().await?;
    let client = reqwest::Client::new();

    let joined: Value = client
        .post(format!("{}/join-randomroom", server.url()))
        .bearer_auth("alice")
        .send()
        .await?
        .json()
        .await?;
    let room_id = joined["roomID"].as_str().unwrap_or_default().to_string();

    let response = client
        .post(format!("{}/join-randomroom", server.url()))
        .bearer_auth("bob")
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/leave-room", server.url()))
        .bearer_auth("alice")
        .json(&serde_json::json!({ "roomId": room_id }))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let room = server.registry().get(&room_id).await?.expect("room should remain");
    assert_eq!(room.room.participants, vec!["bob"]);
    assert!(!room.room.is_full);
    assert_registry_consistent(server.registry().as_ref()).await;

    Ok(())
}
