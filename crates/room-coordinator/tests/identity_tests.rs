//! Identity verification tests against a mock JWKS endpoint.
//!
//! Tokens are signed with the RSA fixture key from `rc-test-utils`; the
//! verifier fetches the matching public key over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use rc_test_utils::{build_test_app, TestIdentityProvider, TestServerOptions};
use room_coordinator::auth::{IdentityVerifier, JwksClient, JwtIdentityVerifier};
use room_coordinator::errors::RoomError;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT_ID: &str = "roulette-test";

async fn jwks_server(provider: &TestIdentityProvider) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(provider.jwks()))
        .mount(&server)
        .await;
    server
}

fn verifier(server: &MockServer) -> JwtIdentityVerifier {
    JwtIdentityVerifier::new(
        Arc::new(JwksClient::new(format!("{}/jwks", server.uri()))),
        PROJECT_ID.to_string(),
        Duration::from_secs(300),
    )
}

#[tokio::test]
async fn test_valid_token_yields_subject() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let user = verifier(&server)
        .verify(&provider.mint("firebase-uid-1"))
        .await
        .unwrap();

    assert_eq!(user.user_id, "firebase-uid-1");
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", "another-project");
    let server = jwks_server(&provider).await;

    let result = verifier(&server).verify(&provider.mint("uid")).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let mut claims = provider.claims_for("uid");
    claims["iss"] = serde_json::json!("https://evil.example.com/roulette-test");

    let result = verifier(&server).verify(&provider.mint_claims(&claims)).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let now = chrono::Utc::now().timestamp();
    let mut claims = provider.claims_for("uid");
    claims["iat"] = serde_json::json!(now - 7200);
    claims["exp"] = serde_json::json!(now - 3600);

    let result = verifier(&server).verify(&provider.mint_claims(&claims)).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_token_from_the_future_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let now = chrono::Utc::now().timestamp();
    let mut claims = provider.claims_for("uid");
    claims["iat"] = serde_json::json!(now + 3600);
    claims["exp"] = serde_json::json!(now + 7200);

    let result = verifier(&server).verify(&provider.mint_claims(&claims)).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_empty_subject_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let result = verifier(&server).verify(&provider.mint("")).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_unknown_kid_is_rejected() {
    let published = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&published).await;
    let rotated = TestIdentityProvider::new("key-2", PROJECT_ID);

    let result = verifier(&server).verify(&rotated.mint("uid")).await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let result = verifier(&server).verify("not-a-jwt").await;

    assert!(matches!(result, Err(RoomError::Auth(_))));
}

#[tokio::test]
async fn test_jwks_outage_is_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);

    let result = verifier(&server).verify(&provider.mint("uid")).await;

    assert!(matches!(result, Err(RoomError::ExternalService(_))));
}

#[tokio::test]
async fn test_join_with_real_identity_token() {
    let provider = TestIdentityProvider::new("key-1", PROJECT_ID);
    let server = jwks_server(&provider).await;

    let options = TestServerOptions {
        verifier: Arc::new(verifier(&server)),
        ..TestServerOptions::default()
    };
    let (app, _) = build_test_app(options).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/join-randomroom")
        .header(
            "authorization",
            format!("Bearer {}", provider.mint("firebase-uid-7")),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let forged = TestIdentityProvider::new("key-1", "someone-else");
    let request = Request::builder()
        .method("POST")
        .uri("/join-randomroom")
        .header("authorization", format!("Bearer {}", forged.mint("uid")))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
