// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session JWT middleware tests.
//!
//! Resource routes declare the self-issued session policy; these tests
//! drive the real router and check that the failure taxonomy is distinct:
//! missing, malformed and expired credentials each get their own error.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tower::ServiceExt;

mod common;

fn listing_body() -> String {
    serde_json::json!({
        "origin": "Paris",
        "destination": "Dakar",
        "capacity_kg": 12.0,
        "price_per_kg": 9.5,
        "delivery_days": 7,
        "expires_in_days": 30
    })
    .to_string()
}

fn post_listing(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/listings")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder.body(Body::from(listing_body())).unwrap()
}

#[tokio::test]
async fn missing_credential_is_unauthenticated() {
    let (app, _state) = common::create_test_app();

    let response = app.oneshot(post_listing(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn malformed_token_is_distinct_from_missing() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(post_listing(Some("not.a.jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "token_malformed");
}

#[tokio::test]
async fn expired_token_is_distinct_from_malformed() {
    let (app, state) = common::create_test_app();

    // Hand-roll an expired session token with the app's signing key.
    #[derive(serde::Serialize)]
    struct Claims {
        sub: String,
        seller: bool,
        exp: usize,
        iat: usize,
    }
    let claims = Claims {
        sub: "acc_1".to_string(),
        seller: true,
        exp: 1_000_000,
        iat: 999_000,
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(&state.config.jwt_signing_key),
    )
    .unwrap();

    let response = app.oneshot(post_listing(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn wrong_key_is_malformed() {
    let (app, _state) = common::create_test_app();

    let token = common::create_test_session_jwt("acc_1", true, b"some_other_signing_key_entirely");

    let response = app.oneshot(post_listing(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "token_malformed");
}

#[tokio::test]
async fn non_seller_claims_are_honored_without_db_lookup() {
    let (app, state) = common::create_test_app();

    // seller=false in the claims; the database is offline, so reaching the
    // 403 proves the middleware took the flag from the token itself.
    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let response = app.oneshot(post_listing(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let (app, state) = common::create_test_app();

    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let request = Request::builder()
        .method("POST")
        .uri("/api/listings")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("kiloshare_token={}", token))
        .body(Body::from(listing_body()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    // Same non-seller 403 as the bearer path: the cookie worked.
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_browse_needs_no_credential() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
