// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.
//!
//! All of these fail before any database access, so they run offline.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn authed_post(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn negative_price_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", true, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "origin": "Paris",
        "destination": "Dakar",
        "capacity_kg": 12.0,
        "price_per_kg": -4.0,
        "delivery_days": 7,
        "expires_in_days": 30
    });

    let response = app
        .oneshot(authed_post("/api/listings", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_capacity_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", true, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "origin": "Paris",
        "destination": "Dakar",
        "capacity_kg": 0.0,
        "price_per_kg": 4.0,
        "delivery_days": 7,
        "expires_in_days": 30
    });

    let response = app
        .oneshot(authed_post("/api/listings", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn container_body(departure: &str, arrival: &str) -> serde_json::Value {
    serde_json::json!({
        "origin_port": "Rotterdam",
        "destination_port": "Mombasa",
        "capacity_cbm": 8.0,
        "price_per_cbm": 120.0,
        "container_type": "dry_van40",
        "tax_clearance": "included",
        "departure_date": departure,
        "arrival_date": arrival,
        "expires_in_days": 60
    })
}

#[tokio::test]
async fn arrival_must_be_after_departure() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", true, &state.config.jwt_signing_key);

    let body = container_body("2026-09-20T00:00:00Z", "2026-09-01T00:00:00Z");

    let response = app
        .oneshot(authed_post("/api/containers", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn equal_departure_and_arrival_are_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", true, &state.config.jwt_signing_key);

    let body = container_body("2026-09-01T00:00:00Z", "2026-09-01T00:00:00Z");

    let response = app
        .oneshot(authed_post("/api/containers", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_container_type_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", true, &state.config.jwt_signing_key);

    let mut body = container_body("2026-09-01T00:00:00Z", "2026-09-20T00:00:00Z");
    body["container_type"] = serde_json::json!("submarine");

    let response = app
        .oneshot(authed_post("/api/containers", &token, body))
        .await
        .unwrap();

    // Enum membership is enforced at deserialization time.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn out_of_range_rating_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "seller_id": "acc_2",
        "rating": 6,
        "comment": "great"
    });

    let response = app
        .oneshot(authed_post("/api/reviews", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn self_review_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "seller_id": "acc_1",
        "rating": 5,
        "comment": "flawless, would recommend myself"
    });

    let response = app
        .oneshot(authed_post("/api/reviews", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conversation_requires_participation() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "seller_id": "acc_2",
        "buyer_id": "acc_3"
    });

    let response = app
        .oneshot(authed_post("/api/conversations", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn zero_quantity_order_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_session_jwt("acc_1", false, &state.config.jwt_signing_key);

    let body = serde_json::json!({
        "listing_id": "lst_1",
        "listing_kind": "luggage",
        "quantity": 0.0
    });

    let response = app
        .oneshot(authed_post("/api/orders", &token, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_zero_is_rejected() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/listings?page=0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
