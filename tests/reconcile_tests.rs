// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity reconciliation integration tests (Firestore emulator).
//!
//! Run with the emulator:
//!   FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

fn sync_request(token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri("/auth/sync")
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn fresh_uid() -> String {
    format!("ext{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn first_sync_synthesizes_an_incomplete_profile() {
    require_emulator!();

    let (app, _state) = common::create_test_app_with_db(common::test_db().await);

    let uid = fresh_uid();
    let token = common::create_firebase_token(&uid, "a@x.com", 3600);

    let response = app.oneshot(sync_request(&token, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;

    assert_eq!(body["is_new_account"], true);
    assert_eq!(body["profile_complete"], false);
    assert_eq!(body["account"]["id"], uid.as_str());
    assert_eq!(body["account"]["country"], "Not specified");

    // localpart + "_" + first six characters of the external id
    let expected_handle = format!("a_{}", &uid[..6]);
    assert_eq!(body["account"]["handle"], expected_handle.as_str());
}

#[tokio::test]
async fn second_sync_is_idempotent_and_can_complete_the_profile() {
    require_emulator!();

    let (app, _state) = common::create_test_app_with_db(common::test_db().await);

    let uid = fresh_uid();
    let token = common::create_firebase_token(&uid, "a@x.com", 3600);

    let first = app
        .clone()
        .oneshot(sync_request(&token, None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = common::body_json(first).await;
    assert_eq!(first["is_new_account"], true);
    assert_eq!(first["profile_complete"], false);

    // Same identity again, this time choosing a handle and a country.
    let handle = format!("alice{}", &uid[3..9]);
    let second = app
        .oneshot(sync_request(
            &token,
            Some(serde_json::json!({ "handle": handle, "country": "Kenya" })),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = common::body_json(second).await;

    assert_eq!(second["is_new_account"], false);
    assert_eq!(second["account"]["id"], first["account"]["id"]);
    assert_eq!(second["account"]["handle"], handle.as_str());
    assert_eq!(second["account"]["country"], "Kenya");
    assert_eq!(second["profile_complete"], true);
}

#[tokio::test]
async fn handles_are_normalized_before_storage() {
    require_emulator!();

    let (app, _state) = common::create_test_app_with_db(common::test_db().await);

    let uid = fresh_uid();
    let token = common::create_firebase_token(&uid, "bob@x.com", 3600);

    let raw_handle = format!("  Bob{}  ", &uid[3..9]);
    let response = app
        .oneshot(sync_request(
            &token,
            Some(serde_json::json!({ "handle": raw_handle, "country": "Ghana" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;

    let expected = raw_handle.trim().to_lowercase();
    assert_eq!(body["account"]["handle"], expected.as_str());
}

#[tokio::test]
async fn duplicate_handle_from_another_identity_conflicts() {
    require_emulator!();

    let (app, _state) = common::create_test_app_with_db(common::test_db().await);

    let uid_a = fresh_uid();
    let uid_b = fresh_uid();
    let handle = format!("carol{}", &uid_a[3..9]);

    let token_a = common::create_firebase_token(&uid_a, "carol-a@x.com", 3600);
    let first = app
        .clone()
        .oneshot(sync_request(
            &token_a,
            Some(serde_json::json!({ "handle": handle, "country": "Kenya" })),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let token_b = common::create_firebase_token(&uid_b, "carol-b@x.com", 3600);
    let second = app
        .oneshot(sync_request(
            &token_b,
            Some(serde_json::json!({ "handle": handle, "country": "Kenya" })),
        ))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = common::body_json(second).await;
    assert_eq!(body["message"], "Username is already taken");
}

#[tokio::test]
async fn legacy_registration_normalizes_and_logs_in() {
    require_emulator!();

    let (app, _state) = common::create_test_app_with_db(common::test_db().await);

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let email = format!("dora{}@example.org", &suffix[..8]);
    let handle = format!("  Dora{}  ", &suffix[..8]);

    let register = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "handle": handle,
                        "email": email,
                        "password": "correct-horse-battery",
                        "country": "Morocco"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(register.status(), StatusCode::OK);
    let body = common::body_json(register).await;
    assert_eq!(body["account"]["handle"], handle.trim().to_lowercase());
    assert_eq!(body["profile_complete"], true);

    let login = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "email": email,
                        "password": "correct-horse-battery"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(login.status(), StatusCode::OK);
    let body = common::body_json(login).await;
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
}
