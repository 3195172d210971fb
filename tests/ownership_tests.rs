// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ownership isolation, interest toggling and the completion gate
//! (Firestore emulator).

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, Utc};
use kiloshare::models::Account;
use kiloshare::time_utils::{format_utc_rfc3339, now_rfc3339};
use tower::ServiceExt;

mod common;

/// Seed an account straight into the emulator and mint its session token.
async fn seed_account(
    db: &kiloshare::db::FirestoreDb,
    signing_key: &[u8],
    is_seller: bool,
) -> (Account, String) {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let now = now_rfc3339();
    let account = Account {
        id: format!("acc{}", suffix),
        firebase_uid: Some(format!("acc{}", suffix)),
        handle: format!("user{}", &suffix[..12]),
        email: format!("user{}@example.org", &suffix[..12]),
        password_hash: None,
        photo_url: None,
        country: "Kenya".to_string(),
        phone: None,
        bio: None,
        is_seller,
        rating_sum: 0,
        rating_count: 0,
        trips_completed: 0,
        created_at: now.clone(),
        updated_at: now,
    };

    db.create_account(&account).await.expect("seed account");

    let token = common::create_test_session_jwt(&account.id, is_seller, signing_key);
    (account, token)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn create_listing(app: &axum::Router, token: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            "/api/listings",
            token,
            Some(serde_json::json!({
                "origin": "Paris",
                "destination": "Dakar",
                "capacity_kg": 20.0,
                "price_per_kg": 8.0,
                "delivery_days": 10,
                "expires_in_days": 30
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await
}

#[tokio::test]
async fn non_owner_mutations_are_forbidden_and_change_nothing() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_test_app_with_db(db.clone());

    let (_owner, owner_token) = seed_account(&db, &state.config.jwt_signing_key, true).await;
    let (_other, other_token) = seed_account(&db, &state.config.jwt_signing_key, true).await;

    let listing = create_listing(&app, &owner_token).await;
    let listing_id = listing["id"].as_str().unwrap().to_string();

    // Update attempt by a non-owner
    let update = app
        .clone()
        .oneshot(authed(
            "PUT",
            &format!("/api/listings/{}", listing_id),
            &other_token,
            Some(serde_json::json!({ "price_per_kg": 1.0 })),
        ))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::FORBIDDEN);

    // Delete attempt by a non-owner
    let delete = app
        .clone()
        .oneshot(authed(
            "DELETE",
            &format!("/api/listings/{}", listing_id),
            &other_token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    // Stored state is untouched
    let stored = db.get_listing(&listing_id).await.unwrap().unwrap();
    assert_eq!(stored.price_per_kg, 8.0);
    assert!(!stored.completed);
}

#[tokio::test]
async fn interest_toggle_is_idempotent_per_caller() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_test_app_with_db(db.clone());

    let (_owner, owner_token) = seed_account(&db, &state.config.jwt_signing_key, true).await;
    let (buyer, buyer_token) = seed_account(&db, &state.config.jwt_signing_key, false).await;

    let listing = create_listing(&app, &owner_token).await;
    let uri = format!("/api/listings/{}/interest", listing["id"].as_str().unwrap());

    let first = app
        .clone()
        .oneshot(authed("POST", &uri, &buyer_token, None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = common::body_json(first).await;
    assert_eq!(first["interested"], true);
    assert_eq!(first["count"], 1);
    assert_eq!(first["users"][0]["id"], buyer.id.as_str());

    // Toggling again returns the caller to the original state.
    let second = app
        .clone()
        .oneshot(authed("POST", &uri, &buyer_token, None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = common::body_json(second).await;
    assert_eq!(second["interested"], false);
    assert_eq!(second["count"], 0);

    // Owners cannot mark interest in their own listing.
    let own = app
        .oneshot(authed("POST", &uri, &owner_token, None))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completion_is_gated_and_one_way() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_test_app_with_db(db.clone());

    let (owner, owner_token) = seed_account(&db, &state.config.jwt_signing_key, true).await;
    let (_other, other_token) = seed_account(&db, &state.config.jwt_signing_key, true).await;

    // Fresh listing: the horizon has not passed, completion must fail.
    let fresh = create_listing(&app, &owner_token).await;
    let fresh_uri = format!("/api/listings/{}/complete", fresh["id"].as_str().unwrap());
    let early = app
        .clone()
        .oneshot(authed("POST", &fresh_uri, &owner_token, None))
        .await
        .unwrap();
    assert_eq!(early.status(), StatusCode::BAD_REQUEST);

    // Backdated listing: created 40 days ago with a 30 day horizon.
    let old = kiloshare::models::Listing {
        id: format!("lst{}", uuid::Uuid::new_v4().simple()),
        owner_id: owner.id.clone(),
        origin: "Paris".to_string(),
        destination: "Dakar".to_string(),
        capacity_kg: 20.0,
        price_per_kg: 8.0,
        delivery_days: 10,
        expires_in_days: 30,
        completed: false,
        interested: Vec::new(),
        sales_count: 0,
        rating_sum: 0,
        rating_count: 0,
        created_at: format_utc_rfc3339(Utc::now() - Duration::days(40)),
        updated_at: now_rfc3339(),
    };
    db.insert_listing(&old).await.unwrap();
    let old_uri = format!("/api/listings/{}/complete", old.id);

    // Non-owner cannot complete it even past the horizon.
    let foreign = app
        .clone()
        .oneshot(authed("POST", &old_uri, &other_token, None))
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    // Owner completes it exactly once; the trip counter moves with it.
    let trips_before = db
        .get_account(&owner.id)
        .await
        .unwrap()
        .unwrap()
        .trips_completed;

    let complete = app
        .clone()
        .oneshot(authed("POST", &old_uri, &owner_token, None))
        .await
        .unwrap();
    assert_eq!(complete.status(), StatusCode::OK);
    let body = common::body_json(complete).await;
    assert_eq!(body["completed"], true);

    let owner_after = db.get_account(&owner.id).await.unwrap().unwrap();
    assert_eq!(owner_after.trips_completed, trips_before + 1);

    // No undo path: a second completion attempt fails.
    let again = app
        .oneshot(authed("POST", &old_uri, &owner_token, None))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);

    let stored = db.get_listing(&old.id).await.unwrap().unwrap();
    assert!(stored.completed);
}
