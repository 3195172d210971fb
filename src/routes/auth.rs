// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: legacy registration/login, identity sync, profile.

use axum::{
    extract::State,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_session_jwt, AuthUser, RawIdToken, SESSION_COOKIE};
use crate::models::account::{normalize_handle, Account, AccountView, COUNTRY_NOT_SPECIFIED};
use crate::services::identity::VerifiedIdentity;
use crate::services::password::{hash_password, verify_password};
use crate::services::reconcile::ProfileSync;
use crate::time_utils::now_rfc3339;
use crate::AppState;

/// Routes open to everyone (legacy email/password flow).
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes behind Firebase token verification only (no local account yet).
pub fn firebase_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/sync", post(sync))
}

/// Routes behind Firebase token verification plus account resolution.
pub fn identity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/account", delete(delete_account))
}

/// Session cookie mirroring the issued JWT.
fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

// ─── Legacy Registration / Login ─────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30))]
    handle: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    country: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    email: String,
    password: String,
}

/// Session-bearing auth response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub account: AccountView,
    pub profile_complete: bool,
    pub token: String,
}

/// Legacy direct registration with a password.
async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let handle = normalize_handle(&payload.handle);
    if handle.is_empty() {
        return Err(AppError::Validation("Username must not be empty".to_string()));
    }

    let now = now_rfc3339();
    let account = Account {
        id: uuid::Uuid::new_v4().to_string(),
        firebase_uid: None,
        handle,
        email: payload.email.trim().to_lowercase(),
        password_hash: Some(hash_password(&payload.password)?),
        photo_url: None,
        country: payload
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| COUNTRY_NOT_SPECIFIED.to_string()),
        phone: payload.phone,
        bio: None,
        is_seller: false,
        rating_sum: 0,
        rating_count: 0,
        trips_completed: 0,
        created_at: now.clone(),
        updated_at: now,
    };

    state.db.create_account(&account).await?;

    tracing::info!(account_id = %account.id, handle = %account.handle, "Account registered");

    let token = create_session_jwt(&account.id, account.is_seller, &state.config.jwt_signing_key)
        .map_err(AppError::Internal)?;

    let response = AuthResponse {
        profile_complete: account.profile_complete(),
        account: account.view(),
        token: token.clone(),
    };

    Ok((jar.add(session_cookie(&token)), Json(response)))
}

/// Legacy email/password login.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();

    // One failure message for unknown email and wrong password, so the
    // endpoint cannot be used to enumerate accounts.
    let account = state
        .db
        .find_account_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid email or password".to_string()))?;

    let Some(stored_hash) = account.password_hash.as_deref() else {
        return Err(AppError::Validation(
            "This account signs in through its identity provider".to_string(),
        ));
    };

    if !verify_password(&payload.password, stored_hash) {
        return Err(AppError::Validation("Invalid email or password".to_string()));
    }

    let token = create_session_jwt(&account.id, account.is_seller, &state.config.jwt_signing_key)
        .map_err(AppError::Internal)?;

    let response = AuthResponse {
        profile_complete: account.profile_complete(),
        account: account.view(),
        token: token.clone(),
    };

    Ok((jar.add(session_cookie(&token)), Json(response)))
}

// ─── Identity Sync (reconciliation) ──────────────────────────

#[derive(Default, Deserialize, Validate)]
pub struct SyncRequest {
    #[validate(length(max = 30))]
    handle: Option<String>,
    #[validate(length(max = 60))]
    country: Option<String>,
    #[validate(url)]
    photo_url: Option<String>,
    #[validate(length(max = 30))]
    phone: Option<String>,
    #[validate(length(max = 500))]
    bio: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    pub account: AccountView,
    pub profile_complete: bool,
    pub is_new_account: bool,
    pub token: String,
}

/// Reconcile the verified Firebase identity with a local account.
///
/// The body is optional: a bare sync after sign-in just find-or-creates.
async fn sync(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<VerifiedIdentity>,
    Extension(RawIdToken(raw_token)): Extension<RawIdToken>,
    jar: CookieJar,
    payload: Option<Json<SyncRequest>>,
) -> Result<(CookieJar, Json<SyncResponse>)> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let fields = ProfileSync {
        handle: payload.handle,
        country: payload.country,
        photo_url: payload.photo_url,
        phone: payload.phone,
        bio: payload.bio,
    };

    let outcome = state
        .reconcile
        .reconcile(&identity, &raw_token, fields)
        .await?;

    tracing::info!(
        account_id = %outcome.account.id,
        is_new_account = outcome.is_new_account,
        profile_complete = outcome.profile_complete,
        "Identity sync complete"
    );

    let token = create_session_jwt(
        &outcome.account.id,
        outcome.account.is_seller,
        &state.config.jwt_signing_key,
    )
    .map_err(AppError::Internal)?;

    let response = SyncResponse {
        account: outcome.account.view(),
        profile_complete: outcome.profile_complete,
        is_new_account: outcome.is_new_account,
        token: token.clone(),
    };

    Ok((jar.add(session_cookie(&token)), Json(response)))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub account: AccountView,
    pub profile_complete: bool,
}

/// Current account for a verified Firebase identity.
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let account = state
        .db
        .get_account(&user.account_id)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    Ok(Json(MeResponse {
        profile_complete: account.profile_complete(),
        account: account.view(),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the caller's own account and everything it owns.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Extension(RawIdToken(raw_token)): Extension<RawIdToken>,
) -> Result<Json<DeleteAccountResponse>> {
    let account = state
        .db
        .get_account(&user.account_id)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    let deleted = state.db.delete_account_data(&account).await?;

    // The external identity goes last; if this fails the local data is
    // already gone and the user can simply delete it from their provider.
    if let Err(e) = state.identity.delete_account(&raw_token).await {
        tracing::warn!(error = %e, account_id = %account.id, "External identity deletion failed");
    }

    tracing::info!(account_id = %account.id, deleted, "Account deleted by owner");

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account and all associated data removed".to_string(),
    }))
}
