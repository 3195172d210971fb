// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication middleware.
//!
//! Each route declares which credential policy applies; nothing is
//! auto-detected per request:
//! - [`require_session`]: self-issued HS256 session JWT, claims carry the
//!   account id and seller flag directly (no storage lookup).
//! - [`require_identity`]: Firebase ID token, verified then resolved to a
//!   local account. A missing account is a distinct 404 so clients know to
//!   finish onboarding rather than re-authenticate.
//! - [`require_firebase`]: Firebase ID token verification only, for the
//!   sync endpoint that must run before a local account exists.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session cookie set on login and sync.
pub const SESSION_COOKIE: &str = "kiloshare_token";

/// Session JWT lifetime: 30 days.
pub const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// Session JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (local account id)
    pub sub: String,
    /// Seller flag, baked into the token so resource routes need no lookup
    pub seller: bool,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated principal attached to the request. Immutable per request;
/// downstream handlers only read it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: String,
    pub is_seller: bool,
}

/// The raw Firebase ID token, kept for compensating rollback and
/// owner-initiated external account deletion.
#[derive(Debug, Clone)]
pub struct RawIdToken(pub String);

/// Extract a bearer token from the Authorization header.
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

/// Middleware requiring a valid self-issued session JWT.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        bearer_token(&request).ok_or(AppError::Unauthenticated)?
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(&token, &key, &validation).map_err(classify_session_error)?;

    let auth_user = AuthUser {
        account_id: token_data.claims.sub,
        is_seller: token_data.claims.seller,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware requiring a Firebase ID token that resolves to a local account.
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthenticated)?;

    let identity = state.identity.verify_id_token(&token).await?;

    let account = state
        .db
        .get_account(&identity.uid)
        .await?
        .ok_or(AppError::ProfileNotFound)?;

    let auth_user = AuthUser {
        account_id: account.id,
        is_seller: account.is_seller,
    };
    request.extensions_mut().insert(auth_user);
    request.extensions_mut().insert(RawIdToken(token));

    Ok(next.run(request).await)
}

/// Middleware requiring only a verified Firebase ID token.
///
/// Used by the sync endpoint: there may not be a local account yet, so no
/// lookup happens here. The verified assertion and the raw token are both
/// attached for the handler.
pub async fn require_firebase(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::Unauthenticated)?;

    let identity = state.identity.verify_id_token(&token).await?;

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(RawIdToken(token));

    Ok(next.run(request).await)
}

/// Expired sessions and malformed tokens get different errors so a client
/// can tell "re-login" from "broken request".
fn classify_session_error(err: jsonwebtoken::errors::Error) -> AppError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::TokenMalformed,
    }
}

/// Create a session JWT for an account.
pub fn create_session_jwt(
    account_id: &str,
    is_seller: bool,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: account_id.to_string(),
        seller: is_seller,
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_jwt_roundtrip_preserves_seller_flag() {
        let key = b"test_signing_key_32_bytes_long!!";
        let token = create_session_jwt("acc_42", true, key).unwrap();

        let decoding_key = DecodingKey::from_secret(key);
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(&token, &decoding_key, &validation).unwrap();

        assert_eq!(data.claims.sub, "acc_42");
        assert!(data.claims.seller);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn expired_session_is_its_own_error() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        assert!(matches!(
            classify_session_error(Error::from(ErrorKind::ExpiredSignature)),
            AppError::TokenExpired
        ));
        assert!(matches!(
            classify_session_error(Error::from(ErrorKind::InvalidToken)),
            AppError::TokenMalformed
        ));
        assert!(matches!(
            classify_session_error(Error::from(ErrorKind::InvalidSignature)),
            AppError::TokenMalformed
        ));
    }
}
