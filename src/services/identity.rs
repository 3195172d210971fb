// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication: ID token verification and account deletion.
//!
//! ID tokens are RS256 JWTs signed by Google's securetoken service; the
//! public keys are fetched from the securetoken JWKS endpoint and cached
//! with the TTL advertised in the response's Cache-Control header.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Verified identity assertion extracted from a valid Firebase ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Firebase uid (the `sub` claim)
    pub uid: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Identity verification error categories.
///
/// Expired and malformed are kept apart because the caller's remedy differs
/// (re-login vs. fix the client).
#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    #[error("ID token has expired")]
    Expired,
    #[error("ID token is invalid: {0}")]
    Malformed(String),
    #[error("identity provider unavailable: {0}")]
    Transient(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Expired => AppError::TokenExpired,
            IdentityError::Malformed(_) => AppError::TokenMalformed,
            IdentityError::Transient(msg) => AppError::Upstream(msg),
        }
    }
}

#[derive(Clone)]
enum VerifierMode {
    Live,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Firebase Authentication client: token verification plus the
/// account-deletion call used for compensating rollback.
pub struct FirebaseAuthService {
    http_client: reqwest::Client,
    expected_issuer: String,
    expected_audience: String,
    api_key: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseAuthService {
    /// Create a production verifier that fetches and caches securetoken keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Firebase HTTP client")?;

        let expected_issuer = format!(
            "https://securetoken.google.com/{}",
            config.firebase_project_id
        );

        tracing::info!(
            issuer = %expected_issuer,
            "Initialized Firebase token verifier"
        );

        Ok(Self {
            http_client,
            expected_issuer,
            expected_audience: config.firebase_project_id.clone(),
            api_key: config.firebase_api_key.clone(),
            mode: VerifierMode::Live,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests. Remote
    /// calls (JWKS fetch, account deletion) are skipped in this mode.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static Firebase kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Firebase HTTP client")?;

        Ok(Self {
            http_client,
            expected_issuer: format!(
                "https://securetoken.google.com/{}",
                config.firebase_project_id
            ),
            expected_audience: config.firebase_project_id.clone(),
            api_key: config.firebase_api_key.clone(),
            mode: VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a Firebase ID token and extract the identity assertion.
    pub async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(token)
            .map_err(|e| IdentityError::Malformed(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Malformed(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Malformed("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.expected_issuer.as_str()]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<FirebaseIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(classify_jwt_error)?;

        let claims = token_data.claims;

        if claims.sub.trim().is_empty() {
            return Err(IdentityError::Malformed("empty sub claim".to_string()));
        }

        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| IdentityError::Malformed("missing email claim".to_string()))?;

        tracing::debug!(
            uid = %claims.sub,
            email_verified = ?claims.email_verified,
            "Firebase ID token verified"
        );

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }

    /// Delete the Firebase user the given ID token belongs to.
    ///
    /// Used only for compensating rollback after a duplicate local account:
    /// the just-created Firebase user is the caller, so their own ID token
    /// authorizes the deletion. A user that is already gone counts as
    /// success, since the end state (no orphaned identity) is the same.
    pub async fn delete_account(&self, id_token: &str) -> Result<(), AppError> {
        if let VerifierMode::StaticKey { .. } = self.mode {
            tracing::debug!("Static-key mode, skipping remote account deletion");
            return Ok(());
        }

        let url = format!(
            "{}/accounts:delete?key={}",
            IDENTITY_TOOLKIT_URL, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("accounts:delete request failed: {e}")))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Already gone means the rollback goal is reached.
        if body.contains("USER_NOT_FOUND") || body.contains("INVALID_ID_TOKEN") {
            tracing::debug!("External identity already gone, rollback complete");
            return Ok(());
        }

        Err(AppError::Upstream(format!(
            "accounts:delete returned {}: {}",
            status, body
        )))
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, IdentityError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(IdentityError::Malformed(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Live => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(IdentityError::Malformed(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), IdentityError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!("Refreshing securetoken JWKS cache");

        let response = self
            .http_client
            .get(SECURETOKEN_JWKS_URL)
            .send()
            .await
            .map_err(|e| IdentityError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdentityError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| IdentityError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(IdentityError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "securetoken JWKS cache refreshed");
        Ok(())
    }
}

/// Map jsonwebtoken failures onto the identity error taxonomy. Expiry is the
/// only case a client can fix by re-authenticating, so it gets its own bucket.
fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> IdentityError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => IdentityError::Expired,
        _ => IdentityError::Malformed(format!("JWT validation failed: {err}")),
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct FirebaseIdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn jwt_errors_classify_expiry_separately() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let expired = classify_jwt_error(Error::from(ErrorKind::ExpiredSignature));
        assert!(matches!(expired, IdentityError::Expired));

        let bad_sig = classify_jwt_error(Error::from(ErrorKind::InvalidSignature));
        assert!(matches!(bad_sig, IdentityError::Malformed(_)));

        let bad_aud = classify_jwt_error(Error::from(ErrorKind::InvalidAudience));
        assert!(matches!(bad_aud, IdentityError::Malformed(_)));
    }
}
