// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity reconciliation: find-or-create a local account for a verified
//! Firebase identity assertion.
//!
//! Account creation spans two systems that share no transaction: the
//! Firebase user already exists by the time we try to create the local
//! record. If the local create loses a uniqueness race, we compensate by
//! deleting the Firebase user so no orphaned external identity is left
//! behind.

use crate::db::{collections, FirestoreDb};
use crate::error::AppError;
use crate::models::account::{
    normalize_handle, synthesized_handle_base, Account, COUNTRY_NOT_SPECIFIED,
};
use crate::services::identity::{FirebaseAuthService, VerifiedIdentity};
use crate::services::media::MediaService;
use crate::time_utils::now_rfc3339;
use std::sync::Arc;

/// Handle-collision probing gives up after this many numeric suffixes.
const MAX_HANDLE_PROBES: u32 = 100;

/// Optional profile fields supplied alongside a sync call. Only fields that
/// are present are applied; everything else is left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileSync {
    pub handle: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

/// Result of a reconcile call.
pub struct ReconcileOutcome {
    pub account: Account,
    /// Recomputed from the stored account, never persisted
    pub profile_complete: bool,
    pub is_new_account: bool,
}

/// The identity reconciliation service.
#[derive(Clone)]
pub struct ReconcileService {
    db: FirestoreDb,
    identity: Arc<FirebaseAuthService>,
    media: MediaService,
}

impl ReconcileService {
    pub fn new(db: FirestoreDb, identity: Arc<FirebaseAuthService>, media: MediaService) -> Self {
        Self {
            db,
            identity,
            media,
        }
    }

    /// Find-or-create the local account for a verified identity assertion.
    ///
    /// The raw ID token is retained only so a duplicate-key race can roll
    /// back the just-created Firebase user.
    pub async fn reconcile(
        &self,
        identity: &VerifiedIdentity,
        raw_id_token: &str,
        mut fields: ProfileSync,
    ) -> Result<ReconcileOutcome, AppError> {
        // Photo first: a provider-CDN photo gets copied into our media
        // store. Failure falls back to the original URL inside the media
        // service, so this can never fail the reconcile.
        if let Some(url) = fields.photo_url.take() {
            fields.photo_url = Some(self.media.migrate_profile_photo(&url).await);
        }

        let now = now_rfc3339();

        match self.db.get_account(&identity.uid).await? {
            Some(account) => {
                let account = self.apply_updates(account, identity, fields, &now).await?;
                Ok(ReconcileOutcome {
                    profile_complete: account.profile_complete(),
                    account,
                    is_new_account: false,
                })
            }
            None => {
                let account = self
                    .create_account(identity, raw_id_token, fields, &now)
                    .await?;
                Ok(ReconcileOutcome {
                    profile_complete: account.profile_complete(),
                    account,
                    is_new_account: true,
                })
            }
        }
    }

    /// Apply only the fields the caller provided to an existing account.
    async fn apply_updates(
        &self,
        mut account: Account,
        identity: &VerifiedIdentity,
        fields: ProfileSync,
        now: &str,
    ) -> Result<Account, AppError> {
        if let Some(raw) = &fields.handle {
            let handle = normalize_handle(raw);
            if !handle.is_empty() && handle != account.handle {
                if let Some(other) = self.db.find_account_by_handle(&handle).await? {
                    if other.id != account.id {
                        return Err(AppError::Conflict(
                            "Username is already taken".to_string(),
                        ));
                    }
                }
                if !self
                    .db
                    .reassign_unique(collections::HANDLES, &account.handle, &handle, &account.id)
                    .await?
                {
                    return Err(AppError::Conflict("Username is already taken".to_string()));
                }
                account.handle = handle;
            }
        }

        // The provider is authoritative for the email address.
        if !identity.email.is_empty() && identity.email != account.email {
            if let Some(other) = self.db.find_account_by_email(&identity.email).await? {
                if other.id != account.id {
                    return Err(AppError::Conflict(
                        "Email is already registered".to_string(),
                    ));
                }
            }
            if !self
                .db
                .reassign_unique(
                    collections::EMAILS,
                    &account.email,
                    &identity.email,
                    &account.id,
                )
                .await?
            {
                return Err(AppError::Conflict(
                    "Email is already registered".to_string(),
                ));
            }
            account.email = identity.email.clone();
        }

        if let Some(country) = fields.country {
            let country = country.trim().to_string();
            if !country.is_empty() {
                account.country = country;
            }
        }
        if let Some(photo_url) = fields.photo_url {
            account.photo_url = Some(photo_url);
        }
        if let Some(phone) = fields.phone {
            account.phone = Some(phone);
        }
        if let Some(bio) = fields.bio {
            account.bio = Some(bio);
        }

        account.updated_at = now.to_string();
        self.db.update_account(&account).await?;

        Ok(account)
    }

    /// Create the local account for a first-time sync.
    async fn create_account(
        &self,
        identity: &VerifiedIdentity,
        raw_id_token: &str,
        fields: ProfileSync,
        now: &str,
    ) -> Result<Account, AppError> {
        let requested_handle = fields
            .handle
            .as_deref()
            .map(normalize_handle)
            .filter(|h| !h.is_empty());
        let real_country = fields
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != COUNTRY_NOT_SPECIFIED)
            .map(str::to_string);

        // Only a usable handle together with a real country creates the
        // account directly; anything less gets a placeholder profile the
        // user must complete later.
        let (handle, country) = match (requested_handle, real_country) {
            (Some(handle), Some(country)) => (handle, country),
            _ => {
                let base = synthesized_handle_base(&identity.email, &identity.uid);
                let handle = self.probe_free_handle(&base).await?;
                (handle, COUNTRY_NOT_SPECIFIED.to_string())
            }
        };

        // No photo supplied on first sync: fall back to the token's own
        // picture claim, migrated the same way.
        let photo_url = match fields.photo_url {
            Some(url) => Some(url),
            None => match &identity.picture {
                Some(url) => Some(self.media.migrate_profile_photo(url).await),
                None => None,
            },
        };

        let account = Account {
            id: identity.uid.clone(),
            firebase_uid: Some(identity.uid.clone()),
            handle,
            email: identity.email.clone(),
            password_hash: None,
            photo_url,
            country,
            phone: fields.phone,
            bio: fields.bio,
            is_seller: false,
            rating_sum: 0,
            rating_count: 0,
            trips_completed: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        };

        match self.db.create_account(&account).await {
            Ok(()) => {
                tracing::info!(
                    account_id = %account.id,
                    handle = %account.handle,
                    "Account created from external identity"
                );
                Ok(account)
            }
            Err(AppError::Conflict(msg)) => {
                // The pre-checks passed but the storage layer saw a
                // duplicate: another sync won the race. Remove the external
                // identity so it does not outlive its failed local record.
                self.rollback_external_identity(raw_id_token).await;
                Err(AppError::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Find a free handle starting from the synthesized base, appending an
    /// incrementing numeric suffix on collision.
    async fn probe_free_handle(&self, base: &str) -> Result<String, AppError> {
        if !self.db.handle_taken(base).await? {
            return Ok(base.to_string());
        }

        for suffix in 1..=MAX_HANDLE_PROBES {
            let candidate = format!("{}{}", base, suffix);
            if !self.db.handle_taken(&candidate).await? {
                return Ok(candidate);
            }
        }

        Err(AppError::Conflict(
            "Could not allocate a free username, please choose one explicitly".to_string(),
        ))
    }

    /// Compensating rollback of the external identity. Failure is logged
    /// and swallowed: if the user is already gone the end state is the one
    /// we wanted anyway.
    async fn rollback_external_identity(&self, id_token: &str) {
        match self.identity.delete_account(id_token).await {
            Ok(()) => {
                tracing::info!("Rolled back external identity after duplicate account");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "External identity rollback failed (identity may already be gone)"
                );
            }
        }
    }
}
