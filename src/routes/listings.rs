// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Luggage listing routes: browse, ownership-checked CRUD, interest
//! toggling and the one-way completion transition.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::firestore::ListingFilter;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::account::AccountSummary;
use crate::models::Listing;
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/listings", get(list_listings))
        .route("/api/listings/{id}", get(get_listing))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/listings", post(create_listing))
        .route(
            "/api/listings/{id}",
            put(update_listing).delete(delete_listing),
        )
        .route("/api/listings/{id}/interest", post(toggle_interest))
        .route("/api/listings/{id}/complete", post(complete_listing))
}

// ─── Pagination (shared with container routes) ───────────────

pub(crate) fn default_page() -> u32 {
    1
}
pub(crate) fn default_per_page() -> u32 {
    20
}

pub(crate) const MAX_PER_PAGE: u32 = 100;

pub(crate) fn page_window(page: u32, per_page: u32) -> Result<(u32, u32)> {
    if page == 0 {
        return Err(AppError::Validation(
            "page must be 1 or greater".to_string(),
        ));
    }
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    Ok((per_page, (page - 1) * per_page))
}

/// Require that the authenticated account owns the resource. Not owning an
/// existing resource is 403, which is distinct from 404 on purpose.
pub(crate) fn ensure_owner(owner_id: &str, user: &AuthUser) -> Result<()> {
    if owner_id != user.account_id {
        return Err(AppError::Forbidden(
            "You do not own this listing".to_string(),
        ));
    }
    Ok(())
}

// ─── Browse ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListingsQuery {
    origin: Option<String>,
    destination: Option<String>,
    owner: Option<String>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ListingsResponse {
    pub listings: Vec<Listing>,
    pub page: u32,
    pub per_page: u32,
    pub count: u32,
}

async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingsQuery>,
) -> Result<Json<ListingsResponse>> {
    let (per_page, offset) = page_window(params.page, params.per_page)?;

    let filter = ListingFilter {
        origin: params.origin,
        destination: params.destination,
        owner_id: params.owner,
    };

    let listings = state.db.query_listings(&filter, per_page, offset).await?;

    Ok(Json(ListingsResponse {
        count: listings.len() as u32,
        listings,
        page: params.page,
        per_page,
    }))
}

async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Listing>> {
    let listing = state
        .db
        .get_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    Ok(Json(listing))
}

// ─── Create / Update / Delete ────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 100))]
    origin: String,
    #[validate(length(min = 1, max = 100))]
    destination: String,
    #[validate(range(min = 0.1))]
    capacity_kg: f64,
    #[validate(range(min = 0.01))]
    price_per_kg: f64,
    #[validate(range(min = 1))]
    delivery_days: u32,
    #[validate(range(min = 1, max = 365))]
    expires_in_days: u32,
}

async fn create_listing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateListingRequest>,
) -> Result<Json<Listing>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !user.is_seller {
        return Err(AppError::Forbidden(
            "Only seller accounts can create listings".to_string(),
        ));
    }

    let now = now_rfc3339();
    let listing = Listing {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: user.account_id.clone(),
        origin: payload.origin,
        destination: payload.destination,
        capacity_kg: payload.capacity_kg,
        price_per_kg: payload.price_per_kg,
        delivery_days: payload.delivery_days,
        expires_in_days: payload.expires_in_days,
        completed: false,
        interested: Vec::new(),
        sales_count: 0,
        rating_sum: 0,
        rating_count: 0,
        created_at: now.clone(),
        updated_at: now,
    };

    state.db.insert_listing(&listing).await?;

    tracing::info!(listing_id = %listing.id, owner_id = %user.account_id, "Listing created");

    Ok(Json(listing))
}

#[derive(Deserialize, Validate)]
pub struct UpdateListingRequest {
    #[validate(length(min = 1, max = 100))]
    origin: Option<String>,
    #[validate(length(min = 1, max = 100))]
    destination: Option<String>,
    #[validate(range(min = 0.1))]
    capacity_kg: Option<f64>,
    #[validate(range(min = 0.01))]
    price_per_kg: Option<f64>,
    #[validate(range(min = 1))]
    delivery_days: Option<u32>,
    #[validate(range(min = 1, max = 365))]
    expires_in_days: Option<u32>,
}

async fn update_listing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateListingRequest>,
) -> Result<Json<Listing>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut listing = state
        .db
        .get_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    if let Some(origin) = payload.origin {
        listing.origin = origin;
    }
    if let Some(destination) = payload.destination {
        listing.destination = destination;
    }
    if let Some(capacity_kg) = payload.capacity_kg {
        listing.capacity_kg = capacity_kg;
    }
    if let Some(price_per_kg) = payload.price_per_kg {
        listing.price_per_kg = price_per_kg;
    }
    if let Some(delivery_days) = payload.delivery_days {
        listing.delivery_days = delivery_days;
    }
    if let Some(expires_in_days) = payload.expires_in_days {
        listing.expires_in_days = expires_in_days;
    }
    listing.updated_at = now_rfc3339();

    state.db.update_listing(&listing).await?;

    Ok(Json(listing))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeletedResponse {
    pub success: bool,
}

async fn delete_listing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let listing = state
        .db
        .get_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    state.db.delete_listing(&id).await?;

    tracing::info!(listing_id = %id, "Listing deleted");

    Ok(Json(DeletedResponse { success: true }))
}

// ─── Interest Toggle ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InterestResponse {
    /// Whether this call added (true) or removed (false) the caller
    pub interested: bool,
    pub count: u32,
    pub users: Vec<AccountSummary>,
}

async fn toggle_interest(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<InterestResponse>> {
    let listing = state
        .db
        .get_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    if listing.owner_id == user.account_id {
        return Err(AppError::Forbidden(
            "You cannot mark interest in your own listing".to_string(),
        ));
    }

    let now = now_rfc3339();
    let (interested_ids, added) = state
        .db
        .toggle_listing_interest(&id, &user.account_id, &now)
        .await?;

    let users = state
        .db
        .accounts_by_ids(&interested_ids)
        .await?
        .iter()
        .map(|account| account.summary())
        .collect::<Vec<_>>();

    Ok(Json(InterestResponse {
        interested: added,
        count: interested_ids.len() as u32,
        users,
    }))
}

// ─── Completion ──────────────────────────────────────────────

async fn complete_listing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Listing>> {
    let listing = state
        .db
        .get_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    if !listing.expiration_passed(chrono::Utc::now()) {
        return Err(AppError::Validation(
            "Listing cannot be completed before its expiration date".to_string(),
        ));
    }

    // The transaction re-checks the completed flag, so a double submit
    // cannot credit the owner's trip counter twice.
    let listing = state.db.complete_listing(&id, &now_rfc3339()).await?;

    Ok(Json(listing))
}
