// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Container listing routes. Same shape as the luggage routes, with
//! sailing dates (arrival strictly after departure) and container enums.

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
use crate::models::listing::{dates_ordered, ContainerListing, ContainerType, TaxClearance};
use crate::routes::listings::{
    default_page, default_per_page, ensure_owner, page_window, DeletedResponse, InterestResponse,
};
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/containers", get(list_containers))
        .route("/api/containers/{id}", get(get_container))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/containers", post(create_container))
        .route(
            "/api/containers/{id}",
            put(update_container).delete(delete_container),
        )
        .route("/api/containers/{id}/interest", post(toggle_interest))
        .route("/api/containers/{id}/complete", post(complete_container))
}

// ─── Browse ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct ContainersQuery {
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
pub struct ContainersResponse {
    pub listings: Vec<ContainerListing>,
    pub page: u32,
    pub per_page: u32,
    pub count: u32,
}

async fn list_containers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ContainersQuery>,
) -> Result<Json<ContainersResponse>> {
    let (per_page, offset) = page_window(params.page, params.per_page)?;

    let filter = ListingFilter {
        origin: params.origin,
        destination: params.destination,
        owner_id: params.owner,
    };

    let listings = state
        .db
        .query_container_listings(&filter, per_page, offset)
        .await?;

    Ok(Json(ContainersResponse {
        count: listings.len() as u32,
        listings,
        page: params.page,
        per_page,
    }))
}

async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ContainerListing>> {
    let listing = state
        .db
        .get_container_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    Ok(Json(listing))
}

// ─── Create / Update / Delete ────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateContainerRequest {
    #[validate(length(min = 1, max = 100))]
    origin_port: String,
    #[validate(length(min = 1, max = 100))]
    destination_port: String,
    #[validate(range(min = 0.1))]
    capacity_cbm: f64,
    #[validate(range(min = 0.01))]
    price_per_cbm: f64,
    container_type: ContainerType,
    tax_clearance: TaxClearance,
    departure_date: String,
    arrival_date: String,
    #[validate(range(min = 1, max = 365))]
    expires_in_days: u32,
}

async fn create_container(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateContainerRequest>,
) -> Result<Json<ContainerListing>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !user.is_seller {
        return Err(AppError::Forbidden(
            "Only seller accounts can create listings".to_string(),
        ));
    }

    if !dates_ordered(&payload.departure_date, &payload.arrival_date) {
        return Err(AppError::Validation(
            "Arrival date must be strictly after departure date".to_string(),
        ));
    }

    let now = now_rfc3339();
    let listing = ContainerListing {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: user.account_id.clone(),
        origin_port: payload.origin_port,
        destination_port: payload.destination_port,
        capacity_cbm: payload.capacity_cbm,
        price_per_cbm: payload.price_per_cbm,
        container_type: payload.container_type,
        tax_clearance: payload.tax_clearance,
        departure_date: payload.departure_date,
        arrival_date: payload.arrival_date,
        expires_in_days: payload.expires_in_days,
        completed: false,
        interested: Vec::new(),
        sales_count: 0,
        rating_sum: 0,
        rating_count: 0,
        created_at: now.clone(),
        updated_at: now,
    };

    state.db.insert_container_listing(&listing).await?;

    tracing::info!(listing_id = %listing.id, owner_id = %user.account_id, "Container listing created");

    Ok(Json(listing))
}

#[derive(Deserialize, Validate)]
pub struct UpdateContainerRequest {
    #[validate(length(min = 1, max = 100))]
    origin_port: Option<String>,
    #[validate(length(min = 1, max = 100))]
    destination_port: Option<String>,
    #[validate(range(min = 0.1))]
    capacity_cbm: Option<f64>,
    #[validate(range(min = 0.01))]
    price_per_cbm: Option<f64>,
    container_type: Option<ContainerType>,
    tax_clearance: Option<TaxClearance>,
    departure_date: Option<String>,
    arrival_date: Option<String>,
    #[validate(range(min = 1, max = 365))]
    expires_in_days: Option<u32>,
}

async fn update_container(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateContainerRequest>,
) -> Result<Json<ContainerListing>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut listing = state
        .db
        .get_container_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    if let Some(origin_port) = payload.origin_port {
        listing.origin_port = origin_port;
    }
    if let Some(destination_port) = payload.destination_port {
        listing.destination_port = destination_port;
    }
    if let Some(capacity_cbm) = payload.capacity_cbm {
        listing.capacity_cbm = capacity_cbm;
    }
    if let Some(price_per_cbm) = payload.price_per_cbm {
        listing.price_per_cbm = price_per_cbm;
    }
    if let Some(container_type) = payload.container_type {
        listing.container_type = container_type;
    }
    if let Some(tax_clearance) = payload.tax_clearance {
        listing.tax_clearance = tax_clearance;
    }
    if let Some(departure_date) = payload.departure_date {
        listing.departure_date = departure_date;
    }
    if let Some(arrival_date) = payload.arrival_date {
        listing.arrival_date = arrival_date;
    }
    if let Some(expires_in_days) = payload.expires_in_days {
        listing.expires_in_days = expires_in_days;
    }

    // Date ordering must hold for the final state, whichever side changed.
    if !dates_ordered(&listing.departure_date, &listing.arrival_date) {
        return Err(AppError::Validation(
            "Arrival date must be strictly after departure date".to_string(),
        ));
    }

    listing.updated_at = now_rfc3339();

    state.db.update_container_listing(&listing).await?;

    Ok(Json(listing))
}

async fn delete_container(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let listing = state
        .db
        .get_container_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    state.db.delete_container_listing(&id).await?;

    tracing::info!(listing_id = %id, "Container listing deleted");

    Ok(Json(DeletedResponse { success: true }))
}

// ─── Interest / Completion ───────────────────────────────────

async fn toggle_interest(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<InterestResponse>> {
    let listing = state
        .db
        .get_container_listing(&id)
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
        .toggle_container_interest(&id, &user.account_id, &now)
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

async fn complete_container(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ContainerListing>> {
    let listing = state
        .db
        .get_container_listing(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", id)))?;

    ensure_owner(&listing.owner_id, &user)?;

    if !listing.expiration_passed(chrono::Utc::now()) {
        return Err(AppError::Validation(
            "Listing cannot be completed before its expiration date".to_string(),
        ));
    }

    let listing = state
        .db
        .complete_container_listing(&id, &now_rfc3339())
        .await?;

    Ok(Json(listing))
}
