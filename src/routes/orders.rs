// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Order routes: place an order against a listing, list and fetch own orders.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::collections;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ListingKind, Order};
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/{id}", get(get_order))
}

#[derive(Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1))]
    listing_id: String,
    listing_kind: ListingKind,
    /// Kilograms for luggage listings, cubic meters for containers
    #[validate(range(min = 0.1))]
    quantity: f64,
}

/// Place an order. Creation bumps the listing's sales counter in the same
/// transaction as the order write.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    // Resolve the listing by kind and pull the fields the order snapshots.
    let (collection, owner_id, completed, capacity, unit_price) = match payload.listing_kind {
        ListingKind::Luggage => {
            let listing = state
                .db
                .get_listing(&payload.listing_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Listing {} not found", payload.listing_id))
                })?;
            (
                collections::LISTINGS,
                listing.owner_id,
                listing.completed,
                listing.capacity_kg,
                listing.price_per_kg,
            )
        }
        ListingKind::Container => {
            let listing = state
                .db
                .get_container_listing(&payload.listing_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Listing {} not found", payload.listing_id))
                })?;
            (
                collections::CONTAINER_LISTINGS,
                listing.owner_id,
                listing.completed,
                listing.capacity_cbm,
                listing.price_per_cbm,
            )
        }
    };

    if owner_id == user.account_id {
        return Err(AppError::Validation(
            "You cannot order from your own listing".to_string(),
        ));
    }
    if completed {
        return Err(AppError::Validation(
            "Listing is already completed".to_string(),
        ));
    }
    if payload.quantity > capacity {
        return Err(AppError::Validation(
            "Requested quantity exceeds available capacity".to_string(),
        ));
    }

    let order = Order {
        id: uuid::Uuid::new_v4().to_string(),
        listing_id: payload.listing_id,
        listing_kind: payload.listing_kind,
        buyer_id: user.account_id.clone(),
        seller_id: owner_id,
        quantity: payload.quantity,
        unit_price,
        total_price: payload.quantity * unit_price,
        created_at: now_rfc3339(),
    };

    state.db.record_order(&order, collection).await?;

    tracing::info!(
        order_id = %order.id,
        listing_id = %order.listing_id,
        buyer_id = %order.buyer_id,
        "Order recorded"
    );

    Ok(Json(order))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

/// Orders the caller is party to, as buyer or seller.
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OrdersResponse>> {
    let orders = state.db.orders_for_account(&user.account_id).await?;
    Ok(Json(OrdersResponse { orders }))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let order = state
        .db
        .get_order(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))?;

    if order.buyer_id != user.account_id && order.seller_id != user.account_id {
        return Err(AppError::Forbidden(
            "You are not part of this order".to_string(),
        ));
    }

    Ok(Json(order))
}
