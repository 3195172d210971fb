// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Review routes: one review per (reviewer, seller) pair, with the rating
//! pushed onto the seller's aggregate fields.

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

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::account::AccountSummary;
use crate::models::review::{review_key, Review, MAX_RATING, MIN_RATING};
use crate::time_utils::now_rfc3339;
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reviews/{seller_id}", get(list_reviews))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reviews", post(create_review))
}

#[derive(Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1))]
    seller_id: String,
    listing_id: Option<String>,
    rating: u8,
    #[validate(length(max = 1000))]
    comment: String,
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<Json<Review>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !(MIN_RATING..=MAX_RATING).contains(&payload.rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }

    if payload.seller_id == user.account_id {
        return Err(AppError::Validation(
            "You cannot review yourself".to_string(),
        ));
    }

    let seller = state
        .db
        .get_account(&payload.seller_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Seller {} not found", payload.seller_id)))?;

    if !seller.is_seller {
        return Err(AppError::Validation(
            "This account does not sell on the platform".to_string(),
        ));
    }

    let now = now_rfc3339();
    let review = Review {
        id: review_key(&user.account_id, &seller.id),
        reviewer_id: user.account_id.clone(),
        seller_id: seller.id.clone(),
        listing_id: payload.listing_id,
        rating: payload.rating,
        comment: payload.comment,
        created_at: now.clone(),
    };

    if !state.db.insert_review(&review).await? {
        return Err(AppError::Conflict(
            "You have already reviewed this seller".to_string(),
        ));
    }

    // Push the stars onto the seller's aggregate. If that fails, take the
    // review back out so the two never disagree.
    if let Err(e) = state
        .db
        .increment_seller_rating(&seller.id, review.rating, &now)
        .await
    {
        let _ = state.db.delete_review(&review.id).await;
        return Err(e);
    }

    tracing::info!(
        reviewer_id = %review.reviewer_id,
        seller_id = %review.seller_id,
        rating = review.rating,
        "Review recorded"
    );

    Ok(Json(review))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReviewsResponse {
    pub reviews: Vec<Review>,
    pub seller: Option<AccountSummary>,
}

/// Reviews received by a seller, newest first. Public.
async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(seller_id): Path<String>,
) -> Result<Json<ReviewsResponse>> {
    let seller = state
        .db
        .get_account(&seller_id)
        .await?
        .map(|account| account.summary());

    let reviews = state.db.reviews_for_seller(&seller_id).await?;

    Ok(Json(ReviewsResponse { reviews, seller }))
}
