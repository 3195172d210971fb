// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation and message routes.

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
use crate::models::{Conversation, Message, Party};
use crate::time_utils::now_rfc3339;
use crate::AppState;

/// Longest snippet stored on the conversation document.
const SNIPPET_LEN: usize = 120;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/conversations", post(open_conversation).get(list_conversations))
        .route("/api/conversations/{id}/read", post(mark_read))
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(post_message),
        )
}

/// Resolve the caller's side of a conversation, or 403.
fn require_party(conversation: &Conversation, user: &AuthUser) -> Result<Party> {
    conversation.party_of(&user.account_id).ok_or_else(|| {
        AppError::Forbidden("You are not part of this conversation".to_string())
    })
}

// ─── Open / List ─────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct OpenConversationRequest {
    #[validate(length(min = 1))]
    seller_id: String,
    #[validate(length(min = 1))]
    buyer_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConversationResponse {
    pub conversation: Conversation,
    pub created: bool,
}

/// Find or create the conversation for a (seller, buyer) pair.
///
/// The composite document id makes this idempotent: both parties resolve
/// to the same thread no matter who opens it first.
async fn open_conversation(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<OpenConversationRequest>,
) -> Result<Json<ConversationResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if payload.seller_id == payload.buyer_id {
        return Err(AppError::Validation(
            "A conversation needs two distinct accounts".to_string(),
        ));
    }

    if user.account_id != payload.seller_id && user.account_id != payload.buyer_id {
        return Err(AppError::Forbidden(
            "You can only open conversations you take part in".to_string(),
        ));
    }

    let peer_id = if user.account_id == payload.seller_id {
        &payload.buyer_id
    } else {
        &payload.seller_id
    };
    if state.db.get_account(peer_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Account {} not found", peer_id)));
    }

    let conversation = Conversation::new(&payload.seller_id, &payload.buyer_id, &now_rfc3339());
    let (conversation, created) = state.db.find_or_create_conversation(&conversation).await?;

    Ok(Json(ConversationResponse {
        conversation,
        created,
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConversationWithPeer {
    pub conversation: Conversation,
    /// The other participant, when their account still exists
    pub peer: Option<AccountSummary>,
    /// Whether the caller has read the latest activity
    pub read: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationWithPeer>,
}

/// All of the caller's conversations, newest activity first.
async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConversationsResponse>> {
    let conversations = state.db.conversations_for_account(&user.account_id).await?;

    let peer_ids: Vec<String> = conversations
        .iter()
        .filter_map(|c| c.party_of(&user.account_id).map(|party| match party {
            Party::Seller => c.buyer_id.clone(),
            Party::Buyer => c.seller_id.clone(),
        }))
        .collect();

    let peers = state.db.accounts_by_ids(&peer_ids).await?;

    let conversations = conversations
        .into_iter()
        .filter_map(|conversation| {
            let party = conversation.party_of(&user.account_id)?;
            let peer_id = match party {
                Party::Seller => &conversation.buyer_id,
                Party::Buyer => &conversation.seller_id,
            };
            let peer = peers
                .iter()
                .find(|account| &account.id == peer_id)
                .map(|account| account.summary());
            let read = match party {
                Party::Seller => conversation.seller_read,
                Party::Buyer => conversation.buyer_read,
            };
            Some(ConversationWithPeer {
                conversation,
                peer,
                read,
            })
        })
        .collect();

    Ok(Json(ConversationsResponse { conversations }))
}

// ─── Read State ──────────────────────────────────────────────

/// Mark the caller's side of the conversation as read.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>> {
    let mut conversation = state
        .db
        .get_conversation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))?;

    let party = require_party(&conversation, &user)?;

    conversation.set_read(party, true);
    conversation.updated_at = now_rfc3339();

    state.db.update_conversation(&conversation).await?;

    Ok(Json(conversation))
}

// ─── Messages ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// Messages in a conversation, oldest first. Participants only.
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>> {
    let conversation = state
        .db
        .get_conversation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))?;

    require_party(&conversation, &user)?;

    let messages = state.db.messages_for_conversation(&id).await?;

    Ok(Json(MessagesResponse { messages }))
}

#[derive(Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    body: String,
}

/// Post a message. The author's read flag goes true, the other party's
/// goes false, and the conversation snippet moves forward.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<Json<Message>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut conversation = state
        .db
        .get_conversation(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))?;

    let party = require_party(&conversation, &user)?;

    let now = now_rfc3339();
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        conversation_id: conversation.id.clone(),
        author_id: user.account_id.clone(),
        body: payload.body,
        created_at: now.clone(),
    };

    // Message first: a crash between the writes loses read-flag freshness,
    // not the message itself.
    state.db.insert_message(&message).await?;

    let snippet: String = message.body.chars().take(SNIPPET_LEN).collect();
    conversation.apply_message(party, &snippet, &now);
    state.db.update_conversation(&conversation).await?;

    Ok(Json(message))
}
