// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Kiloshare: peer-to-peer marketplace for spare luggage and container
//! capacity on cross-border trips.
//!
//! This crate provides the backend API: account identity reconciliation
//! against Firebase, session middleware, and the listing/conversation/
//! order/review resources in Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{FirebaseAuthService, MediaService, ReconcileService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub identity: Arc<FirebaseAuthService>,
    pub media: MediaService,
    pub reconcile: ReconcileService,
}
