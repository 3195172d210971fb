// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kiloshare API Server
//!
//! Peer-to-peer marketplace connecting travelers with spare luggage or
//! container capacity to people who need cross-border shipping.

use kiloshare::{
    config::Config,
    db::FirestoreDb,
    services::{FirebaseAuthService, MediaService, ReconcileService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Kiloshare API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Firebase token verification and rollback client
    let identity = Arc::new(
        FirebaseAuthService::new(&config).expect("Failed to initialize Firebase verifier"),
    );

    // Media store for profile photo migration
    let media = MediaService::new(
        config.media_cloud_name.clone(),
        config.media_upload_preset.clone(),
    );
    tracing::info!(cloud = %config.media_cloud_name, "Media service initialized");

    // Identity reconciliation service
    let reconcile = ReconcileService::new(db.clone(), identity.clone(), media.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
        media,
        reconcile,
    });

    // Build router
    let app = kiloshare::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kiloshare=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
