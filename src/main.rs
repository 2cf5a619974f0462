// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drive-Relay API Server
//!
//! Links several Google accounts to one client and relays files between
//! their Drives without buffering them on disk.

use drive_relay::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryDb, Store},
    services::{GoogleClient, TokenCipher},
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
    tracing::info!(port = config.port, "Starting Drive-Relay API");

    if config.google_oauth.is_none() {
        tracing::warn!("Google OAuth client not configured; linking and transfers will fail");
    }

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Firestore => {
            let cipher = TokenCipher::new(&config.token_encryption_key)?;
            let db = FirestoreDb::new(&config.gcp_project_id, cipher)
                .await
                .expect("Failed to connect to Firestore");
            tracing::info!(project = %config.gcp_project_id, "Firestore store initialized");
            Arc::new(db)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; linked accounts are lost on restart");
            Arc::new(MemoryDb::new())
        }
    };

    let google = Arc::new(GoogleClient::new()?);

    let state = Arc::new(AppState::new(config.clone(), store, google));

    let app = drive_relay::routes::create_router(state);

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
                .add_directive("drive_relay=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
