// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! IceBreakrr API Server
//!
//! Meeting requests, push relay and engagement notifications for people
//! who are physically close to each other.

use icebreakrr::{
    config::Config,
    db::{FirestoreDb, MemoryProfileStore, ProfileStore},
    services::{FcmClient, PushTransport, RecordingTransport},
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
    tracing::info!(port = config.port, "Starting IceBreakrr API");

    let store: Arc<dyn ProfileStore> = if config.offline {
        tracing::warn!("Offline mode: profiles are kept in memory");
        Arc::new(MemoryProfileStore::new())
    } else {
        Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        )
    };

    let transport: Arc<dyn PushTransport> = if let Some(token) = &config.fcm_access_token {
        tracing::info!(project = %config.gcp_project_id, "FCM push transport using a static token");
        Arc::new(FcmClient::with_static_token(&config.gcp_project_id, token.clone()))
    } else if config.offline {
        tracing::warn!("Offline mode: pushes are only recorded locally");
        Arc::new(RecordingTransport::new())
    } else {
        match FcmClient::with_default_credentials(&config.gcp_project_id).await {
            Ok(client) => {
                tracing::info!(project = %config.gcp_project_id, "FCM push transport initialized");
                Arc::new(client)
            }
            Err(e) => {
                tracing::warn!(error = %e, "No FCM credentials, pushes are only recorded locally");
                Arc::new(RecordingTransport::new())
            }
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, transport));

    // Build router
    let app = icebreakrr::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM (Cloud Run sends SIGTERM before stopping).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
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
                .add_directive("icebreakrr=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
