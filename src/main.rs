// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tuya-Bridge API Server
//!
//! Backend for the companion mobile app: links Tuya Cloud accounts over
//! OAuth and proxies device listing, switch control, and energy readings
//! through the signed Tuya OpenAPI.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuya_bridge::{config::Config, services::TuyaService, store::MemoryCredentialStore, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment; a missing Tuya variable is fatal
    let config = Config::from_env()?;
    tracing::info!(port = config.port, base_url = %config.base_url, "Starting Tuya-Bridge API");

    // Volatile single-process credential store; swap in a persistent
    // CredentialStore implementation to survive restarts
    let store = Arc::new(MemoryCredentialStore::new());

    let tuya = TuyaService::new(config.clone(), store);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        tuya,
    });

    // Build router
    let app = tuya_bridge::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tuya_bridge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
