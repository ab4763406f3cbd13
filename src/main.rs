// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Hearthboard API Server
//!
//! Backend for a family kiosk dashboard: aggregates Google Calendar and
//! Tasks across linked accounts and layers local gamified tasks on top.

use hearthboard::{
    config::Config,
    services::{
        Aggregator, ApiClient, AuthService, CalendarApi, GoogleFetch, GoogleTokenExchanger,
        ItemCache, LedgerService, Mutator, PhotosApi, TasksApi,
    },
    store::JsonStore,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Hearthboard API");

    // Open the JSON store
    let store = JsonStore::open(config.data_dir.clone())
        .await
        .expect("Failed to open data store");

    // Shared per-key refresh locks so concurrent requests coalesce into one
    // token refresh per (user, provider)
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    let exchanger = Arc::new(GoogleTokenExchanger::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    ));
    let auth = AuthService::new(store.clone(), exchanger, refresh_locks);

    // Typed Google API clients over one shared request core
    let api = ApiClient::new();
    let calendar = CalendarApi::new(api.clone());
    let tasks = TasksApi::new(api.clone());
    let photos = PhotosApi::new(api);

    let fetcher = Arc::new(GoogleFetch::new(
        auth.clone(),
        calendar.clone(),
        tasks.clone(),
    ));
    let aggregator = Aggregator::new(fetcher);

    let event_items = Mutator::new(Arc::new(ItemCache::new()));
    let task_items = Mutator::new(Arc::new(ItemCache::new()));
    let ledger = LedgerService::new(store.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        auth,
        calendar,
        tasks,
        photos,
        aggregator,
        event_items,
        task_items,
        ledger,
    });

    // Build router
    let app = hearthboard::routes::create_router(state);

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
                .add_directive("hearthboard=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
