// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Shared helpers for router-level tests.

use hearthboard::config::Config;
use hearthboard::routes::create_router;
use hearthboard::services::{
    Aggregator, ApiClient, AuthService, CalendarApi, GoogleFetch, GoogleTokenExchanger, ItemCache,
    LedgerService, Mutator, PhotosApi, TasksApi,
};
use hearthboard::store::JsonStore;
use hearthboard::AppState;
use std::sync::Arc;

/// Build a full router over an in-memory store.
///
/// The Google clients are real but unused by the local-only routes these
/// tests exercise; nothing here touches the network.
pub fn create_test_app() -> (axum::Router, JsonStore) {
    let config = Config::default();
    let store = JsonStore::new_in_memory();

    let exchanger = Arc::new(GoogleTokenExchanger::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    ));
    let auth = AuthService::new(
        store.clone(),
        exchanger,
        Arc::new(dashmap::DashMap::new()),
    );

    let api = ApiClient::new();
    let calendar = CalendarApi::new(api.clone());
    let tasks = TasksApi::new(api.clone());
    let photos = PhotosApi::new(api);

    let fetcher = Arc::new(GoogleFetch::new(
        auth.clone(),
        calendar.clone(),
        tasks.clone(),
    ));

    let state = Arc::new(AppState {
        config,
        store: store.clone(),
        auth,
        calendar,
        tasks,
        photos,
        aggregator: Aggregator::new(fetcher),
        event_items: Mutator::new(Arc::new(ItemCache::new())),
        task_items: Mutator::new(Arc::new(ItemCache::new())),
        ledger: LedgerService::new(store.clone()),
    });

    (create_router(state), store)
}
