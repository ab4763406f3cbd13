// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Hearthboard: backend proxy for a family kiosk dashboard.
//!
//! Aggregates Google Calendar and Tasks across linked accounts, manages the
//! OAuth token lifecycle, and layers local gamified tasks and stats on top.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::{Aggregator, AuthService, CalendarApi, LedgerService, Mutator, PhotosApi, TasksApi};
use store::JsonStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: JsonStore,
    pub auth: AuthService,
    pub calendar: CalendarApi,
    pub tasks: TasksApi,
    pub photos: PhotosApi,
    pub aggregator: Aggregator,
    /// Optimistic cache + command runner for aggregated events.
    pub event_items: Mutator,
    /// Optimistic cache + command runner for aggregated provider tasks.
    pub task_items: Mutator,
    pub ledger: LedgerService,
}
