// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Services module - business logic layer.

pub mod aggregator;
pub mod auth;
pub mod google;
pub mod ledger;
pub mod mutation;

pub use aggregator::{AggregateOutcome, Aggregator, DateRange, GoogleFetch, PartialError};
pub use auth::{AuthService, GoogleTokenExchanger, RefreshLocks, TokenExchanger, TokenGrant};
pub use google::{ApiClient, CalendarApi, PhotosApi, SessionState, TasksApi};
pub use ledger::{LedgerService, ToggleOutcome};
pub use mutation::{ItemCache, ItemCommand, MutationOutcome, Mutator};
