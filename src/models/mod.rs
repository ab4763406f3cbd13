// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Data models for the application.

pub mod account;
pub mod item;
pub mod selection;
pub mod stats;
pub mod task;

pub use account::{LinkedAccount, Provider};
pub use item::{AggregatedItem, ItemKind};
pub use selection::{CalendarSelection, TaskListSelection};
pub use stats::UserStats;
pub use task::{LocalTask, Recurrence, RewardGrant, RewardStrategy};
