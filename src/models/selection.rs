//! Per-user calendar and task-list sync selections.
//!
//! Ids must belong to calendars/lists visible to the user's current linked
//! account. Stale ids (e.g. a calendar no longer shared) are tolerated and
//! simply produce no items.

use serde::{Deserialize, Serialize};

/// Calendars a user has chosen to sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarSelection {
    pub user_id: String,
    #[serde(default)]
    pub calendar_ids: Vec<String>,
}

/// Task lists a user has chosen to sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskListSelection {
    pub user_id: String,
    #[serde(default)]
    pub list_ids: Vec<String>,
}
