//! Normalized aggregated items (events and tasks).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an aggregated item came from a calendar or a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Event,
    Task,
}

/// A normalized event or task from one provider, tagged with its source
/// account for UI attribution.
///
/// `id` is the provider-native id, globally unique within one provider.
/// Within one aggregation pass an id appears at most once in the output even
/// if visible from two selected calendars (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedItem {
    /// Provider-native item id
    pub id: String,
    pub kind: ItemKind,
    /// User id of the linked account this item came from
    pub source_account_id: String,
    /// Calendar or task-list id this item came from
    pub source_calendar_id: String,
    pub title: String,
    /// Event start (None for tasks without a due date)
    pub start: Option<DateTime<Utc>>,
    /// Event end
    pub end: Option<DateTime<Utc>>,
    /// Completion state (always false for events)
    #[serde(default)]
    pub completed: bool,
    /// Display name of the source account
    pub account_name: String,
    /// Attribution color of the source account
    pub account_color: Option<String>,
}
