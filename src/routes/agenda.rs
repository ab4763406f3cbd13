// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Aggregated agenda routes: cross-account events and tasks.
//!
//! Reads fan out through the aggregator and commit into the item caches;
//! writes go through the optimistic mutation layer, so the frontend sees the
//! change immediately and a failed provider call rolls it back exactly.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{AggregatedItem, CalendarSelection, ItemKind, Provider, TaskListSelection};
use crate::services::auth::with_token_retry;
use crate::services::google::{CalendarListEntry, TaskListEntry};
use crate::services::{AggregateOutcome, DateRange, ItemCommand};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agenda/events", get(list_events).post(create_event))
        .route(
            "/agenda/events/{account}/{calendar}/{id}",
            put(update_event).delete(delete_event),
        )
        .route("/agenda/tasks", get(list_tasks))
        .route("/agenda/tasks/{account}/{list}/{id}/toggle", post(toggle_task))
        .route("/agenda/calendars/{user_id}", get(list_calendars))
        .route("/agenda/task-lists/{user_id}", get(list_task_lists))
        .route(
            "/agenda/selections/calendars/{user_id}",
            get(get_calendar_selection).put(put_calendar_selection),
        )
        .route(
            "/agenda/selections/task-lists/{user_id}",
            get(get_task_list_selection).put(put_task_list_selection),
        )
}

// ─── Aggregated reads ────────────────────────────────────────

#[derive(Deserialize)]
pub struct EventRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aggregate events across every linked calendar account.
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventRangeParams>,
) -> Result<Json<AggregateOutcome>> {
    if params.end <= params.start {
        return Err(AppError::Validation(
            "end must be after start".to_string(),
        ));
    }

    let accounts = state.store.list_accounts(Provider::Calendar).await?;
    let mut selections: HashMap<String, Vec<String>> = HashMap::new();
    for account in &accounts {
        let selection = state.store.get_calendar_selection(&account.user_id).await?;
        selections.insert(account.user_id.clone(), selection.calendar_ids);
    }

    let outcome = state
        .aggregator
        .fetch_all_events(
            &accounts,
            &selections,
            DateRange {
                start: params.start,
                end: params.end,
            },
        )
        .await;

    state
        .event_items
        .cache()
        .commit(outcome.items.clone(), outcome.generation);

    Ok(Json(outcome))
}

/// Aggregate tasks across every linked tasks account.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<AggregateOutcome>> {
    let accounts = state.store.list_accounts(Provider::Tasks).await?;
    let mut selections: HashMap<String, Vec<String>> = HashMap::new();
    for account in &accounts {
        let selection = state.store.get_task_list_selection(&account.user_id).await?;
        selections.insert(account.user_id.clone(), selection.list_ids);
    }

    let outcome = state.aggregator.fetch_all_tasks(&accounts, &selections).await;

    state
        .task_items
        .cache()
        .commit(outcome.items.clone(), outcome.generation);

    Ok(Json(outcome))
}

// ─── Event mutations ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateEventRequest {
    pub user_id: String,
    pub calendar_id: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
    /// The caller should re-fetch the agenda so authoritative provider state
    /// replaces the optimistic local change.
    pub refresh_needed: bool,
}

fn event_body(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "summary": title,
        "start": { "dateTime": start.to_rfc3339() },
        "end": { "dateTime": end.to_rfc3339() },
    })
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateEventRequest>,
) -> Result<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if payload.end <= payload.start {
        return Err(AppError::Validation("end must be after start".to_string()));
    }

    let account = state
        .store
        .get_account(&payload.user_id, Provider::Calendar)
        .await?
        .ok_or(AppError::AuthRequired)?;

    // Placeholder id until the next aggregation replaces it with Google's
    let optimistic = AggregatedItem {
        id: format!("local-{}", uuid::Uuid::new_v4()),
        kind: ItemKind::Event,
        source_account_id: account.user_id.clone(),
        source_calendar_id: payload.calendar_id.clone(),
        title: payload.title.clone(),
        start: Some(payload.start),
        end: Some(payload.end),
        completed: false,
        account_name: account.display_name.clone(),
        account_color: account.color.clone(),
    };

    let body = event_body(&payload.title, payload.start, payload.end);
    let calendar = state.calendar.clone();
    let auth = state.auth.clone();
    let user_id = payload.user_id.clone();
    let calendar_id = payload.calendar_id.clone();

    let outcome = state
        .event_items
        .run(
            ItemCommand::Upsert(optimistic),
            || async move {
                with_token_retry(&auth, &user_id, Provider::Calendar, |token| {
                    let calendar = calendar.clone();
                    let calendar_id = calendar_id.clone();
                    let body = body.clone();
                    async move {
                        calendar
                            .insert_event(&token, &calendar_id, &body)
                            .await
                            .map(|_| ())
                    }
                })
                .await
            },
        )
        .await?;

    Ok(Json(MutationResponse {
        success: true,
        refresh_needed: outcome.refresh_needed,
    }))
}

#[derive(Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    Path((account_id, calendar_id, event_id)): Path<(String, String, String)>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut optimistic = state
        .event_items
        .cache()
        .find(&event_id)
        .ok_or_else(|| AppError::NotFound(format!("Event {}", event_id)))?;
    optimistic.title = payload.title.clone();
    optimistic.start = Some(payload.start);
    optimistic.end = Some(payload.end);

    let patch = event_body(&payload.title, payload.start, payload.end);
    let calendar = state.calendar.clone();
    let auth = state.auth.clone();

    let outcome = state
        .event_items
        .run(
            ItemCommand::Upsert(optimistic),
            || async move {
                with_token_retry(&auth, &account_id, Provider::Calendar, |token| {
                    let calendar = calendar.clone();
                    let calendar_id = calendar_id.clone();
                    let event_id = event_id.clone();
                    let patch = patch.clone();
                    async move {
                        calendar
                            .patch_event(&token, &calendar_id, &event_id, &patch)
                            .await
                            .map(|_| ())
                    }
                })
                .await
            },
        )
        .await?;

    Ok(Json(MutationResponse {
        success: true,
        refresh_needed: outcome.refresh_needed,
    }))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path((account_id, calendar_id, event_id)): Path<(String, String, String)>,
) -> Result<Json<MutationResponse>> {
    let calendar = state.calendar.clone();
    let auth = state.auth.clone();
    let removed_id = event_id.clone();

    let outcome = state
        .event_items
        .run(
            ItemCommand::Remove { id: removed_id },
            || async move {
                with_token_retry(&auth, &account_id, Provider::Calendar, |token| {
                    let calendar = calendar.clone();
                    let calendar_id = calendar_id.clone();
                    let event_id = event_id.clone();
                    async move { calendar.delete_event(&token, &calendar_id, &event_id).await }
                })
                .await
            },
        )
        .await?;

    Ok(Json(MutationResponse {
        success: true,
        refresh_needed: outcome.refresh_needed,
    }))
}

// ─── Task mutations ──────────────────────────────────────────

#[derive(Serialize)]
pub struct ToggleTaskResponse {
    pub completed: bool,
    pub refresh_needed: bool,
}

/// Flip a provider task's completion state.
async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path((account_id, list_id, task_id)): Path<(String, String, String)>,
) -> Result<Json<ToggleTaskResponse>> {
    let current = state
        .task_items
        .cache()
        .find(&task_id)
        .ok_or_else(|| AppError::NotFound(format!("Task {}", task_id)))?;

    // Flip, not set: the target is derived from the current cached state
    let target = !current.completed;
    let mut optimistic = current;
    optimistic.completed = target;

    let tasks = state.tasks.clone();
    let auth = state.auth.clone();

    let outcome = state
        .task_items
        .run(
            ItemCommand::Upsert(optimistic),
            || async move {
                with_token_retry(&auth, &account_id, Provider::Tasks, |token| {
                    let tasks = tasks.clone();
                    let list_id = list_id.clone();
                    let task_id = task_id.clone();
                    async move {
                        tasks
                            .set_completed(&token, &list_id, &task_id, target)
                            .await
                            .map(|_| ())
                    }
                })
                .await
            },
        )
        .await?;

    Ok(Json(ToggleTaskResponse {
        completed: target,
        refresh_needed: outcome.refresh_needed,
    }))
}

// ─── Calendar / task-list discovery and selections ───────────

async fn list_calendars(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CalendarListEntry>>> {
    let calendar = state.calendar.clone();
    let entries = with_token_retry(&state.auth, &user_id, Provider::Calendar, |token| {
        let calendar = calendar.clone();
        async move { calendar.list_calendars(&token).await }
    })
    .await?;
    Ok(Json(entries))
}

async fn list_task_lists(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<TaskListEntry>>> {
    let tasks = state.tasks.clone();
    let entries = with_token_retry(&state.auth, &user_id, Provider::Tasks, |token| {
        let tasks = tasks.clone();
        async move { tasks.list_task_lists(&token).await }
    })
    .await?;
    Ok(Json(entries))
}

async fn get_calendar_selection(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CalendarSelection>> {
    let selection = state.store.get_calendar_selection(&user_id).await?;
    Ok(Json(selection))
}

#[derive(Deserialize)]
pub struct CalendarSelectionRequest {
    pub calendar_ids: Vec<String>,
}

async fn put_calendar_selection(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<CalendarSelectionRequest>,
) -> Result<Json<CalendarSelection>> {
    let selection = CalendarSelection {
        user_id,
        calendar_ids: payload.calendar_ids,
    };
    state.store.set_calendar_selection(&selection).await?;
    Ok(Json(selection))
}

async fn get_task_list_selection(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<TaskListSelection>> {
    let selection = state.store.get_task_list_selection(&user_id).await?;
    Ok(Json(selection))
}

#[derive(Deserialize)]
pub struct TaskListSelectionRequest {
    pub list_ids: Vec<String>,
}

async fn put_task_list_selection(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<TaskListSelectionRequest>,
) -> Result<Json<TaskListSelection>> {
    let selection = TaskListSelection {
        user_id,
        list_ids: payload.list_ids,
    };
    state.store.set_task_list_selection(&selection).await?;
    Ok(Json(selection))
}
