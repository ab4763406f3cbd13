// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Local gamified task routes.
//!
//! These tasks live entirely in local storage (no provider round-trips);
//! completion changes flow through the ledger so XP/Gold stay consistent.

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{LocalTask, Recurrence, RewardStrategy};
use crate::services::ToggleOutcome;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/local-tasks/user/{user_id}", get(list_for_user))
        .route("/local-tasks", post(create))
        .route("/local-tasks/{id}", put(update).delete(remove))
        .route("/local-tasks/{id}/complete", post(complete))
        .route("/local-tasks/{id}/uncomplete", post(uncomplete))
}

async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LocalTask>>> {
    let tasks = state.store.list_local_tasks_for_user(&user_id).await?;
    Ok(Json(tasks))
}

#[derive(Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "at least one assignee is required"))]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default)]
    pub gold_reward: u32,
    #[serde(default)]
    pub reward_strategy: RewardStrategy,
    #[serde(default)]
    pub recurrence: Recurrence,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Json<LocalTask>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let task = LocalTask {
        id: uuid::Uuid::new_v4().to_string(),
        title: payload.title,
        assigned_to: payload.assigned_to,
        completed: false,
        xp_reward: payload.xp_reward,
        gold_reward: payload.gold_reward,
        reward_strategy: payload.reward_strategy,
        recurrence: payload.recurrence,
        granted: vec![],
        created_at: crate::time_utils::format_utc_rfc3339(chrono::Utc::now()),
    };
    state.store.upsert_local_task(&task).await?;

    tracing::info!(task_id = %task.id, title = %task.title, "Local task created");
    Ok(Json(task))
}

#[derive(Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "at least one assignee is required"))]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default)]
    pub gold_reward: u32,
    #[serde(default)]
    pub reward_strategy: RewardStrategy,
    #[serde(default)]
    pub recurrence: Recurrence,
}

/// Update a task's configuration.
///
/// Completion state and recorded grants are not touched here: changing the
/// reward config of a completed task must not rewrite what was granted.
async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<LocalTask>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut task = state
        .store
        .get_local_task(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Local task {}", id)))?;

    task.title = payload.title;
    task.assigned_to = payload.assigned_to;
    task.xp_reward = payload.xp_reward;
    task.gold_reward = payload.gold_reward;
    task.reward_strategy = payload.reward_strategy;
    task.recurrence = payload.recurrence;

    state.store.upsert_local_task(&task).await?;
    Ok(Json(task))
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if !state.store.delete_local_task(&id).await? {
        return Err(AppError::NotFound(format!("Local task {}", id)));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleOutcome>> {
    let outcome = state.ledger.set_completed(&id, true).await?;
    Ok(Json(outcome))
}

async fn uncomplete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleOutcome>> {
    let outcome = state.ledger.set_completed(&id, false).await?;
    Ok(Json(outcome))
}
