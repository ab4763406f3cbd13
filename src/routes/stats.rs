// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! XP/Gold stats routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats/{user_id}", get(get_stats))
        .route("/stats/{user_id}/xp", post(add_xp))
        .route("/stats/{user_id}/gold", post(add_gold))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    pub xp: i64,
    pub gold: i64,
    pub level: u32,
}

#[derive(Serialize)]
pub struct AdjustResponse {
    pub xp: i64,
    pub gold: i64,
    pub level: u32,
    pub leveled_up: bool,
}

/// Amount may be negative (manual corrections, spent gold).
#[derive(Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<StatsResponse>> {
    let stats = state.store.get_stats(&user_id).await?;
    Ok(Json(StatsResponse {
        user_id: stats.user_id.clone(),
        xp: stats.xp,
        gold: stats.gold,
        level: stats.level(),
    }))
}

async fn add_xp(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<AdjustResponse>> {
    adjust(&state, &user_id, payload.amount, 0).await
}

async fn add_gold(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<AdjustResponse>> {
    adjust(&state, &user_id, 0, payload.amount).await
}

async fn adjust(
    state: &AppState,
    user_id: &str,
    xp_delta: i64,
    gold_delta: i64,
) -> Result<Json<AdjustResponse>> {
    let mut stats = state.store.get_stats(user_id).await?;
    let now = crate::time_utils::format_utc_rfc3339(chrono::Utc::now());
    let leveled_up = stats.apply(xp_delta, gold_delta, &now);
    state.store.set_stats(&stats).await?;

    tracing::info!(
        user_id = %user_id,
        xp_delta,
        gold_delta,
        leveled_up,
        "Stats adjusted"
    );

    Ok(Json(AdjustResponse {
        xp: stats.xp,
        gold: stats.gold,
        level: stats.level(),
        leveled_up,
    }))
}
