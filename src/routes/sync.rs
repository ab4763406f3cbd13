// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Opaque cross-device sync blob.
//!
//! The backend stores whatever JSON the frontend sends and returns it
//! verbatim. Last write wins; no merging or conflict resolution.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/data", get(get_data).post(set_data))
}

async fn get_data(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let blob = state.store.get_sync_blob().await?;
    Ok(Json(blob))
}

#[derive(Serialize)]
pub struct SetDataResponse {
    pub success: bool,
}

async fn set_data(
    State(state): State<Arc<AppState>>,
    Json(blob): Json<serde_json::Value>,
) -> Result<Json<SetDataResponse>> {
    state.store.set_sync_blob(blob).await?;
    Ok(Json(SetDataResponse { success: true }))
}
