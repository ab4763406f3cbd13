// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Google Photos Picker session routes.
//!
//! The picker flow is session based: create a session, hand the picker URI to
//! the frontend, then wait until the user picks media or the session dies.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Provider;
use crate::services::auth::with_token_retry;
use crate::services::SessionState;
use crate::AppState;

/// One picker-session wait holds the request for at most
/// `WAIT_MAX_POLLS * WAIT_INTERVAL_SECS` seconds.
const WAIT_MAX_POLLS: u32 = 30;
const WAIT_INTERVAL_SECS: u64 = 2;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/photos/sessions/{user_id}", post(create_session))
        .route(
            "/photos/sessions/{user_id}/{session_id}/wait",
            get(wait_session),
        )
        .route(
            "/photos/sessions/{user_id}/{session_id}",
            delete(delete_session),
        )
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub picker_uri: Option<String>,
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let photos = state.photos.clone();
    let session = with_token_retry(&state.auth, &user_id, Provider::Photos, |token| {
        let photos = photos.clone();
        async move { photos.create_session(&token).await }
    })
    .await?;

    tracing::info!(user_id = %user_id, session_id = %session.id, "Picker session created");
    Ok(Json(SessionResponse {
        id: session.id,
        picker_uri: session.picker_uri,
    }))
}

#[derive(Serialize)]
pub struct WaitResponse {
    pub state: SessionState,
}

/// Long-poll a picker session until it reaches a terminal state or the wait
/// budget runs out (in which case the reported state is still `active` and
/// the frontend may wait again).
async fn wait_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<WaitResponse>> {
    let photos = state.photos.clone();
    let session_state = with_token_retry(&state.auth, &user_id, Provider::Photos, |token| {
        let photos = photos.clone();
        let session_id = session_id.clone();
        async move {
            photos
                .poll_session(
                    &token,
                    &session_id,
                    WAIT_MAX_POLLS,
                    std::time::Duration::from_secs(WAIT_INTERVAL_SECS),
                )
                .await
        }
    })
    .await?;

    Ok(Json(WaitResponse {
        state: session_state,
    }))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let photos = state.photos.clone();
    with_token_retry(&state.auth, &user_id, Provider::Photos, |token| {
        let photos = photos.clone();
        let session_id = session_id.clone();
        async move { photos.delete_session(&token, &session_id).await }
    })
    .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}
