// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Google OAuth token routes.
//!
//! The frontend never sees a refresh token: callbacks store it server-side
//! and every response carries only the access token and its expiry (epoch
//! milliseconds, the shape the Google JS client uses).

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Provider;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/refresh/{user_id}", get(refresh))
        .route("/auth/callback", post(callback))
        .route("/auth/accounts/{user_id}/{provider}", delete(disconnect))
}

fn parse_provider(value: Option<&str>) -> Result<Provider> {
    // Storage is keyed by (user, provider); callers that predate multi-provider
    // support omit it and mean the calendar connection.
    value
        .unwrap_or("calendar")
        .parse()
        .map_err(AppError::Validation)
}

/// Access token + expiry as exposed to the frontend.
#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Epoch milliseconds
    pub expiry_date: i64,
}

#[derive(Deserialize)]
pub struct RefreshParams {
    #[serde(default)]
    provider: Option<String>,
}

/// Get a currently-valid access token, refreshing if needed.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<RefreshParams>,
) -> Result<Json<TokenResponse>> {
    let provider = parse_provider(params.provider.as_deref())?;

    let access_token = state.auth.fresh_token(&user_id, provider).await?;
    let expires_at = state.auth.stored_expiry(&user_id, provider).await?;

    Ok(Json(TokenResponse {
        access_token,
        expiry_date: expires_at.timestamp_millis(),
    }))
}

#[derive(Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub user_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct CallbackResponse {
    pub tokens: TokenResponse,
}

/// OAuth callback - exchange the authorization code and link the account.
async fn callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CallbackRequest>,
) -> Result<Json<CallbackResponse>> {
    let provider = parse_provider(payload.provider.as_deref())?;
    let display_name = payload
        .display_name
        .unwrap_or_else(|| payload.user_id.clone());

    let grant = state
        .auth
        .handle_oauth_callback(
            &payload.user_id,
            provider,
            &payload.code,
            &payload.redirect_uri,
            &display_name,
            payload.color,
        )
        .await?;

    Ok(Json(CallbackResponse {
        tokens: TokenResponse {
            access_token: grant.access_token,
            expiry_date: grant.expires_at.timestamp_millis(),
        },
    }))
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

/// Explicitly unlink an account.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Path((user_id, provider)): Path<(String, String)>,
) -> Result<Json<DisconnectResponse>> {
    let provider = parse_provider(Some(&provider))?;
    state.auth.disconnect(&user_id, provider).await?;
    Ok(Json(DisconnectResponse { success: true }))
}
