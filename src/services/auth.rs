// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! OAuth token lifecycle for linked Google accounts.
//!
//! Handles:
//! - Transparent access-token refresh when expired (60 s safety margin)
//! - Single-flight refresh per (user, provider) key
//! - Definitive-vs-transient failure classification: a rejected refresh
//!   token tears down the stored account (the user must reconnect), while a
//!   transient failure leaves credentials intact for a later retry
//! - Authorization-code exchange on OAuth callback

use crate::error::AppError;
use crate::models::{LinkedAccount, Provider};
use crate::store::JsonStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Shared per-key refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Result of a successful token exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    /// Present on code exchange; absent on most refreshes.
    pub refresh_token: Option<String>,
}

/// Failure modes of the token endpoint, classified for callers.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// Definitive rejection (revoked/invalid refresh token). The stored
    /// account must be torn down; retrying is pointless.
    #[error("Token refresh rejected: {0}")]
    Rejected(String),

    /// Network failure or 5xx. Credentials stay intact; retry later.
    #[error("Token endpoint unavailable: {0}")]
    Transient(String),
}

/// Port for the OAuth token endpoint, injectable for tests.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ExchangeError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ExchangeError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// GoogleTokenExchanger - production implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Token endpoint client for Google OAuth.
#[derive(Clone)]
pub struct GoogleTokenExchanger {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct GoogleTokenBody {
    access_token: String,
    /// Lifetime in seconds
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl GoogleTokenExchanger {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            client_id,
            client_secret,
        }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ExchangeError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| ExchangeError::Transient(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let body: GoogleTokenBody = response
                .json()
                .await
                .map_err(|e| ExchangeError::Transient(format!("Token parse error: {}", e)))?;
            return Ok(TokenGrant {
                access_token: body.access_token,
                expires_at: Utc::now() + Duration::seconds(body.expires_in),
                refresh_token: body.refresh_token,
            });
        }

        let body = response.text().await.unwrap_or_default();

        // 400/401 from the token endpoint means invalid_grant or revoked
        // client credentials. Anything else (429/5xx) is retryable.
        if status.as_u16() == 400 || status.as_u16() == 401 {
            Err(ExchangeError::Rejected(format!("HTTP {}: {}", status, body)))
        } else {
            Err(ExchangeError::Transient(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl TokenExchanger for GoogleTokenExchanger {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ExchangeError> {
        self.post_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ExchangeError> {
        self.post_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthService - token lifecycle with single-flight refresh
// ─────────────────────────────────────────────────────────────────────────────

/// High-level service managing the token lifecycle for linked accounts.
#[derive(Clone)]
pub struct AuthService {
    store: JsonStore,
    exchanger: Arc<dyn TokenExchanger>,
    /// Per-(user, provider) mutex to serialize refresh operations.
    refresh_locks: RefreshLocks,
}

fn lock_key(user_id: &str, provider: Provider) -> String {
    format!("{}:{}", user_id, provider.as_str())
}

impl AuthService {
    pub fn new(store: JsonStore, exchanger: Arc<dyn TokenExchanger>, refresh_locks: RefreshLocks) -> Self {
        Self {
            store,
            exchanger,
            refresh_locks,
        }
    }

    /// Get a currently-valid access token for the given account.
    ///
    /// Fast path: if the stored token has more than the safety margin left,
    /// it is returned without any network call. Otherwise a refresh runs
    /// under a per-key lock; concurrent callers wait for the in-flight
    /// refresh and reuse its result instead of issuing duplicates.
    pub async fn fresh_token(&self, user_id: &str, provider: Provider) -> Result<String, AppError> {
        let now = Utc::now();

        // Fast path - no lock, no network
        let account = self
            .store
            .get_account(user_id, provider)
            .await?
            .ok_or(AppError::AuthRequired)?;
        if account.token_valid_at(now, TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(account.access_token);
        }

        // Serialize the refresh for this key
        let lock = self
            .refresh_locks
            .entry(lock_key(user_id, provider))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: another task may have refreshed
        // while we were waiting.
        let account = self
            .store
            .get_account(user_id, provider)
            .await?
            .ok_or(AppError::AuthRequired)?;
        if account.token_valid_at(Utc::now(), TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(account.access_token);
        }

        self.refresh_locked(account).await
    }

    /// Force a refresh after an upstream 401, ignoring the stored expiry.
    ///
    /// If the stored token already differs from the rejected one, another
    /// task refreshed in the meantime and the stored token is returned as-is.
    pub async fn refreshed_token(
        &self,
        user_id: &str,
        provider: Provider,
        rejected_token: &str,
    ) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(lock_key(user_id, provider))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let account = self
            .store
            .get_account(user_id, provider)
            .await?
            .ok_or(AppError::AuthRequired)?;
        if account.access_token != rejected_token {
            return Ok(account.access_token);
        }

        self.refresh_locked(account).await
    }

    /// Perform the refresh. Caller must hold the per-key lock.
    async fn refresh_locked(&self, account: LinkedAccount) -> Result<String, AppError> {
        let user_id = account.user_id.clone();
        let provider = account.provider;

        // Expired without a server-side refresh token: terminal, no network.
        if !account.refreshable {
            return Err(AppError::AuthRequired);
        }

        let refresh_token = self
            .store
            .get_refresh_token(&user_id, provider)
            .await?
            .ok_or(AppError::AuthRequired)?;

        tracing::info!(user_id = %user_id, provider = %provider, "Access token expired, refreshing");

        match self.exchanger.refresh(&refresh_token).await {
            Ok(grant) => {
                let updated = LinkedAccount {
                    access_token: grant.access_token.clone(),
                    expires_at: grant.expires_at,
                    ..account
                };
                self.store.set_account(&updated).await?;

                // Google occasionally rotates the refresh token
                if let Some(new_refresh) = grant.refresh_token {
                    self.store
                        .set_refresh_token(&user_id, provider, &new_refresh)
                        .await?;
                }

                tracing::info!(user_id = %user_id, provider = %provider, "Token refreshed");
                Ok(grant.access_token)
            }
            Err(ExchangeError::Rejected(reason)) => {
                // Refresh token revoked: clear the account so the UI prompts
                // a reconnect instead of retrying forever.
                tracing::warn!(
                    user_id = %user_id,
                    provider = %provider,
                    reason = %reason,
                    "Refresh rejected, clearing linked account"
                );
                self.store.delete_account(&user_id, provider).await?;
                Err(AppError::AuthRequired)
            }
            Err(ExchangeError::Transient(reason)) => {
                // Do NOT delete credentials on transient errors; the caller
                // can retry later with the same refresh token.
                Err(AppError::Transient(reason))
            }
        }
    }

    /// Handle an OAuth callback: exchange the code and store the account.
    ///
    /// The refresh token is persisted server-side only; the returned grant
    /// carries just the access token and expiry.
    pub async fn handle_oauth_callback(
        &self,
        user_id: &str,
        provider: Provider,
        code: &str,
        redirect_uri: &str,
        display_name: &str,
        color: Option<String>,
    ) -> Result<TokenGrant, AppError> {
        let grant = match self.exchanger.exchange_code(code, redirect_uri).await {
            Ok(g) => g,
            Err(ExchangeError::Rejected(reason)) => {
                return Err(AppError::Validation(format!("Code exchange rejected: {}", reason)))
            }
            Err(ExchangeError::Transient(reason)) => return Err(AppError::Transient(reason)),
        };

        let refreshable = grant.refresh_token.is_some();
        let account = LinkedAccount {
            user_id: user_id.to_string(),
            provider,
            access_token: grant.access_token.clone(),
            expires_at: grant.expires_at,
            refreshable,
            display_name: display_name.to_string(),
            color,
        };
        self.store.set_account(&account).await?;

        if let Some(refresh_token) = &grant.refresh_token {
            self.store
                .set_refresh_token(user_id, provider, refresh_token)
                .await?;
        }

        tracing::info!(
            user_id = %user_id,
            provider = %provider,
            refreshable,
            "OAuth callback handled, account linked"
        );

        Ok(TokenGrant {
            refresh_token: None,
            ..grant
        })
    }

    /// Explicit disconnect: drop the account and its refresh token.
    pub async fn disconnect(&self, user_id: &str, provider: Provider) -> Result<(), AppError> {
        self.store.delete_account(user_id, provider).await?;
        tracing::info!(user_id = %user_id, provider = %provider, "Account disconnected");
        Ok(())
    }

    /// Stored expiry for a (user, provider), for the refresh endpoint reply.
    pub async fn stored_expiry(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<DateTime<Utc>, AppError> {
        let account = self
            .store
            .get_account(user_id, provider)
            .await?
            .ok_or(AppError::AuthRequired)?;
        Ok(account.expires_at)
    }
}

/// Run an authenticated provider call, retrying exactly once with a
/// force-refreshed token if the provider rejects the first one.
///
/// The single retry is the ceiling: a second 401 propagates as
/// `AuthExpired` so the UI can prompt reconnection instead of looping.
pub async fn with_token_retry<T, F, Fut>(
    auth: &AuthService,
    user_id: &str,
    provider: Provider,
    call: F,
) -> Result<T, AppError>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let token = auth.fresh_token(user_id, provider).await?;
    match call(token.clone()).await {
        Err(AppError::AuthExpired) => {
            let fresh = auth.refreshed_token(user_id, provider, &token).await?;
            call(fresh).await
        }
        other => other,
    }
}
