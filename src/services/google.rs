// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Thin typed clients over the Google Calendar, Tasks, and Photos Picker
//! REST APIs.
//!
//! All calls go through one request core that:
//! - attaches the bearer token
//! - classifies 401 as `AuthExpired` (callers re-resolve the token and retry
//!   at most once; never in a loop)
//! - retries 429/5xx/network failures up to 3 attempts with exponential
//!   backoff
//! - treats 204 / empty bodies as success-with-no-payload, distinct from a
//!   parse failure

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 250;

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseClass {
    Success,
    NoContent,
    AuthExpired,
    Retryable,
    ClientError,
}

pub(crate) fn classify_status(status: StatusCode) -> ResponseClass {
    if status == StatusCode::NO_CONTENT {
        ResponseClass::NoContent
    } else if status.is_success() {
        ResponseClass::Success
    } else if status == StatusCode::UNAUTHORIZED {
        ResponseClass::AuthExpired
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ResponseClass::Retryable
    } else {
        ResponseClass::ClientError
    }
}

/// Backoff before retry `attempt` (0-based): 250ms, 500ms, 1s, ...
pub(crate) fn backoff_delay(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_millis(BACKOFF_BASE_MS << attempt)
}

/// Shared request core for all provider clients.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Perform an authenticated request with bounded retry.
    ///
    /// Returns `Ok(None)` for 204/empty responses.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, AppError> {
        let mut last_failure = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            let mut req = self.http.request(method.clone(), url).bearer_auth(access_token);
            if let Some(json) = body {
                req = req.json(json);
            }

            let response = match req.send().await {
                Ok(r) => r,
                Err(e) => {
                    // Network failure counts against the retry budget
                    last_failure = e.to_string();
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    return Err(AppError::Transient(last_failure));
                }
            };

            let status = response.status();
            match classify_status(status) {
                ResponseClass::NoContent => return Ok(None),
                ResponseClass::Success => {
                    let text = response.text().await.map_err(|e| {
                        AppError::Provider(format!("Failed to read response body: {}", e))
                    })?;
                    if text.is_empty() {
                        return Ok(None);
                    }
                    return serde_json::from_str(&text)
                        .map(Some)
                        .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)));
                }
                ResponseClass::AuthExpired => return Err(AppError::AuthExpired),
                ResponseClass::Retryable => {
                    let body = response.text().await.unwrap_or_default();
                    last_failure = format!("HTTP {}: {}", status, body);
                    tracing::warn!(status = %status, attempt, "Retryable provider response");
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    return Err(AppError::Transient(last_failure));
                }
                ResponseClass::ClientError => {
                    let body = response.text().await.unwrap_or_default();
                    // 404 stays distinguishable from other client errors so
                    // callers can treat a vanished resource specially.
                    if status == StatusCode::NOT_FOUND {
                        return Err(AppError::NotFound(format!("{} ({})", url, body)));
                    }
                    return Err(AppError::Provider(format!("HTTP {}: {}", status, body)));
                }
            }
        }

        Err(AppError::Transient(last_failure))
    }

    async fn get_typed<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let value = self
            .request(Method::GET, url, access_token, None)
            .await?
            .ok_or_else(|| AppError::Provider("Expected a response body".to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Calendar API (Google Calendar v3)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CalendarApi {
    api: ApiClient,
    base_url: String,
}

/// Event time as returned by the Calendar API: either a timestamp or an
/// all-day date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl EventTime {
    /// Resolve to a UTC timestamp; all-day dates map to midnight UTC.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        self.date_time.or_else(|| {
            self.date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEventDto {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
}

#[derive(Deserialize)]
struct EventListBody {
    #[serde(default)]
    items: Vec<CalendarEventDto>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
}

#[derive(Deserialize)]
struct CalendarListBody {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

impl CalendarApi {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            base_url: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(api: ApiClient, base_url: String) -> Self {
        Self { api, base_url }
    }

    /// List the calendars visible to this account.
    pub async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarListEntry>, AppError> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let body: CalendarListBody = self.api.get_typed(&url, access_token).await?;
        Ok(body.items)
    }

    /// List events on one calendar within a date range, recurring events
    /// expanded.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEventDto>, AppError> {
        let url = format!(
            "{}/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime&maxResults=250",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(&time_min.to_rfc3339()),
            urlencoding::encode(&time_max.to_rfc3339()),
        );
        let value = self
            .api
            .request(Method::GET, &url, access_token, None)
            .await?
            .ok_or_else(|| AppError::Provider("Empty event list response".to_string()))?;
        let body: EventListBody = serde_json::from_value(value)
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))?;
        Ok(body.items)
    }

    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &Value,
    ) -> Result<Option<Value>, AppError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );
        self.api
            .request(Method::POST, &url, access_token, Some(event))
            .await
    }

    pub async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        patch: &Value,
    ) -> Result<Option<Value>, AppError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id),
        );
        self.api
            .request(Method::PATCH, &url, access_token, Some(patch))
            .await
    }

    /// Delete an event. Google replies 204; `Ok(())` only on success.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id),
        );
        self.api
            .request(Method::DELETE, &url, access_token, None)
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks API (Google Tasks v1)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct TasksApi {
    api: ApiClient,
    base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskDto {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// "needsAction" or "completed"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
}

impl TaskDto {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

#[derive(Deserialize)]
struct TaskListBody {
    #[serde(default)]
    items: Vec<TaskDto>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct TaskListEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
struct TaskListsBody {
    #[serde(default)]
    items: Vec<TaskListEntry>,
}

impl TasksApi {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            base_url: "https://tasks.googleapis.com/tasks/v1".to_string(),
        }
    }

    pub async fn list_task_lists(&self, access_token: &str) -> Result<Vec<TaskListEntry>, AppError> {
        let url = format!("{}/users/@me/lists", self.base_url);
        let body: TaskListsBody = self.api.get_typed(&url, access_token).await?;
        Ok(body.items)
    }

    pub async fn list_tasks(
        &self,
        access_token: &str,
        list_id: &str,
    ) -> Result<Vec<TaskDto>, AppError> {
        let url = format!(
            "{}/lists/{}/tasks?showCompleted=true&showHidden=true&maxResults=100",
            self.base_url,
            urlencoding::encode(list_id),
        );
        let body: TaskListBody = self.api.get_typed(&url, access_token).await?;
        Ok(body.items)
    }

    pub async fn insert_task(
        &self,
        access_token: &str,
        list_id: &str,
        task: &Value,
    ) -> Result<Option<Value>, AppError> {
        let url = format!(
            "{}/lists/{}/tasks",
            self.base_url,
            urlencoding::encode(list_id)
        );
        self.api
            .request(Method::POST, &url, access_token, Some(task))
            .await
    }

    pub async fn patch_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
        patch: &Value,
    ) -> Result<Option<Value>, AppError> {
        let url = format!(
            "{}/lists/{}/tasks/{}",
            self.base_url,
            urlencoding::encode(list_id),
            urlencoding::encode(task_id),
        );
        self.api
            .request(Method::PATCH, &url, access_token, Some(patch))
            .await
    }

    /// Set a task's completion state.
    pub async fn set_completed(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
        completed: bool,
    ) -> Result<Option<Value>, AppError> {
        let patch = if completed {
            serde_json::json!({ "status": "completed" })
        } else {
            // Clearing completion also requires clearing the completed stamp
            serde_json::json!({ "status": "needsAction", "completed": null })
        };
        self.patch_task(access_token, list_id, task_id, &patch).await
    }

    pub async fn delete_task(
        &self,
        access_token: &str,
        list_id: &str,
        task_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/lists/{}/tasks/{}",
            self.base_url,
            urlencoding::encode(list_id),
            urlencoding::encode(task_id),
        );
        self.api
            .request(Method::DELETE, &url, access_token, None)
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Photos Picker API (Google Photos Picker v1)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PhotosApi {
    api: ApiClient,
    base_url: String,
}

/// Terminal states of a picker session poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Picked,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerSession {
    pub id: String,
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default)]
    pub media_items_set: bool,
    /// Server-side session expiry
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
}

impl PhotosApi {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            base_url: "https://photospicker.googleapis.com/v1".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(api: ApiClient, base_url: String) -> Self {
        Self { api, base_url }
    }

    pub async fn create_session(&self, access_token: &str) -> Result<PickerSession, AppError> {
        let url = format!("{}/sessions", self.base_url);
        let value = self
            .api
            .request(Method::POST, &url, access_token, Some(&serde_json::json!({})))
            .await?
            .ok_or_else(|| AppError::Provider("Empty picker session response".to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
    }

    pub async fn get_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<PickerSession, AppError> {
        let url = format!(
            "{}/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        );
        self.api.get_typed(&url, access_token).await
    }

    /// Delete a session (component teardown / user cancel).
    pub async fn delete_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<(), AppError> {
        let url = format!(
            "{}/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        );
        self.api
            .request(Method::DELETE, &url, access_token, None)
            .await?;
        Ok(())
    }

    /// Poll until the session reaches a terminal state or the poll budget
    /// runs out.
    ///
    /// Bounded: at most `max_polls` requests, `interval` apart. A session
    /// that disappears server-side (404) counts as cancelled; a session past
    /// its server-side expiry is expired. Other provider errors propagate.
    /// Budget exhaustion reports `Active`, so callers can wait again.
    pub async fn poll_session(
        &self,
        access_token: &str,
        session_id: &str,
        max_polls: u32,
        interval: std::time::Duration,
    ) -> Result<SessionState, AppError> {
        for _ in 0..max_polls {
            match self.get_session(access_token, session_id).await {
                Ok(session) if session.media_items_set => return Ok(SessionState::Picked),
                Ok(session) => {
                    if session.expire_time.is_some_and(|t| t <= Utc::now()) {
                        return Ok(SessionState::Expired);
                    }
                }
                Err(AppError::NotFound(_)) => return Ok(SessionState::Cancelled),
                Err(e) => return Err(e),
            }
            tokio::time::sleep(interval).await;
        }
        Ok(SessionState::Active)
    }
}
