// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! JSON file-backed store with typed operations.
//!
//! Provides high-level operations for:
//! - Linked accounts (one per (user, provider) pair)
//! - Server-side refresh tokens (never exposed through any API response)
//! - Calendar / task-list sync selections
//! - Local gamified tasks
//! - User stats
//! - The opaque cross-device sync blob
//!
//! All state lives in memory behind an RwLock and is persisted to a single
//! JSON file after every mutation (write to a temp file, then rename, so a
//! crash mid-write never corrupts the stored state).

use crate::error::AppError;
use crate::models::{CalendarSelection, LinkedAccount, LocalTask, Provider, TaskListSelection, UserStats};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

const STORE_FILE: &str = "hearthboard.json";

/// Everything the store persists, in one serializable blob.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
struct StoreData {
    #[serde(default)]
    accounts: HashMap<String, LinkedAccount>,
    /// Refresh tokens keyed like accounts; kept separate from the account
    /// record so they can never leak through account serialization.
    #[serde(default)]
    refresh_tokens: HashMap<String, String>,
    #[serde(default)]
    calendar_selections: HashMap<String, CalendarSelection>,
    #[serde(default)]
    task_list_selections: HashMap<String, TaskListSelection>,
    #[serde(default)]
    local_tasks: HashMap<String, LocalTask>,
    #[serde(default)]
    stats: HashMap<String, UserStats>,
    #[serde(default)]
    sync_blob: Option<serde_json::Value>,
}

/// JSON store handle, cheap to clone.
#[derive(Clone)]
pub struct JsonStore {
    data: Arc<RwLock<StoreData>>,
    /// None in memory-only mode (tests); Some(dir) persists to disk.
    data_dir: Option<PathBuf>,
}

fn account_key(user_id: &str, provider: Provider) -> String {
    format!("{}:{}", user_id, provider.as_str())
}

impl JsonStore {
    /// Open (or create) the store under `data_dir`.
    pub async fn open(data_dir: PathBuf) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create data dir: {}", e)))?;

        let path = data_dir.join(STORE_FILE);
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::Storage(format!("Corrupt store file: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(AppError::Storage(format!("Failed to read store: {}", e))),
        };

        tracing::info!(path = %path.display(), "Store loaded");

        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            data_dir: Some(data_dir),
        })
    }

    /// Create a memory-only store for testing.
    pub fn new_in_memory() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData::default())),
            data_dir: None,
        }
    }

    /// Persist the current state to disk (no-op in memory-only mode).
    async fn persist(&self, data: &StoreData) -> Result<(), AppError> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| AppError::Storage(format!("Serialize failed: {}", e)))?;

        let path = dir.join(STORE_FILE);
        let tmp = dir.join(format!("{}.tmp", STORE_FILE));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Write failed: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Rename failed: {}", e)))?;
        Ok(())
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Get the linked account for a (user, provider) pair.
    pub async fn get_account(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<LinkedAccount>, AppError> {
        let data = self.data.read().await;
        Ok(data.accounts.get(&account_key(user_id, provider)).cloned())
    }

    /// Create or replace a linked account.
    pub async fn set_account(&self, account: &LinkedAccount) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.accounts.insert(
            account_key(&account.user_id, account.provider),
            account.clone(),
        );
        self.persist(&data).await
    }

    /// Delete a linked account and its refresh token (explicit disconnect or
    /// definitive refresh rejection).
    pub async fn delete_account(&self, user_id: &str, provider: Provider) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        let key = account_key(user_id, provider);
        data.accounts.remove(&key);
        data.refresh_tokens.remove(&key);
        self.persist(&data).await
    }

    /// All linked accounts for a provider, ordered by user id for
    /// deterministic aggregation iteration.
    pub async fn list_accounts(&self, provider: Provider) -> Result<Vec<LinkedAccount>, AppError> {
        let data = self.data.read().await;
        let mut accounts: Vec<LinkedAccount> = data
            .accounts
            .values()
            .filter(|a| a.provider == provider)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(accounts)
    }

    // ─── Refresh Token Operations ────────────────────────────────

    pub async fn get_refresh_token(
        &self,
        user_id: &str,
        provider: Provider,
    ) -> Result<Option<String>, AppError> {
        let data = self.data.read().await;
        Ok(data
            .refresh_tokens
            .get(&account_key(user_id, provider))
            .cloned())
    }

    pub async fn set_refresh_token(
        &self,
        user_id: &str,
        provider: Provider,
        refresh_token: &str,
    ) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.refresh_tokens
            .insert(account_key(user_id, provider), refresh_token.to_string());
        self.persist(&data).await
    }

    // ─── Selection Operations ────────────────────────────────────

    pub async fn get_calendar_selection(&self, user_id: &str) -> Result<CalendarSelection, AppError> {
        let data = self.data.read().await;
        Ok(data
            .calendar_selections
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| CalendarSelection {
                user_id: user_id.to_string(),
                calendar_ids: vec![],
            }))
    }

    pub async fn set_calendar_selection(
        &self,
        selection: &CalendarSelection,
    ) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.calendar_selections
            .insert(selection.user_id.clone(), selection.clone());
        self.persist(&data).await
    }

    pub async fn get_task_list_selection(
        &self,
        user_id: &str,
    ) -> Result<TaskListSelection, AppError> {
        let data = self.data.read().await;
        Ok(data
            .task_list_selections
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| TaskListSelection {
                user_id: user_id.to_string(),
                list_ids: vec![],
            }))
    }

    pub async fn set_task_list_selection(
        &self,
        selection: &TaskListSelection,
    ) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.task_list_selections
            .insert(selection.user_id.clone(), selection.clone());
        self.persist(&data).await
    }

    // ─── Local Task Operations ───────────────────────────────────

    pub async fn get_local_task(&self, task_id: &str) -> Result<Option<LocalTask>, AppError> {
        let data = self.data.read().await;
        Ok(data.local_tasks.get(task_id).cloned())
    }

    /// Tasks assigned to a user, sorted by creation time then id.
    pub async fn list_local_tasks_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<LocalTask>, AppError> {
        let data = self.data.read().await;
        let mut tasks: Vec<LocalTask> = data
            .local_tasks
            .values()
            .filter(|t| t.assigned_to.iter().any(|u| u == user_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    pub async fn upsert_local_task(&self, task: &LocalTask) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.local_tasks.insert(task.id.clone(), task.clone());
        self.persist(&data).await
    }

    /// Persist a task together with the stats its completion change touched,
    /// as one write.
    ///
    /// The staged copy is only swapped in after a successful persist, so a
    /// failed write leaves neither the task nor any assignee's stats
    /// half-applied.
    pub async fn set_task_with_stats(
        &self,
        task: &LocalTask,
        stats: &[UserStats],
    ) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        staged.local_tasks.insert(task.id.clone(), task.clone());
        for entry in stats {
            staged.stats.insert(entry.user_id.clone(), entry.clone());
        }
        self.persist(&staged).await?;
        *data = staged;
        Ok(())
    }

    /// Delete a task permanently (no soft-delete).
    pub async fn delete_local_task(&self, task_id: &str) -> Result<bool, AppError> {
        let mut data = self.data.write().await;
        let removed = data.local_tasks.remove(task_id).is_some();
        self.persist(&data).await?;
        Ok(removed)
    }

    // ─── Stats Operations ────────────────────────────────────────

    /// Get a user's stats, defaulting to zeroed stats for new users.
    pub async fn get_stats(&self, user_id: &str) -> Result<UserStats, AppError> {
        let data = self.data.read().await;
        Ok(data
            .stats
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserStats::new(user_id)))
    }

    pub async fn set_stats(&self, stats: &UserStats) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.stats.insert(stats.user_id.clone(), stats.clone());
        self.persist(&data).await
    }

    // ─── Sync Blob Operations ────────────────────────────────────

    /// Get the opaque cross-device sync blob (empty object if never set).
    pub async fn get_sync_blob(&self) -> Result<serde_json::Value, AppError> {
        let data = self.data.read().await;
        Ok(data
            .sync_blob
            .clone()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    /// Replace the sync blob (last-write-wins, no conflict resolution).
    pub async fn set_sync_blob(&self, blob: serde_json::Value) -> Result<(), AppError> {
        let mut data = self.data.write().await;
        data.sync_blob = Some(blob);
        self.persist(&data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(user: &str, provider: Provider) -> LinkedAccount {
        LinkedAccount {
            user_id: user.to_string(),
            provider,
            access_token: "tok".to_string(),
            expires_at: Utc::now(),
            refreshable: true,
            display_name: user.to_string(),
            color: None,
        }
    }

    #[tokio::test]
    async fn test_one_account_per_user_provider_pair() {
        let store = JsonStore::new_in_memory();

        let mut first = account("alice", Provider::Calendar);
        first.access_token = "old".to_string();
        store.set_account(&first).await.unwrap();

        let mut second = account("alice", Provider::Calendar);
        second.access_token = "new".to_string();
        store.set_account(&second).await.unwrap();

        let accounts = store.list_accounts(Provider::Calendar).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].access_token, "new");

        // A different provider for the same user is a separate record
        store
            .set_account(&account("alice", Provider::Tasks))
            .await
            .unwrap();
        assert_eq!(store.list_accounts(Provider::Tasks).await.unwrap().len(), 1);
        assert_eq!(
            store.list_accounts(Provider::Calendar).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_account_removes_refresh_token() {
        let store = JsonStore::new_in_memory();
        store
            .set_account(&account("alice", Provider::Calendar))
            .await
            .unwrap();
        store
            .set_refresh_token("alice", Provider::Calendar, "refresh")
            .await
            .unwrap();

        store.delete_account("alice", Provider::Calendar).await.unwrap();

        assert!(store
            .get_account("alice", Provider::Calendar)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_refresh_token("alice", Provider::Calendar)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sync_blob_last_write_wins() {
        let store = JsonStore::new_in_memory();
        assert_eq!(store.get_sync_blob().await.unwrap(), serde_json::json!({}));

        store
            .set_sync_blob(serde_json::json!({"v": 1}))
            .await
            .unwrap();
        store
            .set_sync_blob(serde_json::json!({"v": 2}))
            .await
            .unwrap();

        assert_eq!(
            store.get_sync_blob().await.unwrap(),
            serde_json::json!({"v": 2})
        );
    }
}
