// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Local gamification ledger.
//!
//! Completing a local task grants XP/Gold to its assignees; reopening it
//! revokes exactly what was granted. The grants applied at completion time
//! are recorded on the task, so a reward-configuration change between
//! completion and reopening cannot change the revoked amounts.

use crate::error::AppError;
use crate::models::LocalTask;
use crate::store::JsonStore;
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;

/// Result of one completion-state change.
#[derive(Debug, serde::Serialize)]
pub struct ToggleOutcome {
    pub completed: bool,
    /// Total XP applied across assignees (negative on revoke, zero on no-op).
    pub xp_awarded: i64,
    /// Total Gold applied across assignees.
    pub gold_awarded: i64,
    /// Whether any assignee's level increased.
    pub leveled_up: bool,
}

#[derive(Clone)]
pub struct LedgerService {
    store: JsonStore,
}

impl LedgerService {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Flip a task's completion state.
    ///
    /// This is a flip, not a set: two calls flip the state twice.
    pub async fn toggle(&self, task_id: &str) -> Result<ToggleOutcome, AppError> {
        let task = self
            .store
            .get_local_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Local task {}", task_id)))?;
        let target = !task.completed;
        self.transition(task, target).await
    }

    /// Drive a task to a target completion state.
    ///
    /// Idempotent: if the task is already in the target state, no stat delta
    /// is applied (the delta fires once per actual transition, never twice).
    pub async fn set_completed(
        &self,
        task_id: &str,
        completed: bool,
    ) -> Result<ToggleOutcome, AppError> {
        let task = self
            .store
            .get_local_task(task_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Local task {}", task_id)))?;
        self.transition(task, completed).await
    }

    async fn transition(
        &self,
        mut task: LocalTask,
        target: bool,
    ) -> Result<ToggleOutcome, AppError> {
        if task.completed == target {
            return Ok(ToggleOutcome {
                completed: target,
                xp_awarded: 0,
                gold_awarded: 0,
                leveled_up: false,
            });
        }

        let now = format_utc_rfc3339(Utc::now());

        let (grants, sign) = if target {
            (task.compute_grants(), 1)
        } else {
            // Revoke the amounts recorded at completion time, not whatever
            // the current reward configuration says.
            (task.granted.clone(), -1)
        };

        let mut xp_total = 0i64;
        let mut gold_total = 0i64;
        let mut leveled_up = false;

        // Stage every stat change in memory first, then commit all of them
        // together with the task in one store write. A failed persist must
        // not leave some assignees granted while the task stays incomplete.
        let mut updated: Vec<crate::models::UserStats> = Vec::new();
        for grant in &grants {
            if !updated.iter().any(|s| s.user_id == grant.user_id) {
                updated.push(self.store.get_stats(&grant.user_id).await?);
            }
            if let Some(stats) = updated.iter_mut().find(|s| s.user_id == grant.user_id) {
                let xp_delta = sign * grant.xp;
                let gold_delta = sign * grant.gold;
                if stats.apply(xp_delta, gold_delta, &now) {
                    leveled_up = true;
                }
                xp_total += xp_delta;
                gold_total += gold_delta;
            }
        }

        task.completed = target;
        task.granted = if target { grants } else { Vec::new() };
        self.store.set_task_with_stats(&task, &updated).await?;

        tracing::info!(
            task_id = %task.id,
            completed = target,
            xp = xp_total,
            gold = gold_total,
            leveled_up,
            "Local task completion changed"
        );

        Ok(ToggleOutcome {
            completed: target,
            xp_awarded: xp_total,
            gold_awarded: gold_total,
            leveled_up,
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Recurrence, RewardStrategy};

    fn task(id: &str, assignees: Vec<&str>, xp: u32, gold: u32, strategy: RewardStrategy) -> LocalTask {
        LocalTask {
            id: id.to_string(),
            title: "Chore".to_string(),
            assigned_to: assignees.into_iter().map(String::from).collect(),
            completed: false,
            xp_reward: xp,
            gold_reward: gold,
            reward_strategy: strategy,
            recurrence: Recurrence::None,
            granted: vec![],
            created_at: String::new(),
        }
    }

    async fn ledger_with(tasks: Vec<LocalTask>) -> (LedgerService, JsonStore) {
        let store = JsonStore::new_in_memory();
        for t in &tasks {
            store.upsert_local_task(t).await.unwrap();
        }
        (LedgerService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_reward_symmetry_nets_to_zero() {
        let (ledger, store) =
            ledger_with(vec![task("t1", vec!["alice"], 10, 5, RewardStrategy::Full)]).await;

        let done = ledger.toggle("t1").await.unwrap();
        assert!(done.completed);
        assert_eq!(done.xp_awarded, 10);
        assert_eq!(done.gold_awarded, 5);

        let undone = ledger.toggle("t1").await.unwrap();
        assert!(!undone.completed);
        assert_eq!(undone.xp_awarded, -10);
        assert_eq!(undone.gold_awarded, -5);

        let stats = store.get_stats("alice").await.unwrap();
        assert_eq!(stats.xp, 0);
        assert_eq!(stats.gold, 0);
    }

    #[tokio::test]
    async fn test_split_reward_divides_between_assignees() {
        let (ledger, store) = ledger_with(vec![task(
            "t1",
            vec!["alice", "bob"],
            10,
            0,
            RewardStrategy::Split,
        )])
        .await;

        ledger.toggle("t1").await.unwrap();

        assert_eq!(store.get_stats("alice").await.unwrap().xp, 5);
        assert_eq!(store.get_stats("bob").await.unwrap().xp, 5);
    }

    #[tokio::test]
    async fn test_full_reward_grants_every_assignee() {
        let (ledger, store) = ledger_with(vec![task(
            "t1",
            vec!["alice", "bob"],
            10,
            5,
            RewardStrategy::Full,
        )])
        .await;

        let outcome = ledger.toggle("t1").await.unwrap();
        assert_eq!(outcome.xp_awarded, 20); // 10 per assignee

        assert_eq!(store.get_stats("alice").await.unwrap().xp, 10);
        assert_eq!(store.get_stats("bob").await.unwrap().xp, 10);
    }

    #[tokio::test]
    async fn test_revoke_uses_original_grant_after_config_change() {
        let (ledger, store) =
            ledger_with(vec![task("t1", vec!["alice"], 10, 5, RewardStrategy::Full)]).await;

        ledger.toggle("t1").await.unwrap();

        // Reward config changes while the task is complete
        let mut changed = store.get_local_task("t1").await.unwrap().unwrap();
        changed.xp_reward = 100;
        changed.gold_reward = 50;
        store.upsert_local_task(&changed).await.unwrap();

        // Reopening revokes the originally granted 10/5, not 100/50
        let undone = ledger.toggle("t1").await.unwrap();
        assert_eq!(undone.xp_awarded, -10);
        assert_eq!(undone.gold_awarded, -5);

        let stats = store.get_stats("alice").await.unwrap();
        assert_eq!(stats.xp, 0);
        assert_eq!(stats.gold, 0);
    }

    #[tokio::test]
    async fn test_set_completed_is_idempotent() {
        let (ledger, store) =
            ledger_with(vec![task("t1", vec!["alice"], 10, 0, RewardStrategy::Full)]).await;

        let first = ledger.set_completed("t1", true).await.unwrap();
        assert_eq!(first.xp_awarded, 10);

        // Completing an already-complete task applies no delta
        let second = ledger.set_completed("t1", true).await.unwrap();
        assert_eq!(second.xp_awarded, 0);
        assert!(!second.leveled_up);

        assert_eq!(store.get_stats("alice").await.unwrap().xp, 10);
    }

    #[tokio::test]
    async fn test_uncomplete_of_never_completed_task_is_noop() {
        let (ledger, store) =
            ledger_with(vec![task("t1", vec!["alice"], 10, 0, RewardStrategy::Full)]).await;

        let outcome = ledger.set_completed("t1", false).await.unwrap();
        assert_eq!(outcome.xp_awarded, 0);
        assert_eq!(store.get_stats("alice").await.unwrap().xp, 0);
    }

    #[tokio::test]
    async fn test_level_up_surfaced() {
        let (ledger, _store) =
            ledger_with(vec![task("t1", vec!["alice"], 150, 0, RewardStrategy::Full)]).await;

        let outcome = ledger.toggle("t1").await.unwrap();
        assert!(outcome.leveled_up);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let (ledger, _store) = ledger_with(vec![]).await;
        let err = ledger.toggle("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
