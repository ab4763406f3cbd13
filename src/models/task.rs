//! Local gamified tasks, independent of any external provider.

use serde::{Deserialize, Serialize};

/// How a task's reward is distributed among assignees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStrategy {
    /// Every assignee receives the full reward.
    Full,
    /// The reward is divided evenly among assignees.
    Split,
}

impl Default for RewardStrategy {
    fn default() -> Self {
        RewardStrategy::Full
    }
}

/// Task recurrence schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    /// Weekly on the given days (0 = Monday .. 6 = Sunday).
    Weekly {
        days: Vec<u8>,
    },
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::None
    }
}

/// Amounts actually granted to one assignee when a task was completed.
///
/// Recorded at completion time so that reopening revokes exactly what was
/// granted, even if the task's reward configuration changed in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub user_id: String,
    pub xp: i64,
    pub gold: i64,
}

/// A local gamified task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTask {
    pub id: String,
    pub title: String,
    /// Assignee user ids (non-empty)
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default)]
    pub gold_reward: u32,
    #[serde(default)]
    pub reward_strategy: RewardStrategy,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Grants applied on the last completion; empty while incomplete.
    #[serde(default)]
    pub granted: Vec<RewardGrant>,
    /// Creation timestamp (RFC3339)
    #[serde(default)]
    pub created_at: String,
}

impl LocalTask {
    /// Compute the per-assignee grants for completing this task.
    ///
    /// `Full` grants the whole amount to every assignee. `Split` divides
    /// evenly; leftover units go to earlier assignees so the division is
    /// deterministic and the totals are exact.
    pub fn compute_grants(&self) -> Vec<RewardGrant> {
        let n = self.assigned_to.len() as i64;
        if n == 0 {
            return Vec::new();
        }

        match self.reward_strategy {
            RewardStrategy::Full => self
                .assigned_to
                .iter()
                .map(|user_id| RewardGrant {
                    user_id: user_id.clone(),
                    xp: self.xp_reward as i64,
                    gold: self.gold_reward as i64,
                })
                .collect(),
            RewardStrategy::Split => {
                let xp = self.xp_reward as i64;
                let gold = self.gold_reward as i64;
                self.assigned_to
                    .iter()
                    .enumerate()
                    .map(|(i, user_id)| {
                        let i = i as i64;
                        RewardGrant {
                            user_id: user_id.clone(),
                            xp: xp / n + if i < xp % n { 1 } else { 0 },
                            gold: gold / n + if i < gold % n { 1 } else { 0 },
                        }
                    })
                    .collect()
            }
        }
    }
}
