// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Multi-account aggregation of calendar events and tasks.
//!
//! Fans out one fetch per (account, selected calendar/list) pair
//! concurrently, merges results into a single deduplicated collection, and
//! records per-account failures without aborting sibling fetches.
//!
//! Determinism: merging walks the (account, selection) pairs in their fixed
//! input order, never completion order, so the first-seen-wins dedup
//! tie-break is stable across runs. Each pass carries a monotonically
//! increasing generation so callers can discard superseded results.

use crate::error::AppError;
use crate::models::{AggregatedItem, ItemKind, LinkedAccount};
use crate::services::auth::AuthService;
use crate::services::google::{CalendarApi, TasksApi};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Date range for event queries.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One failed (account, selection) fetch, reported as data rather than an
/// error so siblings still contribute.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PartialError {
    pub account_id: String,
    pub error: String,
}

/// Result of one aggregation pass.
#[derive(Debug, serde::Serialize)]
pub struct AggregateOutcome {
    pub items: Vec<AggregatedItem>,
    pub partial_errors: Vec<PartialError>,
    /// Staleness token; higher supersedes lower.
    pub generation: u64,
}

/// Port for per-(account, selection) fetches, injectable for tests.
#[async_trait]
pub trait ProviderFetch: Send + Sync {
    async fn fetch_events(
        &self,
        account: &LinkedAccount,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<AggregatedItem>, AppError>;

    async fn fetch_tasks(
        &self,
        account: &LinkedAccount,
        list_id: &str,
    ) -> Result<Vec<AggregatedItem>, AppError>;
}

/// Multi-source aggregator.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn ProviderFetch>,
    generation: Arc<AtomicU64>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn ProviderFetch>) -> Self {
        Self {
            fetcher,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Aggregate events across accounts for the given range.
    ///
    /// `selections` maps account user id to selected calendar ids. Accounts
    /// with zero selections are skipped entirely (connected but nothing
    /// chosen to sync is not an error).
    pub async fn fetch_all_events(
        &self,
        accounts: &[LinkedAccount],
        selections: &HashMap<String, Vec<String>>,
        range: DateRange,
    ) -> AggregateOutcome {
        let generation = self.begin();
        let pairs: Vec<(&LinkedAccount, &str)> = accounts
            .iter()
            .flat_map(|account| {
                selections
                    .get(&account.user_id)
                    .map(|ids| ids.iter().map(move |id| (account, id.as_str())))
                    .into_iter()
                    .flatten()
            })
            .collect();

        let fetches = pairs
            .iter()
            .map(|(account, calendar_id)| self.fetcher.fetch_events(account, calendar_id, range));
        let results = futures_util::future::join_all(fetches).await;

        self.merge(generation, &pairs, results)
    }

    /// Aggregate tasks across accounts; `selections` maps user id to
    /// selected task-list ids.
    pub async fn fetch_all_tasks(
        &self,
        accounts: &[LinkedAccount],
        selections: &HashMap<String, Vec<String>>,
    ) -> AggregateOutcome {
        let generation = self.begin();
        let pairs: Vec<(&LinkedAccount, &str)> = accounts
            .iter()
            .flat_map(|account| {
                selections
                    .get(&account.user_id)
                    .map(|ids| ids.iter().map(move |id| (account, id.as_str())))
                    .into_iter()
                    .flatten()
            })
            .collect();

        let fetches = pairs
            .iter()
            .map(|(account, list_id)| self.fetcher.fetch_tasks(account, list_id));
        let results = futures_util::future::join_all(fetches).await;

        self.merge(generation, &pairs, results)
    }

    /// Allocate the staleness generation for a pass.
    ///
    /// Taken before any fetch, so generations follow request start order and
    /// a superseded pass that finishes late carries the lower number.
    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Merge per-pair results in input order with first-seen-wins dedup.
    fn merge(
        &self,
        generation: u64,
        pairs: &[(&LinkedAccount, &str)],
        results: Vec<Result<Vec<AggregatedItem>, AppError>>,
    ) -> AggregateOutcome {
        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut partial_errors = Vec::new();

        // join_all preserves input order, so walking results sequentially
        // keeps the documented iteration-order tie-break.
        for ((account, selection_id), result) in pairs.iter().zip(results) {
            match result {
                Ok(fetched) => {
                    for item in fetched {
                        if seen.insert(item.id.clone()) {
                            items.push(item);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        account = %account.user_id,
                        selection = %selection_id,
                        error = %e,
                        "Aggregation fetch failed for one source"
                    );
                    partial_errors.push(PartialError {
                        account_id: account.user_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        AggregateOutcome {
            items,
            partial_errors,
            generation,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GoogleFetch - production ProviderFetch over the typed API clients
// ─────────────────────────────────────────────────────────────────────────────

/// Production fetcher: resolves a token per account, calls the Google APIs,
/// and retries exactly once with a force-refreshed token on `AuthExpired`.
#[derive(Clone)]
pub struct GoogleFetch {
    auth: AuthService,
    calendar: CalendarApi,
    tasks: TasksApi,
}

impl GoogleFetch {
    pub fn new(auth: AuthService, calendar: CalendarApi, tasks: TasksApi) -> Self {
        Self {
            auth,
            calendar,
            tasks,
        }
    }
}

#[async_trait]
impl ProviderFetch for GoogleFetch {
    async fn fetch_events(
        &self,
        account: &LinkedAccount,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<AggregatedItem>, AppError> {
        let token = self.auth.fresh_token(&account.user_id, account.provider).await?;

        let events = match self
            .calendar
            .list_events(&token, calendar_id, range.start, range.end)
            .await
        {
            Err(AppError::AuthExpired) => {
                // Token rejected despite a future expiry: refresh once, retry once.
                let token = self
                    .auth
                    .refreshed_token(&account.user_id, account.provider, &token)
                    .await?;
                self.calendar
                    .list_events(&token, calendar_id, range.start, range.end)
                    .await?
            }
            other => other?,
        };

        Ok(events
            .into_iter()
            .map(|dto| AggregatedItem {
                id: dto.id,
                kind: ItemKind::Event,
                source_account_id: account.user_id.clone(),
                source_calendar_id: calendar_id.to_string(),
                title: dto.summary.unwrap_or_default(),
                start: dto.start.as_ref().and_then(|t| t.resolve()),
                end: dto.end.as_ref().and_then(|t| t.resolve()),
                completed: false,
                account_name: account.display_name.clone(),
                account_color: account.color.clone(),
            })
            .collect())
    }

    async fn fetch_tasks(
        &self,
        account: &LinkedAccount,
        list_id: &str,
    ) -> Result<Vec<AggregatedItem>, AppError> {
        let token = self.auth.fresh_token(&account.user_id, account.provider).await?;

        let tasks = match self.tasks.list_tasks(&token, list_id).await {
            Err(AppError::AuthExpired) => {
                let token = self
                    .auth
                    .refreshed_token(&account.user_id, account.provider, &token)
                    .await?;
                self.tasks.list_tasks(&token, list_id).await?
            }
            other => other?,
        };

        Ok(tasks
            .into_iter()
            .map(|dto| AggregatedItem {
                id: dto.id.clone(),
                kind: ItemKind::Task,
                source_account_id: account.user_id.clone(),
                source_calendar_id: list_id.to_string(),
                title: dto.title.clone().unwrap_or_default(),
                start: dto.due,
                end: None,
                completed: dto.is_completed(),
                account_name: account.display_name.clone(),
                account_color: account.color.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use chrono::Duration;

    fn account(user: &str) -> LinkedAccount {
        LinkedAccount {
            user_id: user.to_string(),
            provider: Provider::Calendar,
            access_token: "tok".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            refreshable: true,
            display_name: user.to_string(),
            color: None,
        }
    }

    fn event(id: &str, account: &LinkedAccount, calendar_id: &str) -> AggregatedItem {
        AggregatedItem {
            id: id.to_string(),
            kind: ItemKind::Event,
            source_account_id: account.user_id.clone(),
            source_calendar_id: calendar_id.to_string(),
            title: format!("Event {}", id),
            start: None,
            end: None,
            completed: false,
            account_name: account.display_name.clone(),
            account_color: None,
        }
    }

    fn range() -> DateRange {
        DateRange {
            start: "2024-06-01T00:00:00Z".parse().unwrap(),
            end: "2024-06-30T23:59:59Z".parse().unwrap(),
        }
    }

    /// Canned fetcher keyed by (account user id, calendar id).
    struct FakeFetch {
        responses: HashMap<(String, String), Result<Vec<AggregatedItem>, String>>,
        delays_ms: HashMap<(String, String), u64>,
    }

    impl FakeFetch {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                delays_ms: HashMap::new(),
            }
        }

        fn events(mut self, user: &str, calendar: &str, items: Vec<AggregatedItem>) -> Self {
            self.responses
                .insert((user.to_string(), calendar.to_string()), Ok(items));
            self
        }

        fn slow_events(
            mut self,
            user: &str,
            calendar: &str,
            items: Vec<AggregatedItem>,
            delay_ms: u64,
        ) -> Self {
            self.delays_ms
                .insert((user.to_string(), calendar.to_string()), delay_ms);
            self.events(user, calendar, items)
        }

        fn failing(mut self, user: &str, calendar: &str, error: &str) -> Self {
            self.responses.insert(
                (user.to_string(), calendar.to_string()),
                Err(error.to_string()),
            );
            self
        }
    }

    #[async_trait]
    impl ProviderFetch for FakeFetch {
        async fn fetch_events(
            &self,
            account: &LinkedAccount,
            calendar_id: &str,
            _range: DateRange,
        ) -> Result<Vec<AggregatedItem>, AppError> {
            let key = (account.user_id.clone(), calendar_id.to_string());
            if let Some(ms) = self.delays_ms.get(&key) {
                tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            }
            match self.responses.get(&key) {
                Some(Ok(items)) => Ok(items.clone()),
                Some(Err(e)) => Err(AppError::Transient(e.clone())),
                None => Ok(vec![]),
            }
        }

        async fn fetch_tasks(
            &self,
            account: &LinkedAccount,
            list_id: &str,
        ) -> Result<Vec<AggregatedItem>, AppError> {
            self.fetch_events(account, list_id, range()).await
        }
    }

    fn selections(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(user, ids)| {
                (
                    user.to_string(),
                    ids.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_dedup_across_calendars_of_same_account() {
        let a = account("alice");
        // The same provider event id visible from two selected calendars
        let fetcher = FakeFetch::new()
            .events("alice", "primary", vec![event("e1", &a, "primary")])
            .events("alice", "family", vec![event("e1", &a, "family")]);

        let aggregator = Aggregator::new(Arc::new(fetcher));
        let outcome = aggregator
            .fetch_all_events(
                &[a],
                &selections(&[("alice", &["primary", "family"])]),
                range(),
            )
            .await;

        assert_eq!(outcome.items.len(), 1);
        // First-seen-wins: the "primary" copy was merged first
        assert_eq!(outcome.items[0].source_calendar_id, "primary");
        assert!(outcome.partial_errors.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_isolation() {
        let a = account("alice");
        let b = account("bob");
        let c = account("carol");
        let fetcher = FakeFetch::new()
            .events("alice", "primary", vec![event("a1", &a, "primary")])
            .failing("bob", "primary", "boom")
            .events("carol", "primary", vec![event("c1", &c, "primary")]);

        let aggregator = Aggregator::new(Arc::new(fetcher));
        let outcome = aggregator
            .fetch_all_events(
                &[a, b, c],
                &selections(&[
                    ("alice", &["primary"]),
                    ("bob", &["primary"]),
                    ("carol", &["primary"]),
                ]),
                range(),
            )
            .await;

        let ids: Vec<&str> = outcome.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "c1"]);
        assert_eq!(outcome.partial_errors.len(), 1);
        assert_eq!(outcome.partial_errors[0].account_id, "bob");
    }

    #[tokio::test]
    async fn test_account_with_no_selections_is_skipped() {
        let a = account("alice");
        let b = account("bob");
        let fetcher = FakeFetch::new()
            .events("alice", "primary", vec![event("a1", &a, "primary")])
            // bob would fail if queried; he must not be
            .failing("bob", "primary", "must not be called");

        let aggregator = Aggregator::new(Arc::new(fetcher));
        let outcome = aggregator
            .fetch_all_events(
                &[a, b],
                &selections(&[("alice", &["primary"]), ("bob", &[])]),
                range(),
            )
            .await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].id, "a1");
        assert!(outcome.partial_errors.is_empty());
    }

    #[tokio::test]
    async fn test_first_seen_wins_follows_account_order() {
        let a = account("alice");
        let b = account("bob");
        // Both accounts see the same shared-calendar event id
        let fetcher = FakeFetch::new()
            .events("alice", "shared", vec![event("shared-1", &a, "shared")])
            .events("bob", "shared", vec![event("shared-1", &b, "shared")]);

        let aggregator = Aggregator::new(Arc::new(fetcher));
        let outcome = aggregator
            .fetch_all_events(
                &[a, b],
                &selections(&[("alice", &["shared"]), ("bob", &["shared"])]),
                range(),
            )
            .await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].source_account_id, "alice");
    }

    #[tokio::test]
    async fn test_generation_increases_per_pass() {
        let a = account("alice");
        let fetcher = FakeFetch::new().events("alice", "primary", vec![]);
        let aggregator = Aggregator::new(Arc::new(fetcher));
        let sel = selections(&[("alice", &["primary"])]);

        let first = aggregator.fetch_all_events(&[a.clone()], &sel, range()).await;
        let second = aggregator.fetch_all_events(&[a], &sel, range()).await;
        assert!(second.generation > first.generation);
    }

    #[tokio::test]
    async fn test_superseded_pass_cannot_clobber_newer_result() {
        use crate::services::mutation::ItemCache;

        let a = account("alice");
        let fetcher = FakeFetch::new()
            .slow_events("alice", "old-cal", vec![event("old-item", &a, "old-cal")], 200)
            .events("alice", "new-cal", vec![event("new-item", &a, "new-cal")]);
        let aggregator = Aggregator::new(Arc::new(fetcher));

        // The first pass starts earlier but its fetch is slow
        let first = {
            let aggregator = aggregator.clone();
            let account = a.clone();
            tokio::spawn(async move {
                aggregator
                    .fetch_all_events(
                        &[account],
                        &selections(&[("alice", &["old-cal"])]),
                        range(),
                    )
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // The second pass supersedes it and finishes first
        let second = aggregator
            .fetch_all_events(&[a], &selections(&[("alice", &["new-cal"])]), range())
            .await;
        let first = first.await.unwrap();

        // Generations follow start order, not completion order
        assert!(first.generation < second.generation);

        // So the late-finishing stale pass cannot overwrite the newer commit
        let cache = ItemCache::new();
        assert!(cache.commit(second.items.clone(), second.generation));
        assert!(!cache.commit(first.items, first.generation));
        assert!(cache.find("new-item").is_some());
        assert!(cache.find("old-item").is_none());
    }
}
