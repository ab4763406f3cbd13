// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Optimistic mutations against provider items.
//!
//! Every create/update/delete applies its change to the local item cache
//! first, then issues the network call. On success the caller triggers an
//! aggregation refresh so authoritative state supersedes the optimistic
//! guess; on failure the cache is restored to its exact pre-mutation
//! snapshot and the error is re-raised (`AuthExpired` stays distinct so the
//! UI can prompt reconnection instead of a generic failure).
//!
//! The snapshot is taken synchronously before any await, so a concurrent
//! aggregation refresh landing mid-mutation cannot be clobbered by an
//! inconsistent rollback.

use crate::error::AppError;
use crate::models::AggregatedItem;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// One optimistic change to the item cache.
#[derive(Debug, Clone)]
pub enum ItemCommand {
    /// Insert a new item or replace the item with the same id.
    Upsert(AggregatedItem),
    /// Remove the item with this id.
    Remove { id: String },
}

/// In-memory authoritative copy of the last committed aggregation.
///
/// Uses a synchronous RwLock so snapshots and optimistic applies happen
/// without yielding; critical sections are short and never await.
pub struct ItemCache {
    items: RwLock<Vec<AggregatedItem>>,
    generation: AtomicU64,
}

impl Default for ItemCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemCache {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Synchronous snapshot of the current items.
    pub fn snapshot(&self) -> Vec<AggregatedItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Restore a previously taken snapshot exactly.
    pub fn restore(&self, snapshot: Vec<AggregatedItem>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn find(&self, id: &str) -> Option<AggregatedItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    /// Apply one optimistic command.
    pub fn apply(&self, command: &ItemCommand) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        match command {
            ItemCommand::Upsert(item) => {
                if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
                    *existing = item.clone();
                } else {
                    items.push(item.clone());
                }
            }
            ItemCommand::Remove { id } => {
                items.retain(|i| &i.id != id);
            }
        }
    }

    /// Replace the cache with a fresh aggregation result.
    ///
    /// Returns `false` and discards the input when `generation` is not newer
    /// than the last committed one (a superseded request finishing late).
    pub fn commit(&self, items: Vec<AggregatedItem>, generation: u64) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        if generation <= current {
            tracing::debug!(generation, current, "Discarding stale aggregation result");
            return false;
        }
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
        self.generation.store(generation, Ordering::SeqCst);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Result of a successful mutation.
#[derive(Debug)]
pub struct MutationOutcome {
    /// The caller should re-run aggregation so authoritative state replaces
    /// the optimistic guess.
    pub refresh_needed: bool,
}

/// Command runner pairing an optimistic cache change with its network call.
#[derive(Clone)]
pub struct Mutator {
    cache: std::sync::Arc<ItemCache>,
}

impl Mutator {
    pub fn new(cache: std::sync::Arc<ItemCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    /// Run one mutation: snapshot, optimistic apply, network call, and exact
    /// rollback on failure.
    pub async fn run<F, Fut>(
        &self,
        command: ItemCommand,
        call: F,
    ) -> Result<MutationOutcome, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        // Snapshot before any await
        let snapshot = self.cache.snapshot();
        self.cache.apply(&command);

        match call().await {
            Ok(()) => Ok(MutationOutcome {
                refresh_needed: true,
            }),
            Err(e) => {
                self.cache.restore(snapshot);
                tracing::warn!(error = %e, "Mutation failed, local state rolled back");
                Err(e)
            }
        }
    }
}
