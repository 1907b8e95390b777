//! Expiry engine: a min-heap of `(id, expiry)` plus the background reaper.
//!
//! The heap is a derived view of the object store and never a source of
//! content. Callers that delete an object passively should also
//! [`ExpiryEngine::forget`] it so the reaper does not delete it twice.
//! Nothing here is persisted; see [`ExpiryEngine::reconcile`] for rebuilding
//! the heap from a durable backend at startup.

use crate::{
    errors::StoreResult,
    models::{archive::Archive, expiry_tag::ExpiryTag},
    services::object_store::ObjectStore,
};
use chrono::{DateTime, Utc};
use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct ExpiryEngine {
    heap: Mutex<BinaryHeap<Reverse<ExpiryTag>>>,
}

/// Outcome of a startup reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tracked: usize,
    pub removed: usize,
    /// Ids that could not be read or removed; they stay untracked.
    pub failed: usize,
}

impl ExpiryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn heap(&self) -> std::sync::MutexGuard<'_, BinaryHeap<Reverse<ExpiryTag>>> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, tag: ExpiryTag) {
        self.heap().push(Reverse(tag));
    }

    pub fn track(&self, id: impl Into<String>, expiry: DateTime<Utc>) {
        self.push(ExpiryTag::new(id, expiry));
    }

    /// The tag that expires soonest.
    pub fn peek(&self) -> Option<ExpiryTag> {
        self.heap().peek().map(|Reverse(tag)| tag.clone())
    }

    /// Remove and return the tag that expires soonest.
    pub fn pop(&self) -> Option<ExpiryTag> {
        self.heap().pop().map(|Reverse(tag)| tag)
    }

    pub fn len(&self) -> usize {
        self.heap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap().is_empty()
    }

    /// Drop every tag for `id`. Returns whether one was present.
    pub fn forget(&self, id: &str) -> bool {
        let mut heap = self.heap();
        let before = heap.len();
        heap.retain(|Reverse(tag)| tag.id != id);
        heap.len() != before
    }

    /// Pop tags from the root while they are expired at `now`.
    pub fn pop_expired(&self, now: DateTime<Utc>) -> Vec<ExpiryTag> {
        let mut heap = self.heap();
        let mut expired = Vec::new();
        while heap
            .peek()
            .is_some_and(|Reverse(tag)| tag.has_expired_at(now))
        {
            if let Some(Reverse(tag)) = heap.pop() {
                expired.push(tag);
            }
        }
        expired
    }

    /// Delete every object whose tag has expired. Returns how many tags
    /// were reaped; failed deletions are logged and not retried.
    pub async fn reap(&self, store: &ObjectStore) -> usize {
        let expired = self.pop_expired(Utc::now());
        for tag in &expired {
            debug!(id = %tag.id, expiry = %tag.expiry, "found expired archive, deleting");
            match store.delete(&tag.id).await {
                Ok(()) => debug!(id = %tag.id, "deleted expired archive"),
                Err(err) => warn!(id = %tag.id, error = %err, "delete expired archive"),
            }
        }
        expired.len()
    }

    /// Reap on every tick until `token` is cancelled.
    ///
    /// Pending tags are forfeited on shutdown.
    pub async fn run(
        self: Arc<Self>,
        store: Arc<ObjectStore>,
        tick: Duration,
        token: CancellationToken,
    ) {
        info!(interval_ms = tick.as_millis() as u64, "actively checking expired archives");
        let mut ticker = time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(pending = self.len(), "expiry reaper stopping");
                    return;
                }
                _ = ticker.tick() => {
                    let reaped = self.reap(&store).await;
                    if reaped > 0 {
                        info!(reaped, "reaped expired archives");
                    }
                }
            }
        }
    }

    /// Rebuild expiry knowledge from what the backend already holds.
    ///
    /// Expired or undecodable archives are deleted immediately, everything
    /// else is pushed onto the heap. Only a failure to list the backend is
    /// returned; per-object failures are logged, counted and skipped.
    pub async fn reconcile(&self, store: &ObjectStore) -> StoreResult<ReconcileReport> {
        let now = Utc::now();
        let mut report = ReconcileReport::default();
        for id in store.ids().await? {
            let bin = match store.get(&id).await {
                Ok(bin) => bin,
                Err(err) if err.is_not_found() => continue,
                Err(err) => {
                    warn!(id = %id, error = %err, "unable to read stored archive");
                    report.failed += 1;
                    continue;
                }
            };
            match Archive::from_bytes(&bin) {
                Ok(archive) if !archive.has_expired_at(now) => {
                    self.track(id, archive.expiry());
                    report.tracked += 1;
                    continue;
                }
                Ok(_) => debug!(id = %id, "removing expired archive"),
                Err(err) => warn!(id = %id, error = %err, "removing undecodable archive"),
            }
            match store.delete(&id).await {
                Ok(()) => report.removed += 1,
                Err(err) => {
                    warn!(id = %id, error = %err, "unable to remove stale archive");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
