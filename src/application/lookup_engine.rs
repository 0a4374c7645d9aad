//! Batch Lookup Engine - Main application use case
//!
//! Decides which identifiers of a batch need a fresh lookup, dispatches only
//! those, and commits the newly resolved ones to the checked-set store.
//! This is the only place that commits.

use crate::config::Config;
use crate::domain::entities::{
    BatchEntry, BatchOutcome, BatchReport, CheckedSet, EntryStatus, LookupResult,
};
use crate::domain::errors::BatchError;
use crate::domain::ports::{CheckedSetStore, Resolver};
use crate::domain::value_objects::{Identifier, Namespace};
use crate::infrastructure::shutdown::ShutdownController;
use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

type InFlightKey = (Namespace, String);
type InFlightCell = Arc<OnceCell<LookupResult>>;

/// Position of a raw input item relative to the deduplicated batch.
enum Slot {
    Malformed(String),
    First(usize),
    /// Index of the first occurrence, and this occurrence as given.
    Repeat(usize, String),
}

/// How a distinct identifier got its result.
#[derive(Clone)]
enum Dispatched {
    Own(LookupResult),
    Shared(LookupResult),
    /// Committed by a concurrent batch after this one loaded its checked-set.
    Committed,
}

impl Dispatched {
    fn result(&self) -> Option<&LookupResult> {
        match self {
            Self::Own(r) | Self::Shared(r) => Some(r),
            Self::Committed => None,
        }
    }
}

/// Dedup-aware batch lookup engine.
///
/// Safe to share between concurrent batches (a CLI job and the REST
/// front-end, for example). Guarantees:
/// 1. The resolver runs at most once per distinct identifier per batch
/// 2. Identifiers in the checked-set at batch start are never dispatched
/// 3. Concurrent batches needing the same identifier share one call, and a
///    batch never resolves what a concurrent batch already committed
/// 4. Only successful results are committed, so failures stay retryable
pub struct BatchLookupEngine {
    store: Arc<dyn CheckedSetStore>,
    cache_not_found: bool,
    concurrency: usize,
    commit_interval: usize,
    shutdown: ShutdownController,
    in_flight: DashMap<InFlightKey, InFlightCell>,
    /// Keys this engine has committed, consulted after the checked-set load.
    committed: DashSet<InFlightKey>,
}

impl BatchLookupEngine {
    /// Create an engine from the process configuration.
    pub fn new(store: Arc<dyn CheckedSetStore>, config: &Config) -> Self {
        Self {
            store,
            cache_not_found: config.cache_not_found,
            concurrency: config.lookup_concurrency.max(1),
            commit_interval: config.commit_interval,
            shutdown: ShutdownController::new(),
            in_flight: DashMap::new(),
            committed: DashSet::new(),
        }
    }

    /// Use an externally owned controller for cancellation.
    pub fn with_shutdown(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Load the current checked-set for a namespace.
    pub async fn checked_set(&self, namespace: Namespace) -> CheckedSet {
        self.store.load(namespace).await
    }

    /// Run one batch.
    ///
    /// Returns one entry per well-formed input item, in input order.
    /// Per-identifier failures are reported in the entries; only a failed
    /// commit (or a resolver of the wrong namespace) aborts the batch.
    /// After cancellation the batch still commits what it resolved and
    /// marks the remaining identifiers `NotAttempted`.
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        namespace: Namespace,
        resolver: &dyn Resolver,
    ) -> Result<BatchOutcome, BatchError> {
        if resolver.namespace() != namespace {
            return Err(BatchError::NamespaceMismatch {
                expected: namespace,
                actual: resolver.namespace(),
            });
        }

        let _batch = self.shutdown.batch_guard();
        let mut report = BatchReport::default();

        // 1. Parse and deduplicate, first occurrence wins
        let mut unique: Vec<Identifier> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(identifiers.len());

        for raw in identifiers {
            let raw = raw.as_ref();
            match Identifier::parse(namespace, raw) {
                Ok(id) => match positions.get(id.key()) {
                    Some(&idx) => {
                        report.duplicates += 1;
                        slots.push(Slot::Repeat(idx, id.as_str().to_string()));
                    }
                    None => {
                        let idx = unique.len();
                        positions.insert(id.key().to_string(), idx);
                        unique.push(id);
                        slots.push(Slot::First(idx));
                    }
                },
                Err(e) => {
                    tracing::warn!("skipping malformed {} identifier: {}", namespace, e);
                    report.malformed += 1;
                    slots.push(Slot::Malformed(raw.to_string()));
                }
            }
        }

        // 2. Load checked-set
        let checked = self.store.load(namespace).await;

        // 3. Partition
        let skipped: Vec<bool> = unique.iter().map(|id| checked.contains_key(id.key())).collect();
        let to_resolve: Vec<usize> = (0..unique.len()).filter(|&i| !skipped[i]).collect();
        report.skipped_cached = unique.len() - to_resolve.len();

        tracing::info!(
            "batch start namespace={} inputs={} distinct={} cached={} to_resolve={}",
            namespace,
            identifiers.len(),
            unique.len(),
            report.skipped_cached,
            to_resolve.len()
        );

        // 4. Dispatch, bounded fan-out, results consumed in input order
        let claims = InFlightClaims::new(&self.in_flight);
        let mut results: Vec<Option<Dispatched>> = vec![None; unique.len()];
        let mut newly_checked: HashSet<String> = HashSet::new();
        let mut pending: HashSet<String> = HashSet::new();

        let unique_ref = &unique;
        let claims_ref = &claims;
        let mut dispatches = stream::iter(to_resolve)
            .map(move |idx| async move {
                (idx, self.dispatch(&unique_ref[idx], resolver, claims_ref).await)
            })
            .buffered(self.concurrency);

        while let Some((idx, dispatched)) = dispatches.next().await {
            let id = &unique[idx];
            let Some(dispatched) = dispatched else {
                continue;
            };
            let Some(result) = dispatched.result() else {
                tracing::debug!("{} committed by a concurrent batch, skipped", id);
                report.skipped_cached += 1;
                results[idx] = Some(dispatched);
                continue;
            };

            match result {
                LookupResult::Success { .. } => {
                    report.resolved_success += 1;
                    if self.should_cache(result) {
                        newly_checked.insert(id.key().to_string());
                        pending.insert(id.key().to_string());
                    } else {
                        tracing::debug!("{} resolved to no vendor, left uncached", id);
                    }
                }
                LookupResult::Failure { reason } => {
                    report.resolved_failure += 1;
                    tracing::warn!("lookup failed for {}: {}", id, reason);
                }
            }
            results[idx] = Some(dispatched);

            if self.commit_interval > 0 && pending.len() >= self.commit_interval {
                self.commit(namespace, &pending).await?;
                pending.clear();
            }
        }
        drop(dispatches);

        // 5. Commit whatever has not been committed yet. Cells are released
        // only after `committed` records the keys.
        if !pending.is_empty() {
            self.commit(namespace, &pending).await?;
        }
        drop(claims);

        // 6. Assemble ordered entries
        let mut entries = Vec::with_capacity(slots.len());
        let mut malformed = Vec::new();
        for slot in slots {
            let (idx, repeat) = match slot {
                Slot::Malformed(raw) => {
                    malformed.push(raw);
                    continue;
                }
                Slot::First(idx) => (idx, None),
                Slot::Repeat(idx, raw) => (idx, Some(raw)),
            };

            let status = if skipped[idx] {
                EntryStatus::AlreadyChecked
            } else {
                match (&results[idx], repeat.is_some()) {
                    (None, _) => EntryStatus::NotAttempted,
                    (Some(Dispatched::Committed), _) => EntryStatus::AlreadyChecked,
                    (Some(Dispatched::Own(r) | Dispatched::Shared(r)), true) => {
                        EntryStatus::BatchCached { lookup: r.clone() }
                    }
                    (Some(Dispatched::Own(r)), false) => EntryStatus::Resolved { lookup: r.clone() },
                    (Some(Dispatched::Shared(r)), false) => EntryStatus::Shared { lookup: r.clone() },
                }
            };

            entries.push(BatchEntry {
                identifier: repeat.unwrap_or_else(|| unique[idx].as_str().to_string()),
                status,
            });
        }

        report.not_attempted = unique
            .iter()
            .enumerate()
            .filter(|(i, _)| !skipped[*i] && results[*i].is_none())
            .count();
        report.newly_checked = newly_checked.len();
        let cancelled = report.not_attempted > 0;

        if cancelled {
            tracing::warn!(
                "batch cancelled namespace={} not_attempted={}",
                namespace,
                report.not_attempted
            );
        }
        tracing::info!(
            "batch done namespace={} cached={} success={} failure={} malformed={} newly_checked={}",
            namespace,
            report.skipped_cached,
            report.resolved_success,
            report.resolved_failure,
            report.malformed,
            report.newly_checked
        );

        Ok(BatchOutcome {
            namespace,
            entries,
            newly_checked,
            malformed,
            report,
            cancelled,
        })
    }

    /// Resolve one identifier unless the batch was cancelled.
    ///
    /// Joins an in-flight lookup for the same key if another batch started
    /// one. The cell is claimed before anything awaits, so it is released
    /// however the batch ends.
    async fn dispatch(
        &self,
        identifier: &Identifier,
        resolver: &dyn Resolver,
        claims: &InFlightClaims<'_>,
    ) -> Option<Dispatched> {
        if self.shutdown.is_shutdown() {
            return None;
        }

        let key = (identifier.namespace(), identifier.key().to_string());
        let cell: InFlightCell = self.in_flight.entry(key.clone()).or_default().clone();
        claims.hold(key.clone(), cell.clone());

        // A cell is removed only after its keys reach `committed`, so a fresh
        // cell here means any earlier commit of this key is already visible.
        if self.committed.contains(&key) {
            return Some(Dispatched::Committed);
        }

        let owned = AtomicBool::new(false);
        let owned_ref = &owned;
        let result = cell
            .get_or_init(move || async move {
                owned_ref.store(true, Ordering::SeqCst);
                tracing::debug!("resolving {} {}", identifier.namespace(), identifier);
                resolver.resolve(identifier).await
            })
            .await
            .clone();

        if owned.load(Ordering::SeqCst) {
            Some(Dispatched::Own(result))
        } else {
            tracing::debug!("joined in-flight lookup for {}", identifier);
            Some(Dispatched::Shared(result))
        }
    }

    fn should_cache(&self, result: &LookupResult) -> bool {
        result.is_success() && (self.cache_not_found || !result.is_vendor_not_found())
    }

    async fn commit(&self, namespace: Namespace, keys: &HashSet<String>) -> Result<(), BatchError> {
        match self.store.commit(namespace, keys).await {
            Ok(summary) => {
                for key in keys {
                    self.committed.insert((namespace, key.clone()));
                }
                tracing::info!(
                    "committed {} new {} identifiers (total {})",
                    summary.added,
                    namespace,
                    summary.total
                );
                Ok(())
            }
            Err(source) => {
                tracing::error!("checked-set commit failed for {}: {}", namespace, source);
                Err(BatchError::Commit {
                    namespace,
                    pending: keys.len(),
                    source,
                })
            }
        }
    }
}

/// In-flight cells this batch used, released when the batch ends.
///
/// Only the exact cell is removed, so a newer lookup for the same key
/// started after ours finished is left alone.
struct InFlightClaims<'a> {
    map: &'a DashMap<InFlightKey, InFlightCell>,
    held: parking_lot::Mutex<Vec<(InFlightKey, InFlightCell)>>,
}

impl<'a> InFlightClaims<'a> {
    fn new(map: &'a DashMap<InFlightKey, InFlightCell>) -> Self {
        Self {
            map,
            held: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn hold(&self, key: InFlightKey, cell: InFlightCell) {
        self.held.lock().push((key, cell));
    }
}

impl Drop for InFlightClaims<'_> {
    fn drop(&mut self) {
        for (key, cell) in self.held.get_mut().drain(..) {
            self.map.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        }
    }
}
