//! # Offline Sync Engine
//!
//! Owns the durable queue of unsynced readings and drives submissions
//! through the reading client whenever connectivity allows.
//!
//! ## Features
//!
//! - **Single Writer**: only the engine mutates the queue; callers get
//!   read-only snapshots and a small command surface
//! - **State Machine**: `pending -> approved` on success,
//!   `pending -> failed` on any failure, user resets always allowed
//! - **Serialized Attempts**: at most one in-flight submission per entry,
//!   and sweeps never overlap
//! - **FIFO Sweeps**: `retry_all` processes entries sequentially in
//!   `created_at` order, preserving the temporal order of readings
//! - **Durable**: the persisted queue reflects the in-memory queue after
//!   every mutation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fieldmeter::engine::SyncEngine;
//! use fieldmeter::store::JsonFileStore;
//!
//! # async fn example(client: Arc<dyn fieldmeter::client::SubmitReading>) {
//! let store = Arc::new(JsonFileStore::at_default_location().unwrap());
//! let engine = Arc::new(SyncEngine::new(store, client).await);
//!
//! let monitor = fieldmeter::connectivity::ConnectivityMonitor::new();
//! engine.clone().spawn_retry_on_reconnect(&monitor);
//! # }
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::billing::BillingLockChecker;
use crate::client::{SubmitOutcome, SubmitReading};
use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncError;
use crate::model::{QueueStats, QueuedReading, ReadingDraft, ReadingStatus};
use crate::store::QueueStore;

/// A reading jump of this fraction or more over the last known value
/// requires operator remarks.
const JUMP_REMARKS_THRESHOLD: f64 = 0.20;

/// Result of one `retry_all` sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries the sweep attempted to submit
    pub attempted: usize,
    /// Entries that reached `approved`
    pub approved: usize,
    /// Entries that ended `failed`
    pub failed: usize,
    /// True when another sweep was already running and this one did nothing
    pub skipped: bool,
}

/// The offline-first queue engine.
pub struct SyncEngine {
    /// In-memory queue, mirrored to the store after every mutation
    queue: RwLock<Vec<QueuedReading>>,
    store: Arc<dyn QueueStore>,
    client: Arc<dyn SubmitReading>,
    /// Entry ids with a submission currently in flight
    in_flight: Mutex<HashSet<Uuid>>,
    /// Held for the duration of a sweep; `try_lock` failure means a sweep
    /// is already running
    sweep_guard: Mutex<()>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    /// Set when a submission came back 401/403; the UI should prompt
    /// re-authentication instead of waiting out silent retries
    needs_reauth: AtomicBool,
}

impl SyncEngine {
    /// Create an engine over a persistence port and submission client,
    /// restoring any queue persisted by a previous session.
    pub async fn new(store: Arc<dyn QueueStore>, client: Arc<dyn SubmitReading>) -> Self {
        let restored = store.load().await;
        if !restored.is_empty() {
            tracing::info!(entries = restored.len(), "restored queued readings");
        }
        Self {
            queue: RwLock::new(restored),
            store,
            client,
            in_flight: Mutex::new(HashSet::new()),
            sweep_guard: Mutex::new(()),
            last_sync: RwLock::new(None),
            needs_reauth: AtomicBool::new(false),
        }
    }

    /// Validate a draft and append it to the queue in `pending` state.
    ///
    /// Local failures (validation, billing lock, store) reject the draft
    /// before anything is queued.
    pub async fn queue(
        &self,
        draft: ReadingDraft,
        lock_checker: &BillingLockChecker,
    ) -> Result<QueuedReading, SyncError> {
        validate_draft(&draft, lock_checker)?;

        let entry = QueuedReading {
            id: Uuid::new_v4(),
            meter_id: draft.meter_id,
            building_id: draft.building_id,
            reading_value: draft.reading_value,
            read_date: draft.read_date,
            remarks: draft.remarks,
            image: draft.image,
            created_at: Utc::now(),
            status: ReadingStatus::Pending,
            error: None,
        };

        let mut queue = self.queue.write().await;
        queue.push(entry.clone());

        // Capture-time store failures fail fast: roll back rather than
        // leave an entry the next load will not see.
        if let Err(err) = self.store.save(&queue).await {
            queue.pop();
            return Err(err);
        }
        tracing::debug!(id = %entry.id, meter = %entry.meter_id, "reading queued");
        Ok(entry)
    }

    /// Queue a draft and, when the monitor reports online, attempt an
    /// immediate submission. Returns the entry in its resulting state.
    pub async fn capture(
        &self,
        draft: ReadingDraft,
        lock_checker: &BillingLockChecker,
        monitor: &ConnectivityMonitor,
    ) -> Result<QueuedReading, SyncError> {
        let entry = self.queue(draft, lock_checker).await?;
        if monitor.is_online() {
            return self.attempt_submit(entry.id).await;
        }
        Ok(entry)
    }

    /// Attempt to submit one entry, updating its state from the outcome.
    ///
    /// Only `pending` and `failed` entries are eligible; an `approved`
    /// entry is returned unchanged without touching the network, and an
    /// attempt already in flight for the same id is never duplicated.
    pub async fn attempt_submit(&self, id: Uuid) -> Result<QueuedReading, SyncError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(id) {
                // Another attempt owns this entry; report current state.
                tracing::debug!(id = %id, "submission already in flight");
                let queue = self.queue.read().await;
                return queue
                    .iter()
                    .find(|e| e.id == id)
                    .cloned()
                    .ok_or_else(|| SyncError::validation("id", "unknown queue entry"));
            }
        }

        // Status is read after winning the guard, so an attempt that just
        // finished cannot slip an approved entry back to the server.
        let snapshot = {
            let queue = self.queue.read().await;
            queue.iter().find(|e| e.id == id).cloned()
        };
        let snapshot = match snapshot {
            Some(entry) if entry.status == ReadingStatus::Approved => {
                self.in_flight.lock().await.remove(&id);
                return Ok(entry);
            }
            Some(entry) => entry,
            None => {
                self.in_flight.lock().await.remove(&id);
                return Err(SyncError::validation("id", "unknown queue entry"));
            }
        };

        let outcome = self.client.submit(&snapshot).await;
        let result = self.apply_outcome(id, outcome).await;

        self.in_flight.lock().await.remove(&id);
        result
    }

    /// Record a submission outcome on the entry and persist the queue.
    async fn apply_outcome(
        &self,
        id: Uuid,
        outcome: SubmitOutcome,
    ) -> Result<QueuedReading, SyncError> {
        let mut queue = self.queue.write().await;
        let Some(entry) = queue.iter_mut().find(|e| e.id == id) else {
            // Removed by the user while the request was in flight.
            tracing::warn!(id = %id, "entry removed during submission");
            return Err(SyncError::validation("id", "entry removed during submission"));
        };

        match &outcome {
            SubmitOutcome::Submitted { server_id } => {
                entry.status = ReadingStatus::Approved;
                entry.error = None;
                tracing::info!(id = %id, server_id = %server_id, "reading approved");
            }
            SubmitOutcome::Unauthorized { reason } => {
                entry.status = ReadingStatus::Failed;
                entry.error = Some(format!("Authentication required: {}", reason));
                self.needs_reauth.store(true, Ordering::SeqCst);
                tracing::warn!(id = %id, reason = %reason, "submission unauthorized");
            }
            SubmitOutcome::Rejected { reason } => {
                entry.status = ReadingStatus::Failed;
                entry.error = Some(format!("Submission rejected: {}", reason));
                tracing::warn!(id = %id, reason = %reason, "submission rejected");
            }
            SubmitOutcome::Network { reason } => {
                entry.status = ReadingStatus::Failed;
                entry.error = Some(reason.clone());
                tracing::debug!(id = %id, reason = %reason, "submission hit network failure");
            }
        }

        let updated = entry.clone();
        // The entry must survive a persistence hiccup for later retry;
        // log instead of unwinding the state change.
        if let Err(err) = self.store.save(&queue).await {
            tracing::warn!(error = %err, "failed to persist queue after submission");
        }
        Ok(updated)
    }

    /// Submit every `pending` and `failed` entry, sequentially, oldest
    /// first. Returns a skipped report when a sweep is already running.
    pub async fn retry_all(&self) -> SweepReport {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            tracing::debug!("sweep already in progress, skipping");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let mut eligible: Vec<(DateTime<Utc>, Uuid)> = {
            let queue = self.queue.read().await;
            queue
                .iter()
                .filter(|e| e.is_submittable())
                .map(|e| (e.created_at, e.id))
                .collect()
        };
        eligible.sort_by_key(|(created_at, id)| (*created_at, *id));

        if eligible.is_empty() {
            return SweepReport::default();
        }

        tracing::info!(entries = eligible.len(), "starting retry sweep");
        let mut report = SweepReport::default();
        for (_, id) in eligible {
            report.attempted += 1;
            match self.attempt_submit(id).await {
                Ok(entry) if entry.status == ReadingStatus::Approved => report.approved += 1,
                Ok(_) => report.failed += 1,
                Err(_) => {
                    // Entry vanished mid-sweep (user removal); nothing to count.
                    report.attempted -= 1;
                }
            }
        }

        *self.last_sync.write().await = Some(Utc::now());
        tracing::info!(
            attempted = report.attempted,
            approved = report.approved,
            failed = report.failed,
            "retry sweep finished"
        );
        report
    }

    /// Delete an entry in any state. User override, always allowed.
    pub async fn remove(&self, id: Uuid) -> Result<(), SyncError> {
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|e| e.id != id);
        if queue.len() == before {
            return Err(SyncError::validation("id", "unknown queue entry"));
        }
        self.store.save(&queue).await?;
        tracing::debug!(id = %id, "entry removed");
        Ok(())
    }

    /// Reset a `failed` or `approved` entry to `pending`, clearing its
    /// error. Resetting an approved entry is an explicit resubmit override.
    pub async fn mark_pending(&self, id: Uuid) -> Result<QueuedReading, SyncError> {
        let mut queue = self.queue.write().await;
        let entry = queue
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| SyncError::validation("id", "unknown queue entry"))?;

        entry.status = ReadingStatus::Pending;
        entry.error = None;
        let updated = entry.clone();

        self.store.save(&queue).await?;
        tracing::debug!(id = %id, "entry reset to pending");
        Ok(updated)
    }

    /// Drop all `approved` entries, returning how many were purged.
    pub async fn purge_approved(&self) -> Result<usize, SyncError> {
        let mut queue = self.queue.write().await;
        let before = queue.len();
        queue.retain(|e| e.status != ReadingStatus::Approved);
        let purged = before - queue.len();
        if purged > 0 {
            self.store.save(&queue).await?;
            tracing::debug!(purged, "approved entries purged");
        }
        Ok(purged)
    }

    /// Read-only snapshot of the queue for display
    pub async fn snapshot(&self) -> Vec<QueuedReading> {
        self.queue.read().await.clone()
    }

    /// Current queue statistics
    pub async fn stats(&self) -> QueueStats {
        let queue = self.queue.read().await;
        let mut stats = QueueStats {
            total: queue.len(),
            ..QueueStats::default()
        };
        for entry in queue.iter() {
            match entry.status {
                ReadingStatus::Pending => stats.pending += 1,
                ReadingStatus::Failed => stats.failed += 1,
                ReadingStatus::Approved => stats.approved += 1,
            }
        }
        stats
    }

    /// Completion time of the last sweep, if any this session
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    /// Whether a submission has signalled that re-authentication is needed
    pub fn needs_reauth(&self) -> bool {
        self.needs_reauth.load(Ordering::SeqCst)
    }

    /// Clear the re-authentication signal after the user logs in again
    pub fn clear_reauth(&self) {
        self.needs_reauth.store(false, Ordering::SeqCst);
    }

    /// Spawn the task that fires `retry_all` whenever connectivity comes
    /// back. The retry trigger is a domain event, not a view-layer side
    /// effect; nothing in the UI needs to participate.
    pub fn spawn_retry_on_reconnect(
        self: Arc<Self>,
        monitor: &ConnectivityMonitor,
    ) -> tokio::task::JoinHandle<()> {
        let mut rx = monitor.subscribe();
        // Baseline is read at registration time, so transitions that land
        // before the task first runs are still observed as transitions.
        let mut previous = *rx.borrow();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = *rx.borrow_and_update();
                if current == Some(true) && previous != Some(true) {
                    tracing::info!("connectivity restored, sweeping queued readings");
                    self.retry_all().await;
                }
                previous = current;
            }
        })
    }
}

/// Capture-time validation of a reading draft.
fn validate_draft(
    draft: &ReadingDraft,
    lock_checker: &BillingLockChecker,
) -> Result<(), SyncError> {
    if draft.meter_id.trim().is_empty() {
        return Err(SyncError::validation("meterId", "meter id must not be empty"));
    }
    if !draft.reading_value.is_finite() {
        return Err(SyncError::validation(
            "readingValue",
            "reading value must be a finite number",
        ));
    }
    if draft.image.trim().is_empty() {
        return Err(SyncError::validation("image", "photo evidence is required"));
    }
    if lock_checker.is_locked(&draft.building_id, draft.read_date) {
        return Err(SyncError::LockedPeriod {
            building_id: draft.building_id.clone(),
            date: draft.read_date,
        });
    }
    if requires_remarks(draft.last_reading, draft.reading_value)
        && draft.remarks.as_deref().map_or(true, |r| r.trim().is_empty())
    {
        return Err(SyncError::validation(
            "remarks",
            "remarks are required for a jump of 20% or more over the last reading",
        ));
    }
    Ok(())
}

/// Business rule: a jump of >= 20% over the last known reading needs an
/// explanation. A zero prior reading cannot express a percentage, so any
/// increase from zero also requires remarks.
fn requires_remarks(last_reading: Option<f64>, value: f64) -> bool {
    match last_reading {
        Some(last) if last > 0.0 => (value - last) / last >= JUMP_REMARKS_THRESHOLD,
        Some(last) if last == 0.0 => value > 0.0,
        _ => false,
    }
}
