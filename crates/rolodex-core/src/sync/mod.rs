//! Sync orchestration between the local record store and the remote service
//!
//! [`SyncManager`] drives sync-down (pull) and sync-up (push) passes over the
//! record store, one record at a time. At most one pass per direction runs at
//! a time; pause and cancellation take effect at record granularity, between
//! remote calls, never mid-call.

pub mod resolver;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Error, Result};
use crate::models::{ContactRecord, LocalState, SyncAlert, VersionMarker};
use crate::remote::RemoteClient;
use crate::status::StatusReporter;
use crate::store::RecordStore;
use self::resolver::Resolution;

/// Lifecycle phase of the sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Running,
    Paused,
}

/// Direction(s) currently occupied by sync passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    None,
    Down,
    Up,
    Both,
}

/// How the most recent pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncOutcome {
    #[default]
    None,
    Succeeded,
    Failed,
    Cancelled,
}

impl SyncOutcome {
    /// Combine sub-pass outcomes, keeping the worse one
    const fn worse(self, other: Self) -> Self {
        match (self, other) {
            (Self::Cancelled, _) | (_, Self::Cancelled) => Self::Cancelled,
            (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
            _ => Self::Succeeded,
        }
    }
}

/// Pass-level failure that ended or degraded a sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassError {
    /// The remote service could not be used at all
    Remote(String),
    /// Local persistence failed; the pass was aborted
    Store(String),
}

impl From<Error> for PassError {
    fn from(error: Error) -> Self {
        match error {
            Error::Store(message) => Self::Store(message),
            other => Self::Remote(other.to_string()),
        }
    }
}

/// Summary of a finished sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub outcome: SyncOutcome,
    /// Records applied (down) or uploaded/purged (up)
    pub succeeded: usize,
    /// Records whose remote call failed; they keep their dirty state
    pub failed: usize,
    /// Pass-level failure, if the pass could not run to completion
    pub error: Option<PassError>,
}

/// Result of requesting a sync pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRun {
    /// The pass ran; see the report for how it went
    Completed(SyncReport),
    /// A pass for this direction is already in flight; nothing was queued
    AlreadyRunning,
}

/// Point-in-time view of the sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: SyncPhase,
    pub direction: SyncDirection,
    pub last_outcome: SyncOutcome,
}

#[derive(Debug, Default)]
struct SessionInner {
    down_in_flight: bool,
    up_in_flight: bool,
    last_outcome: SyncOutcome,
}

/// Shared session control state: in-flight bookkeeping plus the pause and
/// cancellation flags checked between records.
#[derive(Debug, Default)]
struct SyncSession {
    inner: Mutex<SessionInner>,
    paused: AtomicBool,
    cancel: AtomicBool,
    resumed: Notify,
}

impl SyncSession {
    /// Claim the given direction(s); false when already occupied
    fn try_begin(&self, direction: SyncDirection) -> bool {
        let mut inner = self.inner.lock();
        let wants_down = matches!(direction, SyncDirection::Down | SyncDirection::Both);
        let wants_up = matches!(direction, SyncDirection::Up | SyncDirection::Both);

        if (wants_down && inner.down_in_flight) || (wants_up && inner.up_in_flight) {
            return false;
        }

        if !inner.down_in_flight && !inner.up_in_flight {
            // Fresh session; an earlier stop request no longer applies
            self.cancel.store(false, Ordering::SeqCst);
        }
        inner.down_in_flight |= wants_down;
        inner.up_in_flight |= wants_up;
        true
    }

    fn finish(&self, direction: SyncDirection, outcome: SyncOutcome) {
        let mut inner = self.inner.lock();
        if matches!(direction, SyncDirection::Down | SyncDirection::Both) {
            inner.down_in_flight = false;
        }
        if matches!(direction, SyncDirection::Up | SyncDirection::Both) {
            inner.up_in_flight = false;
        }
        inner.last_outcome = outcome;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let direction = match (inner.down_in_flight, inner.up_in_flight) {
            (true, true) => SyncDirection::Both,
            (true, false) => SyncDirection::Down,
            (false, true) => SyncDirection::Up,
            (false, false) => SyncDirection::None,
        };
        let phase = if self.paused.load(Ordering::SeqCst) {
            SyncPhase::Paused
        } else if inner.down_in_flight || inner.up_in_flight {
            SyncPhase::Running
        } else {
            SyncPhase::Idle
        };
        SessionSnapshot {
            phase,
            direction,
            last_outcome: inner.last_outcome,
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resumed.notify_waiters();
    }

    fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        // Wake paused passes so they observe the cancellation
        self.resumed.notify_waiters();
    }

    /// Record-granular checkpoint: waits while paused, returns false once
    /// cancellation was requested.
    async fn checkpoint(&self) -> bool {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return false;
            }
            if !self.paused.load(Ordering::SeqCst) {
                return true;
            }
            let resumed = self.resumed.notified();
            // Re-check after registering the waiter to avoid a lost wakeup
            if self.cancel.load(Ordering::SeqCst) || !self.paused.load(Ordering::SeqCst) {
                continue;
            }
            resumed.await;
        }
    }
}

/// Orchestrates synchronization between the [`RecordStore`] and a
/// [`RemoteClient`].
///
/// All methods take `&self`; wrap the manager in an [`Arc`] to drive it from
/// multiple tasks. Sync passes never block local reads or edits.
pub struct SyncManager {
    store: Arc<RecordStore>,
    remote: Arc<dyn RemoteClient>,
    session: SyncSession,
    reporter: StatusReporter,
    marker: Mutex<Option<VersionMarker>>,
}

impl SyncManager {
    #[must_use]
    pub fn new(store: Arc<RecordStore>, remote: Arc<dyn RemoteClient>) -> Self {
        Self {
            store,
            remote,
            session: SyncSession::default(),
            reporter: StatusReporter::new(),
            marker: Mutex::new(None),
        }
    }

    /// Seed the remote-changes marker, e.g. one persisted by the caller
    #[must_use]
    pub fn with_marker(self, marker: VersionMarker) -> Self {
        *self.marker.lock() = Some(marker);
        self
    }

    /// Point-in-time session state
    #[must_use]
    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Marker to resume remote-change listing from.
    ///
    /// Advances only after a sync-down pass completes without fatal error.
    #[must_use]
    pub fn marker(&self) -> Option<VersionMarker> {
        self.marker.lock().clone()
    }

    /// The currently pending alert, if any
    #[must_use]
    pub fn pending_alert(&self) -> Option<SyncAlert> {
        self.reporter.pending_alert()
    }

    /// Dismiss the pending alert
    pub fn acknowledge_alert(&self) {
        self.reporter.acknowledge();
    }

    /// Dismiss the pending alert and cancel remaining sync work
    pub fn stop_from_alert(&self) {
        self.reporter.acknowledge();
        self.stop();
    }

    /// Pause sync at the next record boundary; in-flight remote calls finish
    pub fn pause(&self) {
        self.session.pause();
        tracing::info!("sync paused");
    }

    /// Resume a paused session; the pass continues where it left off
    pub fn resume(&self) {
        self.session.resume();
        tracing::info!("sync resumed");
    }

    /// Request cooperative cancellation of all in-flight passes
    pub fn stop(&self) {
        self.session.request_stop();
        tracing::info!("sync cancellation requested");
    }

    /// Pull remote changes since the marker and apply them to the store.
    ///
    /// Records with no local counterpart materialize as `Clean`; clean local
    /// mirrors adopt the remote version; dirty records are left untouched
    /// until uploaded.
    pub async fn sync_down(&self) -> SyncRun {
        if !self.session.try_begin(SyncDirection::Down) {
            tracing::debug!("sync-down already running; ignoring request");
            return SyncRun::AlreadyRunning;
        }
        let report = self.run_down_pass().await;
        self.session.finish(SyncDirection::Down, report.outcome);
        self.reporter.publish(&report);
        SyncRun::Completed(report)
    }

    /// Upload every dirty record, in ascending local-id order.
    ///
    /// Per-record remote failures do not abort the pass; the record keeps its
    /// dirty state and the pass reports partial success.
    pub async fn sync_up(&self) -> SyncRun {
        if !self.session.try_begin(SyncDirection::Up) {
            tracing::debug!("sync-up already running; ignoring request");
            return SyncRun::AlreadyRunning;
        }
        let report = self.run_up_pass().await;
        self.session.finish(SyncDirection::Up, report.outcome);
        self.reporter.publish(&report);
        SyncRun::Completed(report)
    }

    /// Run sync-up to completion, then sync-down.
    ///
    /// Uploading first protects local edits from being overwritten by a
    /// stale pull. Occupies both directions for the whole run.
    pub async fn sync_up_down(&self) -> SyncRun {
        if !self.session.try_begin(SyncDirection::Both) {
            tracing::debug!("sync already running; ignoring up-down request");
            return SyncRun::AlreadyRunning;
        }

        let up = self.run_up_pass().await;
        self.reporter.publish(&up);

        let report = if up.outcome == SyncOutcome::Cancelled || up.error.is_some() {
            SyncReport {
                direction: SyncDirection::Both,
                ..up
            }
        } else {
            let down = self.run_down_pass().await;
            self.reporter.publish(&down);
            SyncReport {
                direction: SyncDirection::Both,
                outcome: up.outcome.worse(down.outcome),
                succeeded: up.succeeded + down.succeeded,
                failed: up.failed + down.failed,
                error: down.error,
            }
        };

        self.session.finish(SyncDirection::Both, report.outcome);
        SyncRun::Completed(report)
    }

    /// Re-fetch every record with a remote id and purge clean ones the
    /// remote no longer has. Occupies the Down direction.
    pub async fn clean_ghosts(&self) -> SyncRun {
        if !self.session.try_begin(SyncDirection::Down) {
            tracing::debug!("sync-down already running; ignoring ghost cleanup");
            return SyncRun::AlreadyRunning;
        }
        let report = self.run_ghost_pass().await;
        self.session.finish(SyncDirection::Down, report.outcome);
        self.reporter.publish(&report);
        SyncRun::Completed(report)
    }

    /// Drop every local record and reset the marker.
    ///
    /// Rejected while a pass is in flight: a running pass could resurrect
    /// records it is mid-way through confirming.
    pub fn clear_local_data(&self) -> Result<()> {
        if self.session.snapshot().direction != SyncDirection::None {
            return Err(Error::InvalidState(
                "cannot clear local data while a sync pass is running".to_string(),
            ));
        }
        self.store.clear_all()?;
        *self.marker.lock() = None;
        Ok(())
    }

    /// Rebuild the store cache from the persisted backend
    pub fn refresh_from_store(&self) -> Result<()> {
        self.store.refresh()
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    async fn run_up_pass(&self) -> SyncReport {
        let records = self.store.dirty_records();
        tracing::debug!("sync-up: {} dirty records", records.len());

        let mut succeeded = 0;
        let mut failed = 0;
        for record in records {
            if !self.session.checkpoint().await {
                tracing::info!("sync-up cancelled after {} records", succeeded + failed);
                return SyncReport {
                    direction: SyncDirection::Up,
                    outcome: SyncOutcome::Cancelled,
                    succeeded,
                    failed,
                    error: None,
                };
            }

            match self.push_record(&record).await {
                Ok(()) => succeeded += 1,
                Err(Error::Store(message)) => {
                    tracing::warn!("sync-up aborted by store failure: {message}");
                    return SyncReport {
                        direction: SyncDirection::Up,
                        outcome: SyncOutcome::Failed,
                        succeeded,
                        failed,
                        error: Some(PassError::Store(message)),
                    };
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!("failed to upload record {}: {error}", record.local_id);
                }
            }
        }

        let outcome = if failed > 0 {
            SyncOutcome::Failed
        } else {
            SyncOutcome::Succeeded
        };
        tracing::info!("sync-up finished: {succeeded} uploaded, {failed} failed");
        SyncReport {
            direction: SyncDirection::Up,
            outcome,
            succeeded,
            failed,
            error: None,
        }
    }

    /// Upload one dirty record. The remote call matches the record's state;
    /// the store transition happens only after the call succeeds.
    async fn push_record(&self, record: &ContactRecord) -> Result<()> {
        match record.local_state {
            // Raced with a concurrent pass; nothing left to upload
            LocalState::Clean => Ok(()),
            LocalState::LocallyCreated => {
                let created = self.remote.create(&record.fields).await?;
                self.store
                    .confirm_created(&record.local_id, created.id, created.version)?;
                Ok(())
            }
            LocalState::LocallyUpdated => {
                let remote_id = record.remote_id.clone().ok_or_else(|| {
                    Error::InvalidState(format!("record {} has no remote id", record.local_id))
                })?;
                let version = self.remote.update(&remote_id, &record.fields).await?;
                self.store.confirm_updated(&record.local_id, version)?;
                Ok(())
            }
            LocalState::LocallyDeleted => {
                let remote_id = record.remote_id.clone().ok_or_else(|| {
                    Error::InvalidState(format!("record {} has no remote id", record.local_id))
                })?;
                match self.remote.delete(&remote_id).await {
                    Ok(()) => self.store.purge(&record.local_id),
                    Err(Error::NotFound(_)) => {
                        // Already gone remotely; the deletion is satisfied
                        tracing::debug!("record {remote_id} already deleted remotely");
                        self.store.purge(&record.local_id)
                    }
                    Err(error) => Err(error),
                }
            }
        }
    }

    async fn run_down_pass(&self) -> SyncReport {
        let marker = self.marker.lock().clone();
        let changes = match self.remote.list_changed_since(marker.as_ref()).await {
            Ok(changes) => changes,
            Err(error) => {
                tracing::warn!("sync-down could not list remote changes: {error}");
                return SyncReport {
                    direction: SyncDirection::Down,
                    outcome: SyncOutcome::Failed,
                    succeeded: 0,
                    failed: 0,
                    error: Some(error.into()),
                };
            }
        };
        tracing::debug!(
            "sync-down: {} changed, {} deleted since marker",
            changes.records.len(),
            changes.deleted_ids.len()
        );

        let mut applied = 0;
        for remote_record in changes.records {
            if !self.session.checkpoint().await {
                tracing::info!("sync-down cancelled after {applied} records");
                return SyncReport {
                    direction: SyncDirection::Down,
                    outcome: SyncOutcome::Cancelled,
                    succeeded: applied,
                    failed: 0,
                    error: None,
                };
            }

            let local = self.store.find_by_remote_id(&remote_record.id);
            match resolver::resolve_remote_upsert(local.as_ref()) {
                Resolution::CreateClean | Resolution::AdoptRemote => {
                    match self.store.adopt_remote(
                        &remote_record.id,
                        remote_record.fields,
                        remote_record.version,
                    ) {
                        Ok(_) => applied += 1,
                        // Raced with a local edit since the lookup; local wins
                        Err(Error::InvalidState(_)) => {}
                        Err(error) => {
                            tracing::warn!("sync-down aborted by store failure: {error}");
                            return SyncReport {
                                direction: SyncDirection::Down,
                                outcome: SyncOutcome::Failed,
                                succeeded: applied,
                                failed: 0,
                                error: Some(error.into()),
                            };
                        }
                    }
                }
                Resolution::KeepLocal => {
                    tracing::debug!(
                        "keeping local changes over remote update {}",
                        remote_record.id
                    );
                }
                Resolution::Purge | Resolution::Ignore => {}
            }
        }

        for deleted in changes.deleted_ids {
            if !self.session.checkpoint().await {
                tracing::info!("sync-down cancelled during ghost handling");
                return SyncReport {
                    direction: SyncDirection::Down,
                    outcome: SyncOutcome::Cancelled,
                    succeeded: applied,
                    failed: 0,
                    error: None,
                };
            }

            if let Some(local) = self.store.find_by_remote_id(&deleted) {
                match resolver::resolve_remote_absent(Some(&local)) {
                    Resolution::Purge => match self.store.purge(&local.local_id) {
                        Ok(()) => applied += 1,
                        Err(error) => {
                            tracing::warn!("sync-down aborted by store failure: {error}");
                            return SyncReport {
                                direction: SyncDirection::Down,
                                outcome: SyncOutcome::Failed,
                                succeeded: applied,
                                failed: 0,
                                error: Some(error.into()),
                            };
                        }
                    },
                    Resolution::KeepLocal => {
                        tracing::debug!(
                            "keeping dirty record {} despite remote deletion",
                            local.local_id
                        );
                    }
                    _ => {}
                }
            }
        }

        // The marker only advances after a full, uncancelled pass
        *self.marker.lock() = Some(changes.next_marker);
        tracing::info!("sync-down finished: {applied} changes applied");
        SyncReport {
            direction: SyncDirection::Down,
            outcome: SyncOutcome::Succeeded,
            succeeded: applied,
            failed: 0,
            error: None,
        }
    }

    async fn run_ghost_pass(&self) -> SyncReport {
        let candidates: Vec<ContactRecord> = self
            .store
            .list()
            .into_iter()
            .filter(|r| r.remote_id.is_some())
            .collect();
        tracing::debug!("ghost cleanup: checking {} records", candidates.len());

        let mut purged = 0;
        let mut failed = 0;
        for record in candidates {
            if !self.session.checkpoint().await {
                tracing::info!("ghost cleanup cancelled after {} checks", purged + failed);
                return SyncReport {
                    direction: SyncDirection::Down,
                    outcome: SyncOutcome::Cancelled,
                    succeeded: purged,
                    failed,
                    error: None,
                };
            }

            let Some(remote_id) = record.remote_id.clone() else {
                continue;
            };
            match self.remote.fetch_by_id(&remote_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    // Re-read local state; it may have changed since the snapshot
                    let current = self.store.get(&record.local_id).ok();
                    if resolver::resolve_remote_absent(current.as_ref()) == Resolution::Purge {
                        match self.store.purge(&record.local_id) {
                            Ok(()) => {
                                purged += 1;
                                tracing::debug!("purged ghost record {}", record.local_id);
                            }
                            Err(error) => {
                                tracing::warn!("ghost cleanup aborted by store failure: {error}");
                                return SyncReport {
                                    direction: SyncDirection::Down,
                                    outcome: SyncOutcome::Failed,
                                    succeeded: purged,
                                    failed,
                                    error: Some(error.into()),
                                };
                            }
                        }
                    }
                }
                Err(Error::Store(message)) => {
                    return SyncReport {
                        direction: SyncDirection::Down,
                        outcome: SyncOutcome::Failed,
                        succeeded: purged,
                        failed,
                        error: Some(PassError::Store(message)),
                    };
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!("ghost check failed for {remote_id}: {error}");
                }
            }
        }

        let outcome = if failed > 0 {
            SyncOutcome::Failed
        } else {
            SyncOutcome::Succeeded
        };
        tracing::info!("ghost cleanup finished: {purged} purged, {failed} checks failed");
        SyncReport {
            direction: SyncDirection::Down,
            outcome,
            succeeded: purged,
            failed,
            error: None,
        }
    }
}
