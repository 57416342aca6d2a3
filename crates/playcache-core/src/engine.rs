//! Sync engine: drives local pending records to the remote gateway

use playcache_api::{RecordKind, SyncRecord};
use playcache_remote::RemoteGateway;
use playcache_store::{LocalStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{KindReport, SyncEvent, SyncOutcome, SyncReport, SyncTrigger};

const EVENT_CAPACITY: usize = 256;

/// How long a pass lease lives without renewal. Renewed before every push,
/// so it only runs out when the holding process died mid-pass.
const PASS_LEASE_TTL_MS: i64 = 10 * 60 * 1000;

/// Ends a pass: gives the store lease back and clears the in-flight flag
struct PassGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.store.release_pass(&self.engine.holder) {
            debug!(error = %e, "Failed to release sync lease");
        }
        self.engine.in_flight.store(false, Ordering::Release);
    }
}

/// The sync engine.
///
/// At most one pass runs at a time; a request that arrives while a pass is
/// in flight returns `AlreadyRunning` immediately and is not queued. The
/// in-flight flag covers this engine, the lease in the store covers every
/// other engine (in this or another process) on the same database. Within
/// a pass, kinds are processed independently and records of one kind are
/// pushed one at a time in insertion order.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    holder: String,
    in_flight: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn LocalStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let holder = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());

        info!(gateway = gateway.name(), holder = %holder, "Sync engine initialized");

        Self {
            store,
            gateway,
            holder,
            in_flight: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Whether this engine is running a pass
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one full pass over every kind
    pub async fn sync_all(&self, trigger: SyncTrigger) -> SyncOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(trigger = ?trigger, "Sync pass already running, trigger dropped");
            return SyncOutcome::AlreadyRunning;
        }

        match self
            .store
            .try_acquire_pass(&self.holder, playcache_util::now_millis(), PASS_LEASE_TTL_MS)
        {
            Ok(true) => {}
            Ok(false) => {
                self.in_flight.store(false, Ordering::Release);
                debug!(trigger = ?trigger, "Sync lease held elsewhere, trigger dropped");
                return SyncOutcome::AlreadyRunning;
            }
            // Every kind will be skipped on the same error
            Err(e) => warn!(error = %e, "Could not take sync lease"),
        }
        let _guard = PassGuard { engine: self };

        let started_at = playcache_util::now();
        debug!(trigger = ?trigger, "Sync pass started");
        self.emit(SyncEvent::PassStarted { trigger });

        let mut kinds = BTreeMap::new();
        for kind in RecordKind::ALL {
            if !self.renew_lease() {
                break;
            }
            let report = self.sync_kind(kind).await;
            kinds.insert(kind, report);
        }

        let report = SyncReport {
            trigger,
            started_at,
            finished_at: playcache_util::now(),
            kinds,
        };

        info!(
            trigger = ?trigger,
            synced = report.synced(),
            failed = report.failed(),
            skipped = report.skipped_kinds().len(),
            "Sync pass finished"
        );

        self.emit(SyncEvent::PassFinished(report.clone()));
        SyncOutcome::Completed(report)
    }

    /// Extend the lease. `false` only when another holder took it over.
    fn renew_lease(&self) -> bool {
        match self.store.try_acquire_pass(
            &self.holder,
            playcache_util::now_millis(),
            PASS_LEASE_TTL_MS,
        ) {
            Ok(true) => true,
            Ok(false) => {
                warn!(holder = %self.holder, "Sync lease lost, ending pass");
                false
            }
            Err(_) => true,
        }
    }

    async fn sync_kind(&self, kind: RecordKind) -> KindReport {
        let mut report = KindReport::default();

        let pending = match self.store.get_unsynced(kind) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Could not read pending records, skipping kind");
                self.skip_kind(kind, &e, &mut report);
                return report;
            }
        };

        if pending.is_empty() {
            return report;
        }

        debug!(kind = %kind, pending = pending.len(), "Pushing pending records");

        for record in pending {
            if !self.renew_lease() {
                break;
            }
            report.attempted += 1;

            match self.gateway.push(kind, &record).await {
                Ok(()) => match self.confirm(kind, &record) {
                    Ok(()) => {
                        report.synced += 1;
                        self.emit(SyncEvent::RecordSynced {
                            kind,
                            id: record.id.clone(),
                        });
                    }
                    Err(e @ StoreError::Unavailable(_)) => {
                        warn!(kind = %kind, id = %record.id, error = %e, "Store lost during pass, skipping rest of kind");
                        report.failed += 1;
                        self.skip_kind(kind, &e, &mut report);
                        break;
                    }
                    Err(e) => {
                        // Stays pending; the next pass pushes it again
                        warn!(kind = %kind, id = %record.id, error = %e, "Pushed record could not be marked synced");
                        report.failed += 1;
                        self.emit(SyncEvent::RecordFailed {
                            kind,
                            id: record.id.clone(),
                            error: e.to_string(),
                            transient: true,
                        });
                    }
                },
                Err(e) => {
                    warn!(
                        kind = %kind,
                        id = %record.id,
                        error = %e,
                        transient = e.is_transient(),
                        attempts = record.sync_attempts + 1,
                        "Push failed, record left pending"
                    );
                    report.failed += 1;

                    if let Err(store_err) = self.store.record_failure(kind, &record.id, &e.to_string()) {
                        warn!(kind = %kind, id = %record.id, error = %store_err, "Failed to record push failure");
                    }

                    self.emit(SyncEvent::RecordFailed {
                        kind,
                        id: record.id.clone(),
                        error: e.to_string(),
                        transient: e.is_transient(),
                    });
                }
            }
        }

        if report.synced > 0 {
            info!(kind = %kind, synced = report.synced, failed = report.failed, "Kind synced");
        }

        report
    }

    /// Record the remote's confirmation locally
    fn confirm(&self, kind: RecordKind, record: &SyncRecord) -> StoreResult<()> {
        let at = playcache_util::now();

        if kind.is_upserted() {
            // created_at carries the profile version that was pushed
            let applied = self
                .store
                .mark_profile_synced(&record.owner_id, record.created_at, at)?;
            if !applied {
                debug!(owner = %record.owner_id, "Profile changed during push, stays stale");
            }
        } else {
            self.store.mark_synced(kind, &record.id, at)?;
        }

        Ok(())
    }

    fn skip_kind(&self, kind: RecordKind, error: &StoreError, report: &mut KindReport) {
        report.skipped = true;
        self.emit(SyncEvent::KindSkipped {
            kind,
            error: error.to_string(),
        });
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}
