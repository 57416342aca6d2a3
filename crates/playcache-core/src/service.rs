//! Cache service: the context object the app talks to

use playcache_api::{
    CacheSize, CompositeScore, Payload, ProfileRecord, ProfileSnapshot, RecordKind, SyncRecord,
    WidgetEnvelope, WidgetKinds,
};
use playcache_net::NetworkHandle;
use playcache_store::LocalStore;
use playcache_util::{LogicalClock, OwnerId, RecordId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{SyncEngine, SyncOutcome, SyncTrigger, WidgetNotifier, composite_score};

const DEFAULT_SCORE_WINDOW: usize = 10;

/// Entry point for reads and writes against the local cache.
///
/// Writes land in the store immediately and are readable right away. Store
/// failures are logged and reported as `None`/empty results; nothing here
/// returns an error to the caller.
pub struct CacheService {
    store: Arc<dyn LocalStore>,
    engine: Arc<SyncEngine>,
    network: NetworkHandle,
    clock: LogicalClock,
    notifiers: Vec<Arc<dyn WidgetNotifier>>,
    widget_kinds: WidgetKinds,
    fast_path: bool,
    score_window: usize,
}

impl CacheService {
    pub fn new(store: Arc<dyn LocalStore>, engine: Arc<SyncEngine>, network: NetworkHandle) -> Self {
        let clock = match store.latest_timestamp() {
            Ok(Some(latest)) => LogicalClock::seeded(latest),
            Ok(None) => LogicalClock::new(),
            Err(e) => {
                warn!(error = %e, "Could not read latest timestamp, clock starts from wall time");
                LogicalClock::new()
            }
        };

        Self {
            store,
            engine,
            network,
            clock,
            notifiers: Vec::new(),
            widget_kinds: WidgetKinds::default(),
            fast_path: true,
            score_window: DEFAULT_SCORE_WINDOW,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn WidgetNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn with_widget_kinds(mut self, kinds: WidgetKinds) -> Self {
        self.widget_kinds = kinds;
        self
    }

    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    pub fn with_score_window(mut self, window: usize) -> Self {
        self.score_window = window.max(1);
        self
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    // Writes

    /// Cache a new record as pending. Profiles are routed to `save_profile`.
    pub fn put(&self, owner: &OwnerId, payload: impl Into<Payload>) -> Option<SyncRecord> {
        self.put_with_local_ref(owner, payload, None)
    }

    /// Like `put`, attaching a pointer to a resource that only exists locally
    pub fn put_with_local_ref(
        &self,
        owner: &OwnerId,
        payload: impl Into<Payload>,
        local_ref: Option<String>,
    ) -> Option<SyncRecord> {
        let payload = match payload.into() {
            Payload::Profile(profile) => {
                if let Some(local_ref) = &local_ref {
                    debug!(
                        owner = %owner,
                        local_ref = %local_ref,
                        "Profiles keep no local reference, dropped"
                    );
                }
                return self
                    .save_profile(owner, profile)
                    .map(|record| record.to_sync_record());
            }
            other => other,
        };

        let mut record = SyncRecord::new_pending(owner.clone(), payload, self.clock.tick());
        record.local_only_ref = local_ref;
        let kind = record.kind();

        if let Err(e) = self.store.put(&record) {
            warn!(kind = %kind, owner = %owner, error = %e, "Failed to cache record");
            return None;
        }

        debug!(kind = %kind, id = %record.id, "Record cached");

        self.notify_widgets(&record);
        self.maybe_fast_sync();

        Some(record)
    }

    /// Upsert the owner's profile; it is pushed again on the next pass
    pub fn save_profile(&self, owner: &OwnerId, profile: ProfileSnapshot) -> Option<ProfileRecord> {
        let updated_at = self.clock.tick();

        if let Err(e) = self.store.upsert_profile(owner, &profile, updated_at) {
            warn!(owner = %owner, error = %e, "Failed to cache profile");
            return None;
        }

        self.maybe_fast_sync();
        self.profile(owner)
    }

    /// Set the local read flag of a notification
    pub fn mark_notification_read(&self, id: &RecordId, read: bool) -> bool {
        self.store
            .set_notification_read(id, read)
            .unwrap_or_else(|e| {
                warn!(id = %id, error = %e, "Failed to update notification read state");
                false
            })
    }

    /// Evict cached data for one owner, or everything when `owner` is `None`
    pub fn clear_cache(&self, owner: Option<&OwnerId>) -> bool {
        match owner {
            Some(owner) => {
                let mut ok = true;
                for kind in RecordKind::ALL {
                    match self.store.delete_by_owner(kind, owner) {
                        Ok(deleted) => {
                            debug!(kind = %kind, owner = %owner, deleted, "Owner records evicted")
                        }
                        Err(e) => {
                            warn!(kind = %kind, owner = %owner, error = %e, "Failed to evict records");
                            ok = false;
                        }
                    }
                }
                ok
            }
            None => match self.store.clear_all() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Failed to clear cache");
                    false
                }
            },
        }
    }

    // Reads

    pub fn get(&self, kind: RecordKind, id: &RecordId) -> Option<SyncRecord> {
        self.store.get(kind, id).unwrap_or_else(|e| {
            warn!(kind = %kind, id = %id, error = %e, "Failed to read record");
            None
        })
    }

    /// All cached records of a kind for an owner, newest first
    pub fn records(&self, kind: RecordKind, owner: &OwnerId) -> Vec<SyncRecord> {
        self.read_by_owner(kind, owner, None)
    }

    /// The `n` most recent records of a kind for an owner, newest first
    pub fn recent(&self, kind: RecordKind, owner: &OwnerId, n: usize) -> Vec<SyncRecord> {
        self.read_by_owner(kind, owner, Some(n))
    }

    pub fn get_unsynced(&self, kind: RecordKind) -> Vec<SyncRecord> {
        self.store.get_unsynced(kind).unwrap_or_else(|e| {
            warn!(kind = %kind, error = %e, "Failed to read pending records");
            Vec::new()
        })
    }

    pub fn profile(&self, owner: &OwnerId) -> Option<ProfileRecord> {
        self.store.get_profile(owner).unwrap_or_else(|e| {
            warn!(owner = %owner, error = %e, "Failed to read profile");
            None
        })
    }

    pub fn unread_notifications(&self, owner: &OwnerId) -> usize {
        self.store.unread_notifications(owner).unwrap_or_else(|e| {
            warn!(owner = %owner, error = %e, "Failed to count unread notifications");
            0
        })
    }

    /// Counts per kind; `None` when the store cannot be read
    pub fn cache_size(&self) -> Option<CacheSize> {
        self.store
            .cache_size()
            .inspect_err(|e| warn!(error = %e, "Failed to read cache size"))
            .ok()
    }

    /// Records (and stale profiles) still waiting for the remote
    pub fn pending_count(&self) -> usize {
        self.cache_size().map(|size| size.pending()).unwrap_or(0)
    }

    /// Leaderboard score over the owner's most recent synced sessions
    pub fn composite_score(&self, owner: &OwnerId) -> Option<CompositeScore> {
        let mut scores: Vec<f64> = self
            .records(RecordKind::Telemetry, owner)
            .iter()
            .filter(|record| !record.is_pending())
            .filter_map(|record| record.payload.as_telemetry().map(|t| t.score))
            .take(self.score_window)
            .collect();

        // Newest first from the store; scoring wants oldest first
        scores.reverse();
        composite_score(&scores)
    }

    // Sync

    /// Run a pass now and wait for it
    pub async fn sync_now(&self) -> SyncOutcome {
        self.engine.sync_all(SyncTrigger::Manual).await
    }

    fn read_by_owner(&self, kind: RecordKind, owner: &OwnerId, limit: Option<usize>) -> Vec<SyncRecord> {
        self.store
            .get_by_owner(kind, owner, limit)
            .unwrap_or_else(|e| {
                warn!(kind = %kind, owner = %owner, error = %e, "Failed to read records");
                Vec::new()
            })
    }

    fn notify_widgets(&self, record: &SyncRecord) {
        if self.notifiers.is_empty() || !self.widget_kinds.includes(record.kind()) {
            return;
        }

        let envelope = WidgetEnvelope::new(record.clone());
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(&envelope) {
                warn!(kind = %envelope.kind, error = %e, "Widget notification failed");
            }
        }
    }

    /// Best-effort pass right after a write; the scheduler is the backstop
    fn maybe_fast_sync(&self) {
        if !self.fast_path || !self.network.is_online() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime, fast-path sync skipped");
            return;
        };

        let engine = self.engine.clone();
        runtime.spawn(async move {
            engine.sync_all(SyncTrigger::FastPath).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelWidgetNotifier;
    use playcache_api::{DrillLog, Notification, TelemetrySnapshot};
    use playcache_net::{NetworkMonitor, NetworkState};
    use playcache_remote::MockGateway;
    use playcache_store::{SqliteStore, UnavailableStore};
    use std::collections::BTreeMap;

    struct Fixture {
        gateway: Arc<MockGateway>,
        monitor: NetworkMonitor,
        service: CacheService,
    }

    fn fixture(state: NetworkState) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let gateway = Arc::new(MockGateway::new());
        let engine = Arc::new(SyncEngine::new(store.clone(), gateway.clone()));
        let monitor = NetworkMonitor::with_state(state);
        let service = CacheService::new(store.clone(), engine, monitor.handle());
        Fixture {
            gateway,
            monitor,
            service,
        }
    }

    fn owner() -> OwnerId {
        OwnerId::new("athlete-1")
    }

    fn drill(name: &str) -> DrillLog {
        DrillLog {
            drill_id: name.to_lowercase(),
            drill_name: name.into(),
            reps: 8,
            duration_secs: 120,
            success_rate: Some(0.5),
            notes: None,
        }
    }

    fn session(score: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            session_id: format!("s-{}", score),
            sport: "basketball".into(),
            score,
            duration_secs: 2400,
            metrics: BTreeMap::new(),
        }
    }

    fn notification(title: &str) -> Notification {
        Notification {
            title: title.into(),
            body: String::new(),
            category: "coach".into(),
            deep_link: None,
        }
    }

    #[test]
    fn put_is_immediately_readable() {
        let f = fixture(NetworkState::Offline);

        let record = f.service.put(&owner(), drill("Layups")).unwrap();
        assert!(record.is_pending());

        let recent = f.service.recent(RecordKind::DrillLog, &owner(), 5);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, record.id);
        assert_eq!(f.service.get_unsynced(RecordKind::DrillLog).len(), 1);
        assert_eq!(f.service.pending_count(), 1);
    }

    #[test]
    fn timestamps_and_ids_are_unique() {
        let f = fixture(NetworkState::Offline);

        let a = f.service.put(&owner(), drill("A")).unwrap();
        let b = f.service.put(&owner(), drill("B")).unwrap();
        assert!(b.created_at > a.created_at);
        assert_ne!(a.id, b.id);

        let recent = f.service.recent(RecordKind::DrillLog, &owner(), 1);
        assert_eq!(recent[0].id, b.id);
    }

    #[test]
    fn clock_continues_after_existing_records() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let future = playcache_util::now_millis() + 60_000;
        store
            .put(&SyncRecord::new_pending(
                owner(),
                Payload::DrillLog(drill("Early")),
                future,
            ))
            .unwrap();

        let engine = Arc::new(SyncEngine::new(store.clone(), Arc::new(MockGateway::new())));
        let service = CacheService::new(store, engine, NetworkMonitor::new().handle());

        let record = service.put(&owner(), drill("Later")).unwrap();
        assert!(record.created_at > future);
    }

    #[test]
    fn unavailable_store_fails_open() {
        let store: Arc<dyn LocalStore> = Arc::new(UnavailableStore::new("cannot open"));
        let engine = Arc::new(SyncEngine::new(store.clone(), Arc::new(MockGateway::new())));
        let service = CacheService::new(store, engine, NetworkMonitor::new().handle());

        assert!(service.put(&owner(), drill("Layups")).is_none());
        assert!(service.recent(RecordKind::DrillLog, &owner(), 5).is_empty());
        assert!(service.cache_size().is_none());
        assert_eq!(service.pending_count(), 0);
        assert!(!service.clear_cache(None));
        assert!(!service.is_healthy());
    }

    #[tokio::test]
    async fn widget_receives_configured_kinds_only() {
        let f = fixture(NetworkState::Offline);
        let notifier = Arc::new(ChannelWidgetNotifier::new(8));
        let mut rx = notifier.subscribe();
        let service = f
            .service
            .with_notifier(notifier.clone())
            .with_widget_kinds(WidgetKinds::NOTIFICATION);

        service.put(&owner(), drill("Layups")).unwrap();
        let note = service.put(&owner(), notification("Great job")).unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.kind, RecordKind::Notification);
        assert_eq!(envelope.record.id, note.id);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fast_path_syncs_when_online() {
        let f = fixture(NetworkState::Online);
        let mut events = f.service.engine().subscribe();

        let record = f.service.put(&owner(), drill("Layups")).unwrap();

        loop {
            if let crate::SyncEvent::PassFinished(_) = events.recv().await.unwrap() {
                break;
            }
        }
        assert_eq!(f.gateway.pushed_ids(), vec![record.id]);
    }

    #[tokio::test]
    async fn no_fast_path_when_offline_or_disabled() {
        let f = fixture(NetworkState::Offline);
        f.service.put(&owner(), drill("Layups")).unwrap();

        f.monitor.set_online(true);
        let service = f.service.with_fast_path(false);
        service.put(&owner(), drill("Free throws")).unwrap();

        tokio::task::yield_now().await;
        assert!(f.gateway.attempts().is_empty());
        assert_eq!(service.pending_count(), 2);
    }

    #[test]
    fn notification_read_state_is_local() {
        let f = fixture(NetworkState::Offline);
        let first = f.service.put(&owner(), notification("One")).unwrap();
        f.service.put(&owner(), notification("Two")).unwrap();

        assert_eq!(f.service.unread_notifications(&owner()), 2);
        assert!(f.service.mark_notification_read(&first.id, true));
        assert_eq!(f.service.unread_notifications(&owner()), 1);

        // Still pending: read state is not a sync change
        let stored = f.service.get(RecordKind::Notification, &first.id).unwrap();
        assert!(stored.read);
        assert!(stored.is_pending());
    }

    #[test]
    fn profile_upsert_keeps_one_record() {
        let f = fixture(NetworkState::Offline);
        let mut profile = ProfileSnapshot {
            display_name: "Jo".into(),
            sport: Some("tennis".into()),
            skill_level: None,
            preferences: BTreeMap::new(),
        };

        let first = f.service.save_profile(&owner(), profile.clone()).unwrap();
        profile.skill_level = Some("intermediate".into());
        let second = f.service.put(&owner(), profile).unwrap();

        assert!(second.created_at > first.updated_at);
        let stored = f.service.profile(&owner()).unwrap();
        assert_eq!(stored.profile.skill_level.as_deref(), Some("intermediate"));
        assert!(stored.is_stale());
        assert_eq!(f.service.records(RecordKind::Profile, &owner()).len(), 1);
    }

    #[test]
    fn profile_put_ignores_local_ref() {
        let f = fixture(NetworkState::Offline);
        let profile = ProfileSnapshot {
            display_name: "Jo".into(),
            sport: None,
            skill_level: None,
            preferences: BTreeMap::new(),
        };

        let record = f
            .service
            .put_with_local_ref(&owner(), profile, Some("file:///avatar.png".into()))
            .unwrap();

        assert_eq!(record.kind(), RecordKind::Profile);
        assert!(record.local_only_ref.is_none());
        assert_eq!(f.service.profile(&owner()).unwrap().profile.display_name, "Jo");
        assert!(f.service.records(RecordKind::DrillLog, &owner()).is_empty());
    }

    #[test]
    fn clear_cache_by_owner() {
        let f = fixture(NetworkState::Offline);
        let other = OwnerId::new("athlete-2");
        f.service.put(&owner(), drill("A")).unwrap();
        f.service.put(&owner(), notification("N")).unwrap();
        f.service.put(&other, drill("B")).unwrap();

        assert!(f.service.clear_cache(Some(&owner())));
        let size = f.service.cache_size().unwrap();
        assert_eq!(size.total(), 1);
        assert_eq!(f.service.records(RecordKind::DrillLog, &other).len(), 1);

        assert!(f.service.clear_cache(None));
        assert_eq!(f.service.cache_size().unwrap().total(), 0);
    }

    #[tokio::test]
    async fn composite_score_uses_synced_sessions_only() {
        let f = fixture(NetworkState::Offline);
        for score in [70.0, 75.0, 80.0, 85.0, 90.0] {
            f.service.put(&owner(), session(score)).unwrap();
        }
        assert!(f.service.composite_score(&owner()).is_none());

        f.service.sync_now().await;
        // Unsynced session is left out
        f.service.put(&owner(), session(10.0)).unwrap();

        let score = f.service.composite_score(&owner()).unwrap();
        assert_eq!(score.sessions, 5);
        assert!((score.average - 80.0).abs() < 0.01);
        assert!((score.consistency - 64.64).abs() < 0.01);
        assert!(score.improvement > 50.0);
    }

    #[tokio::test]
    async fn score_window_limits_sessions() {
        let f = fixture(NetworkState::Offline);
        for score in [10.0, 20.0, 70.0, 75.0, 80.0] {
            f.service.put(&owner(), session(score)).unwrap();
        }
        f.service.sync_now().await;

        let service = f.service.with_score_window(3);
        let score = service.composite_score(&owner()).unwrap();
        assert_eq!(score.sessions, 3);
        assert!((score.average - 75.0).abs() < 0.01);
    }
}
