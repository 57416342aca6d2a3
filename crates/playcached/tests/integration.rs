//! Integration tests for playcached
//!
//! These tests verify end-to-end behavior across store, engine, scheduler,
//! network monitor, widget notification and the command socket.

use playcache_api::{
    Command, DrillLog, Notification, Payload, RecordKind, ResponsePayload, ResponseResult,
    RewardEvent, SyncRecord, TelemetrySnapshot, WidgetEnvelope,
};
use playcache_config::parse_config;
use playcache_core::{
    CacheService, FileWidgetNotifier, SyncEngine, SyncEvent, SyncOutcome, SyncScheduler,
    SyncTrigger, handle_command,
};
use playcache_ipc::{IpcClient, IpcServer, ServerMessage};
use playcache_net::{NetworkMonitor, NetworkState};
use playcache_remote::MockGateway;
use playcache_store::{LocalStore, SqliteStore, UnavailableStore};
use playcache_util::OwnerId;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

struct Harness {
    store: Arc<dyn LocalStore>,
    gateway: Arc<MockGateway>,
    monitor: NetworkMonitor,
    engine: Arc<SyncEngine>,
    cache: CacheService,
}

fn harness_with_store(store: Arc<dyn LocalStore>, state: NetworkState) -> Harness {
    let gateway = Arc::new(MockGateway::new());
    let engine = Arc::new(SyncEngine::new(store.clone(), gateway.clone()));
    let monitor = NetworkMonitor::with_state(state);
    let cache = CacheService::new(store.clone(), engine.clone(), monitor.handle())
        .with_fast_path(false);
    Harness {
        store,
        gateway,
        monitor,
        engine,
        cache,
    }
}

fn harness(state: NetworkState) -> Harness {
    harness_with_store(Arc::new(SqliteStore::in_memory().unwrap()), state)
}

fn athlete() -> OwnerId {
    OwnerId::new("athlete-42")
}

fn drill(name: &str) -> DrillLog {
    DrillLog {
        drill_id: name.to_lowercase().replace(' ', "-"),
        drill_name: name.into(),
        reps: 15,
        duration_secs: 300,
        success_rate: Some(0.8),
        notes: None,
    }
}

fn session(score: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        session_id: format!("session-{}", score),
        sport: "soccer".into(),
        score,
        duration_secs: 3600,
        metrics: BTreeMap::from([("accuracy".to_string(), score / 100.0)]),
    }
}

async fn wait_for_pass(events: &mut broadcast::Receiver<SyncEvent>) -> playcache_core::SyncReport {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("sync pass did not finish")
            .unwrap();
        if let SyncEvent::PassFinished(report) = event {
            return report;
        }
    }
}

#[tokio::test]
async fn test_offline_writes_sync_when_network_returns() {
    let h = harness(NetworkState::Offline);

    for name in ["Cone weave", "Wall passes", "Sprint ladder"] {
        h.cache.put(&athlete(), drill(name)).unwrap();
    }

    let pending = h.cache.get_unsynced(RecordKind::DrillLog);
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(SyncRecord::is_pending));

    let mut events = h.engine.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = SyncScheduler::new(h.engine.clone(), h.monitor.handle(), Duration::from_secs(300));
    let task = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(h.gateway.attempts().is_empty());

    h.monitor.set_online(true);
    let report = wait_for_pass(&mut events).await;

    assert_eq!(report.trigger, SyncTrigger::Connectivity);
    assert_eq!(report.kind(RecordKind::DrillLog).synced, 3);
    assert!(h.cache.get_unsynced(RecordKind::DrillLog).is_empty());
    assert_eq!(h.cache.pending_count(), 0);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_partial_failure_retries_only_remaining() {
    let h = harness(NetworkState::Online);

    let records: Vec<SyncRecord> = ["A", "B", "C"]
        .iter()
        .map(|name| h.cache.put(&athlete(), drill(name)).unwrap())
        .collect();
    h.gateway.fail_record(&records[2].id);

    let first = h.cache.sync_now().await;
    let report = first.report().unwrap().kind(RecordKind::DrillLog);
    assert_eq!((report.synced, report.failed), (2, 1));

    let pending = h.cache.get_unsynced(RecordKind::DrillLog);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, records[2].id);

    h.gateway.clear_failures();
    let attempts_before = h.gateway.attempts().len();
    let second = h.cache.sync_now().await;

    assert_eq!(second.report().unwrap().synced(), 1);
    assert_eq!(h.gateway.attempts().len(), attempts_before + 1);
    assert_eq!(h.gateway.attempts().last(), Some(&records[2].id));
    assert!(h.cache.get_unsynced(RecordKind::DrillLog).is_empty());
}

#[tokio::test]
async fn test_timer_and_connectivity_triggers_do_not_overlap() {
    let h = harness(NetworkState::Online);
    let record = h.cache.put(&athlete(), drill("Rondo")).unwrap();

    h.gateway.pause();
    let timer_pass = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.sync_all(SyncTrigger::Periodic).await })
    };
    h.gateway.wait_entered().await;

    let connectivity_pass = h.engine.sync_all(SyncTrigger::Connectivity).await;
    assert_eq!(connectivity_pass, SyncOutcome::AlreadyRunning);

    h.gateway.resume();
    let outcome = timer_pass.await.unwrap();
    assert_eq!(outcome.report().unwrap().synced(), 1);

    assert_eq!(h.gateway.attempts(), vec![record.id.clone()]);
    assert_eq!(h.gateway.pushed_ids(), vec![record.id]);
}

#[tokio::test]
async fn test_mark_synced_is_idempotent() {
    let h = harness(NetworkState::Online);
    let record = h.cache.put(&athlete(), drill("Juggling")).unwrap();

    let now = playcache_util::now();
    assert!(h.store.mark_synced(RecordKind::DrillLog, &record.id, now).unwrap());
    assert!(!h.store.mark_synced(RecordKind::DrillLog, &record.id, now).unwrap());

    let stored = h.cache.get(RecordKind::DrillLog, &record.id).unwrap();
    assert!(!stored.is_pending());

    // Nothing left for the engine to do
    h.cache.sync_now().await;
    assert!(h.gateway.attempts().is_empty());
}

#[test]
fn test_put_is_visible_to_next_read() {
    let h = harness(NetworkState::Offline);

    let reward = h
        .cache
        .put(
            &athlete(),
            RewardEvent {
                reward_type: "badge".into(),
                name: "Hat trick".into(),
                points: 300,
                reason: Some("3 goals in one match".into()),
            },
        )
        .unwrap();

    let recent = h.cache.recent(RecordKind::Reward, &athlete(), 1);
    assert_eq!(recent, vec![reward.clone()]);
    assert_eq!(h.cache.get(RecordKind::Reward, &reward.id), Some(reward));
}

#[tokio::test]
async fn test_records_sync_in_insertion_order_per_kind() {
    let h = harness(NetworkState::Online);

    let mut expected = Vec::new();
    for i in 0..5 {
        let record = h.cache.put(&athlete(), drill(&format!("Drill {}", i))).unwrap();
        expected.push(record.id);
        h.cache.put(&athlete(), session(60.0 + i as f64)).unwrap();
    }

    h.cache.sync_now().await;

    let drill_pushes: Vec<_> = h
        .gateway
        .pushed()
        .into_iter()
        .filter(|p| p.kind == RecordKind::DrillLog)
        .map(|p| p.record.id)
        .collect();
    assert_eq!(drill_pushes, expected);
}

#[tokio::test]
async fn test_composite_score_scenario() {
    let h = harness(NetworkState::Online);

    for score in [70.0, 75.0, 80.0, 85.0, 90.0] {
        h.cache.put(&athlete(), session(score)).unwrap();
    }
    h.cache.sync_now().await;

    let score = h.cache.composite_score(&athlete()).unwrap();
    assert_eq!(score.sessions, 5);
    assert!((score.average - 80.0).abs() < 1e-9);
    assert!((score.consistency - 64.64).abs() < 0.01);
    assert!(score.consistency < 100.0);
    assert!(score.improvement > 50.0);
}

#[test]
fn test_unavailable_store_degrades_gracefully() {
    let h = harness_with_store(
        Arc::new(UnavailableStore::new("database is locked")),
        NetworkState::Online,
    );

    assert!(h.cache.put(&athlete(), drill("Rondo")).is_none());
    assert!(h.cache.get_unsynced(RecordKind::DrillLog).is_empty());
    assert!(h.cache.cache_size().is_none());
}

#[tokio::test]
async fn test_unavailable_store_skips_sync() {
    let h = harness_with_store(
        Arc::new(UnavailableStore::new("database is locked")),
        NetworkState::Online,
    );

    let outcome = h.cache.sync_now().await;
    let report = outcome.report().unwrap();
    assert_eq!(report.skipped_kinds(), RecordKind::ALL.to_vec());
    assert!(h.gateway.attempts().is_empty());
}

#[tokio::test]
async fn test_pending_records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.db");

    let first_id = {
        let h = harness_with_store(
            Arc::new(SqliteStore::open(&db_path).unwrap()),
            NetworkState::Offline,
        );
        let record = h.cache.put(&athlete(), drill("Before restart")).unwrap();
        record.id
    };

    let h = harness_with_store(
        Arc::new(SqliteStore::open(&db_path).unwrap()),
        NetworkState::Online,
    );
    let later = h.cache.put(&athlete(), drill("After restart")).unwrap();
    let pending = h.cache.get_unsynced(RecordKind::DrillLog);
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, first_id);
    assert_eq!(pending[1].id, later.id);

    h.cache.sync_now().await;
    assert_eq!(h.gateway.pushed_ids(), vec![first_id, later.id]);
}

#[test]
fn test_configured_widget_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let config = format!(
        r#"
        config_version = 1

        [service]
        data_dir = "{}"

        [widget]
        kinds = ["notification"]
        "#,
        dir.path().display()
    );
    let settings = parse_config(&config).unwrap();

    let h = harness(NetworkState::Offline);
    let cache = h
        .cache
        .with_widget_kinds(settings.widget.kinds)
        .with_notifier(Arc::new(FileWidgetNotifier::new(&settings.widget.dir)));

    cache.put(&athlete(), drill("Not shown")).unwrap();
    let note = cache
        .put(
            &athlete(),
            Payload::Notification(Notification {
                title: "New drill assigned".into(),
                body: "Coach added 'Cone weave'".into(),
                category: "assignment".into(),
                deep_link: Some("app://drills/cone-weave".into()),
            }),
        )
        .unwrap();

    let widget_dir = dir.path().join("widget");
    assert!(!widget_dir.join("drill_log.json").exists());

    let envelope: WidgetEnvelope =
        serde_json::from_slice(&std::fs::read(widget_dir.join("notification.json")).unwrap())
            .unwrap();
    assert_eq!(envelope.kind, RecordKind::Notification);
    assert_eq!(envelope.record.id, note.id);
}

/// Serve cache commands on `socket_path` the way the daemon does
async fn serve_commands(cache: Arc<CacheService>, socket_path: &std::path::Path) -> Arc<IpcServer> {
    let mut server = IpcServer::new(socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);
    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move { accept.run().await });

    let responder = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            if let ServerMessage::Request { client_id, request } = msg
                && responder.check_version(&client_id, &request).await
            {
                let response = handle_command(&cache, request.request_id, request.command).await;
                let _ = responder.send_response(&client_id, response).await;
            }
        }
    });

    server
}

#[tokio::test]
async fn test_socket_writes_reach_store_and_remote() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("playcached.sock");

    let store: Arc<dyn LocalStore> = Arc::new(SqliteStore::in_memory().unwrap());
    let gateway = Arc::new(MockGateway::new());
    let engine = Arc::new(SyncEngine::new(store.clone(), gateway.clone()));
    let monitor = NetworkMonitor::with_state(NetworkState::Online);
    let cache = Arc::new(CacheService::new(store.clone(), engine.clone(), monitor.handle()));
    let mut events = engine.subscribe();

    let _server = serve_commands(cache, &socket_path).await;
    let mut client = IpcClient::connect(&socket_path).await.unwrap();

    let stored = client
        .send(Command::Put {
            owner_id: athlete(),
            payload: Payload::DrillLog(drill("Ladder run")),
            local_ref: Some("draft-7".into()),
        })
        .await
        .unwrap();
    let record = match stored.result {
        ResponseResult::Ok(ResponsePayload::Stored { record }) => record,
        other => panic!("unexpected result: {:?}", other),
    };

    // Durable before the response came back
    let cached = store.get(RecordKind::DrillLog, &record.id).unwrap().unwrap();
    assert_eq!(cached.local_only_ref.as_deref(), Some("draft-7"));

    // Online write takes the fast path
    wait_for_pass(&mut events).await;
    assert_eq!(gateway.pushed_ids(), vec![record.id.clone()]);

    let recent = client
        .send(Command::Recent {
            owner_id: athlete(),
            kind: RecordKind::DrillLog,
            limit: None,
        })
        .await
        .unwrap();
    match recent.result {
        ResponseResult::Ok(ResponsePayload::Records { records }) => {
            assert_eq!(records.len(), 1);
            assert!(records[0].sync_state.is_synced());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
