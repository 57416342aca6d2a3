//! Mock gateway for testing

use async_trait::async_trait;
use playcache_api::{RecordKind, SyncRecord};
use playcache_util::RecordId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, watch};

use crate::{GatewayError, GatewayResult, RemoteGateway};

/// A push the mock accepted
#[derive(Debug, Clone)]
pub struct PushedRecord {
    pub kind: RecordKind,
    pub record: SyncRecord,
}

/// Scriptable gateway for unit/integration testing
pub struct MockGateway {
    pushed: Arc<Mutex<Vec<PushedRecord>>>,
    attempts: Arc<Mutex<Vec<RecordId>>>,
    paused: watch::Sender<bool>,
    entered: Arc<Notify>,

    /// Pretend the network is down for every push
    pub unreachable: Arc<Mutex<bool>>,

    /// Ids the server answers with a transient error
    pub fail_ids: Arc<Mutex<HashSet<RecordId>>>,

    /// Ids the server refuses outright
    pub reject_ids: Arc<Mutex<HashSet<RecordId>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            pushed: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
            paused,
            entered: Arc::new(Notify::new()),
            unreachable: Arc::new(Mutex::new(false)),
            fail_ids: Arc::new(Mutex::new(HashSet::new())),
            reject_ids: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Records accepted so far, in push order
    pub fn pushed(&self) -> Vec<PushedRecord> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn pushed_ids(&self) -> Vec<RecordId> {
        self.pushed
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.record.id.clone())
            .collect()
    }

    /// Every push attempt, successful or not
    pub fn attempts(&self) -> Vec<RecordId> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub fn fail_record(&self, id: &RecordId) {
        self.fail_ids.lock().unwrap().insert(id.clone());
    }

    pub fn reject_record(&self, id: &RecordId) {
        self.reject_ids.lock().unwrap().insert(id.clone());
    }

    pub fn clear_failures(&self) {
        self.fail_ids.lock().unwrap().clear();
        self.reject_ids.lock().unwrap().clear();
    }

    /// Hold every push until `resume` is called
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Resolves once a push has started (useful together with `pause`)
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn push(&self, kind: RecordKind, record: &SyncRecord) -> GatewayResult<()> {
        self.attempts.lock().unwrap().push(record.id.clone());
        self.entered.notify_one();

        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|p| !*p).await;

        if *self.unreachable.lock().unwrap() {
            return Err(GatewayError::NetworkUnreachable("mock network down".into()));
        }

        if self.reject_ids.lock().unwrap().contains(&record.id) {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "mock validation failure".into(),
            });
        }

        if self.fail_ids.lock().unwrap().contains(&record.id) {
            return Err(GatewayError::Server {
                status: 503,
                message: "mock server failure".into(),
            });
        }

        self.pushed.lock().unwrap().push(PushedRecord {
            kind,
            record: record.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
