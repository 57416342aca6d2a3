//! Widget notification after writes

use playcache_api::{RecordKind, WidgetEnvelope};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Outward push of the latest record per kind to an OS-level surface.
///
/// Delivery is fire-and-forget: callers log failures and move on.
pub trait WidgetNotifier: Send + Sync {
    fn notify(&self, envelope: &WidgetEnvelope) -> NotifyResult<()>;
}

/// Writes the latest envelope of each kind to `<dir>/<kind>.json`.
///
/// Inside a tokio runtime the file work runs on the blocking pool and
/// failures are logged there; outside one it runs inline and is reported.
pub struct FileWidgetNotifier {
    dir: PathBuf,
    // Newest created_at written per kind
    written: Arc<Mutex<HashMap<RecordKind, i64>>>,
}

impl FileWidgetNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, envelope: &WidgetEnvelope) -> PathBuf {
        self.dir.join(format!("{}.json", envelope.kind))
    }
}

struct SnapshotWrite {
    dir: PathBuf,
    path: PathBuf,
    kind: RecordKind,
    created_at: i64,
    json: Vec<u8>,
    written: Arc<Mutex<HashMap<RecordKind, i64>>>,
}

impl SnapshotWrite {
    fn run(self) -> NotifyResult<()> {
        // Held across the write so snapshots of one kind land in order
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&newest) = written.get(&self.kind)
            && newest > self.created_at
        {
            debug!(kind = %self.kind, "Older widget snapshot skipped");
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir)?;

        // Readers only ever see a complete file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &self.json)?;
        std::fs::rename(&tmp, &self.path)?;

        written.insert(self.kind, self.created_at);
        debug!(kind = %self.kind, path = %self.path.display(), "Widget snapshot written");
        Ok(())
    }
}

impl WidgetNotifier for FileWidgetNotifier {
    fn notify(&self, envelope: &WidgetEnvelope) -> NotifyResult<()> {
        let job = SnapshotWrite {
            dir: self.dir.clone(),
            path: self.path_for(envelope),
            kind: envelope.kind,
            created_at: envelope.record.created_at,
            json: serde_json::to_vec_pretty(envelope)?,
            written: self.written.clone(),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let kind = job.kind;
                    if let Err(e) = job.run() {
                        warn!(kind = %kind, error = %e, "Widget snapshot write failed");
                    }
                });
                Ok(())
            }
            Err(_) => job.run(),
        }
    }
}

/// Fans envelopes out to in-process subscribers
pub struct ChannelWidgetNotifier {
    tx: broadcast::Sender<WidgetEnvelope>,
}

impl ChannelWidgetNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEnvelope> {
        self.tx.subscribe()
    }
}

impl WidgetNotifier for ChannelWidgetNotifier {
    fn notify(&self, envelope: &WidgetEnvelope) -> NotifyResult<()> {
        // No subscribers is not an error
        let _ = self.tx.send(envelope.clone());
        Ok(())
    }
}
